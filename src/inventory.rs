//! Secret inventory with reversible masking
//!
//! Real values never leave this module except through [`Inventory::replace_mask`],
//! which the action executor calls right before typing into the page.
//!
//! Masks are random per [`Inventory`], so anything persisted beyond one session
//! carries `{{inventory:<name>}}` placeholders instead (see
//! [`Inventory::to_placeholders`]).

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

const PLACEHOLDER_PREFIX: &str = "{{inventory:";
const PLACEHOLDER_SUFFIX: &str = "}}";

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Inventory value '{0}' is declared as a number but is not numeric")]
    NotNumeric(String),

    #[error("Inventory value '{0}' is declared as a string but is not a string")]
    NotString(String),

    #[error("Failed to parse inventory: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
}

/// One named secret as supplied by the caller
#[derive(Clone, Serialize, Deserialize)]
pub struct InventoryValue {
    pub name: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

impl InventoryValue {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::String(value.into()),
            value_type: ValueType::String,
        }
    }

    pub fn number(name: impl Into<String>, value: impl Into<serde_json::Number>) -> Self {
        Self {
            name: name.into(),
            value: Value::Number(value.into()),
            value_type: ValueType::Number,
        }
    }

    /// Textual form used for substitution inside free text
    fn as_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

// Secrets must not end up in logs through a stray `{:?}`.
impl fmt::Debug for InventoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InventoryValue")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("value_type", &self.value_type)
            .finish()
    }
}

#[derive(Clone)]
struct MaskedEntry {
    real: InventoryValue,
    masked: InventoryValue,
}

/// Read-only set of secrets paired with their masked twins
///
/// Masks are generated once at construction, so every rendering of the
/// inventory within a session shows the model the same placeholders.
#[derive(Clone)]
pub struct Inventory {
    entries: Vec<MaskedEntry>,
}

impl Inventory {
    pub fn new(values: Vec<InventoryValue>) -> Result<Self, InventoryError> {
        let entries = values
            .into_iter()
            .map(|real| {
                let masked = mask(&real)?;
                Ok(MaskedEntry { real, masked })
            })
            .collect::<Result<Vec<_>, InventoryError>>()?;
        Ok(Self { entries })
    }

    /// Parse a JSON array of `{name, value, type}` objects
    pub fn from_json(json: &str) -> Result<Self, InventoryError> {
        let values: Vec<InventoryValue> =
            serde_json::from_str(json).map_err(|e| InventoryError::Parse(e.to_string()))?;
        Self::new(values)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Masked values, in declaration order
    pub fn masked_values(&self) -> impl Iterator<Item = &InventoryValue> {
        self.entries.iter().map(|e| &e.masked)
    }

    /// Swap every masked placeholder in `text` for its real value
    pub fn replace_mask(&self, text: &str) -> String {
        self.entries.iter().fold(text.to_string(), |acc, entry| {
            let placeholder = entry.masked.as_text();
            if placeholder.is_empty() {
                acc
            } else {
                acc.replace(&placeholder, &entry.real.as_text())
            }
        })
    }

    /// Swap every real secret in `text` for its masked placeholder
    pub fn censor(&self, text: &str) -> String {
        self.entries.iter().fold(text.to_string(), |acc, entry| {
            let secret = entry.real.as_text();
            if secret.is_empty() {
                acc
            } else {
                acc.replace(&secret, &entry.masked.as_text())
            }
        })
    }

    /// Swap real secrets and this session's masks for named placeholders
    pub fn to_placeholders(&self, text: &str) -> String {
        self.entries.iter().fold(text.to_string(), |acc, entry| {
            let named = placeholder(&entry.real.name);
            [entry.real.as_text(), entry.masked.as_text()]
                .iter()
                .filter(|s| !s.is_empty())
                .fold(acc, |acc, s| acc.replace(s.as_str(), &named))
        })
    }

    /// Swap named placeholders for this session's masks
    pub fn from_placeholders(&self, text: &str) -> String {
        self.entries.iter().fold(text.to_string(), |acc, entry| {
            acc.replace(&placeholder(&entry.real.name), &entry.masked.as_text())
        })
    }
}

/// Session-independent stand-in for the inventory value called `name`
pub fn placeholder(name: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{name}{PLACEHOLDER_SUFFIX}")
}

/// Name inside the first placeholder left in `text`, if any
pub fn unresolved_placeholder(text: &str) -> Option<&str> {
    let start = text.find(PLACEHOLDER_PREFIX)? + PLACEHOLDER_PREFIX.len();
    let rest = &text[start..];
    let end = rest.find(PLACEHOLDER_SUFFIX)?;
    Some(&rest[..end])
}

/// Prompt rendering: masked values only
impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let masked = &entry.masked;
            writeln!(f, "{}: {}", masked.name, masked.value)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inventory")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Produce a structurally similar twin of `value`
///
/// Strings keep their character count and draw from `[A-Za-z0-9]`.
/// Numbers keep every non-digit character (sign, decimal point) and their
/// digit count; a leading digit is never zero.
pub fn mask(value: &InventoryValue) -> Result<InventoryValue, InventoryError> {
    let mut rng = rand::rng();
    let masked = match value.value_type {
        ValueType::String => {
            let text = value
                .value
                .as_str()
                .ok_or_else(|| InventoryError::NotString(value.name.clone()))?;
            let len = text.chars().count();
            let scrambled: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            Value::String(scrambled)
        }
        ValueType::Number => {
            let Value::Number(number) = &value.value else {
                return Err(InventoryError::NotNumeric(value.name.clone()));
            };
            let digits = scramble_digits(&number.to_string(), &mut rng);
            let parsed: serde_json::Number = digits
                .parse()
                .map_err(|_| InventoryError::NotNumeric(value.name.clone()))?;
            Value::Number(parsed)
        }
    };

    Ok(InventoryValue {
        name: value.name.clone(),
        value: masked,
        value_type: value.value_type,
    })
}

fn scramble_digits(source: &str, rng: &mut impl Rng) -> String {
    let mut seen_digit = false;
    source
        .chars()
        .map(|c| {
            if !c.is_ascii_digit() {
                return c;
            }
            let low = if seen_digit { 0 } else { 1 };
            seen_digit = true;
            char::from(b'0' + rng.random_range(low..10u8))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password_inventory() -> Inventory {
        Inventory::new(vec![InventoryValue::string("Password", "Password123")]).unwrap()
    }

    #[test]
    fn test_string_mask_keeps_length_and_alphabet() {
        let original = InventoryValue::string("token", "hunter2-with-dashes");
        let masked = mask(&original).unwrap();
        let text = masked.value.as_str().unwrap();
        assert_eq!(text.chars().count(), "hunter2-with-dashes".chars().count());
        assert!(text.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_number_mask_keeps_digit_count() {
        let original = InventoryValue::number("pin", 40917u64);
        let masked = mask(&original).unwrap();
        let text = masked.value.to_string();
        assert_eq!(text.len(), 5);
        assert!(!text.starts_with('0'));
        assert_eq!(masked.value_type, ValueType::Number);
    }

    #[test]
    fn test_replace_mask_round_trips() {
        let inventory = Inventory::new(vec![
            InventoryValue::string("Password", "Password123"),
            InventoryValue::number("Card", 4242424242424242u64),
        ])
        .unwrap();

        let rendered_prompt_text = inventory
            .masked_values()
            .map(|v| v.as_text())
            .collect::<Vec<_>>()
            .join(" and ");
        let restored = inventory.replace_mask(&rendered_prompt_text);
        assert_eq!(restored, "Password123 and 4242424242424242");
    }

    #[test]
    fn test_display_never_contains_secret() {
        let inventory = password_inventory();
        let rendered = inventory.to_string();
        assert!(!rendered.contains("Password123"));
        assert!(rendered.starts_with("Password: "));
    }

    #[test]
    fn test_censor_replaces_secret_with_mask() {
        let inventory = password_inventory();
        let censored = inventory.censor("[0,\"textbox\",\"Password123\"]");
        assert!(!censored.contains("Password123"));

        let mask_text = inventory.masked_values().next().unwrap().as_text();
        assert!(censored.contains(&mask_text));
        assert_eq!(inventory.replace_mask(&censored), "[0,\"textbox\",\"Password123\"]");
    }

    #[test]
    fn test_placeholders_survive_a_new_inventory() {
        let recording = password_inventory();
        let typed = recording.masked_values().next().unwrap().as_text();
        let stored = recording.to_placeholders(&format!("typed {typed} into Password123"));
        assert_eq!(
            stored,
            "typed {{inventory:Password}} into {{inventory:Password}}"
        );

        let replaying = password_inventory();
        let masked = replaying.from_placeholders("{{inventory:Password}}");
        assert_eq!(replaying.replace_mask(&masked), "Password123");
        assert_eq!(unresolved_placeholder(&masked), None);
    }

    #[test]
    fn test_unknown_placeholder_stays_unresolved() {
        let inventory = password_inventory();
        let text = inventory.from_placeholders("{{inventory:Pin}}");
        assert_eq!(unresolved_placeholder(&text), Some("Pin"));
    }

    #[test]
    fn test_debug_redacts_values() {
        let value = InventoryValue::string("Password", "Password123");
        assert!(!format!("{:?}", value).contains("Password123"));
    }

    #[test]
    fn test_from_json_rejects_mismatched_type() {
        let json = r#"[{"name":"pin","value":"abc","type":"number"}]"#;
        assert!(matches!(
            Inventory::from_json(json),
            Err(InventoryError::NotNumeric(_))
        ));
    }
}
