//! In-memory stand-ins for the page, model and memory seams

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::agent::ModelResponse;
use crate::aria::AxSnapshotNode;
use crate::browser::{AxMatch, BrowserError, BrowserPage, BrowserResult, ElementHandle};
use crate::llm::{ChatMessage, ModelError, ModelProvider};
use crate::memory::{Memory, MemoryError, MemoryService, ObjectiveState};

/// Backend id of the first node in pre-order
const FIRST_BACKEND_ID: i64 = 100;

/// Observable side effect on a [`FakePage`]
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    GoTo(String),
    Click { backend_node_id: i64, click_count: u32 },
    Hover(i64),
    Type(String),
    Key(String),
    Back,
    Scroll(i64, i64),
    Close,
}

/// Page whose accessibility tree is a fixed snapshot
///
/// Backend node ids are assigned in pre-order starting at 100.
pub struct FakePage {
    snapshot: Mutex<Option<AxSnapshotNode>>,
    url: Mutex<String>,
    html: Mutex<String>,
    events: Mutex<Vec<PageEvent>>,
    fail_adoption: AtomicBool,
    match_any_role: AtomicBool,
}

fn flatten(node: &AxSnapshotNode, out: &mut Vec<(String, String)>) {
    out.push((node.role.clone(), node.name.clone()));
    for child in &node.children {
        flatten(child, out);
    }
}

impl FakePage {
    pub fn new(snapshot: AxSnapshotNode) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            url: Mutex::new("https://www.google.com/".into()),
            html: Mutex::new("<html><body></body></html>".into()),
            events: Mutex::new(Vec::new()),
            fail_adoption: AtomicBool::new(false),
            match_any_role: AtomicBool::new(false),
        }
    }

    pub fn set_snapshot(&self, snapshot: AxSnapshotNode) {
        *self.snapshot.lock().unwrap() = Some(snapshot);
    }

    pub fn set_html(&self, html: &str) {
        *self.html.lock().unwrap() = html.to_string();
    }

    pub fn fail_adoption(&self, fail: bool) {
        self.fail_adoption.store(fail, Ordering::SeqCst);
    }

    /// Answer accessibility queries by name alone, like a loose CDP query
    pub fn match_any_role(&self, any: bool) {
        self.match_any_role.store(any, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.events.lock().unwrap().clone()
    }

    fn nodes(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(root) = self.snapshot.lock().unwrap().as_ref() {
            flatten(root, &mut out);
        }
        out
    }

    /// Backend id of the first node matching `role` and `name`
    pub fn backend_id_of(&self, role: &str, name: &str) -> Option<i64> {
        self.nodes()
            .iter()
            .position(|(r, n)| r == role && n == name)
            .map(|i| FIRST_BACKEND_ID + i as i64)
    }

    fn record(&self, event: PageEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        *self.url.lock().unwrap() = url.to_string();
        self.record(PageEvent::GoTo(url.to_string()));
        Ok(())
    }

    async fn url(&self) -> BrowserResult<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn accessibility_snapshot(&self) -> BrowserResult<Option<AxSnapshotNode>> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn query_accessibility(&self, role: &str, name: &str) -> BrowserResult<Vec<AxMatch>> {
        let any_role = self.match_any_role.load(Ordering::SeqCst);
        Ok(self
            .nodes()
            .into_iter()
            .enumerate()
            .filter(|(_, (r, n))| (any_role || r == role) && n == name)
            .map(|(i, (role, name))| AxMatch {
                role,
                name,
                backend_node_id: Some(FIRST_BACKEND_ID + i as i64),
            })
            .collect())
    }

    async fn adopt_backend_node(&self, backend_node_id: i64) -> BrowserResult<ElementHandle> {
        if self.fail_adoption.load(Ordering::SeqCst) {
            return Err(BrowserError::Cdp("node is detached".into()));
        }
        Ok(ElementHandle {
            backend_node_id,
            object_id: format!("object-{backend_node_id}"),
        })
    }

    async fn click(&self, element: &ElementHandle, click_count: u32) -> BrowserResult<()> {
        self.record(PageEvent::Click {
            backend_node_id: element.backend_node_id,
            click_count,
        });
        Ok(())
    }

    async fn hover(&self, element: &ElementHandle) -> BrowserResult<()> {
        self.record(PageEvent::Hover(element.backend_node_id));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> BrowserResult<()> {
        self.record(PageEvent::Type(text.to_string()));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> BrowserResult<()> {
        self.record(PageEvent::Key(key.to_string()));
        Ok(())
    }

    async fn go_back(&self) -> BrowserResult<()> {
        self.record(PageEvent::Back);
        Ok(())
    }

    async fn scroll_by(&self, dx: i64, dy: i64) -> BrowserResult<()> {
        self.record(PageEvent::Scroll(dx, dy));
        Ok(())
    }

    async fn evaluate(&self, _expression: &str) -> BrowserResult<Value> {
        Ok(Value::String(self.html.lock().unwrap().clone()))
    }

    async fn content(&self) -> BrowserResult<String> {
        Ok(self.html.lock().unwrap().clone())
    }

    async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn close(&self) -> BrowserResult<()> {
        self.record(PageEvent::Close);
        Ok(())
    }
}

/// Model that replays scripted answers, then fails
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<Value, ModelError>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
    latency: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<Value, ModelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            latency: None,
        }
    }

    /// A model that never answers successfully
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages of every call, in order
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage], _schema: &Value) -> Result<Value, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(ModelError::Transport("model unavailable".into())))
    }
}

/// Memory service that keeps everything in process
#[derive(Default)]
pub struct RecordingMemory {
    memorized: Mutex<Vec<(String, ObjectiveState, ModelResponse)>>,
    recall: Vec<Memory>,
    trajectories: HashMap<String, Vec<Memory>>,
    failing: bool,
}

impl RecordingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a transport error
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_recall(mut self, memories: Vec<Memory>) -> Self {
        self.recall = memories;
        self
    }

    pub fn with_trajectory(mut self, id: &str, memories: Vec<Memory>) -> Self {
        self.trajectories.insert(id.to_string(), memories);
        self
    }

    pub fn memorized(&self) -> Vec<(String, ObjectiveState, ModelResponse)> {
        self.memorized.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), MemoryError> {
        if self.failing {
            Err(MemoryError::Transport("memory service unreachable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MemoryService for RecordingMemory {
    async fn memorize(
        &self,
        sequence_id: &str,
        state: &ObjectiveState,
        action: &ModelResponse,
    ) -> Result<(), MemoryError> {
        self.check()?;
        self.memorized.lock().unwrap().push((
            sequence_id.to_string(),
            state.clone(),
            action.clone(),
        ));
        Ok(())
    }

    async fn remember(
        &self,
        _state: &ObjectiveState,
        _sequence_id: Option<&str>,
    ) -> Result<Vec<Memory>, MemoryError> {
        self.check()?;
        Ok(self.recall.clone())
    }

    async fn trajectory(&self, trajectory_id: &str) -> Result<Vec<Memory>, MemoryError> {
        self.check()?;
        Ok(self
            .trajectories
            .get(trajectory_id)
            .cloned()
            .unwrap_or_default())
    }
}
