//! chromiumoxide-backed [`BrowserPage`]

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide_cdp::cdp::browser_protocol::accessibility::{
    AxNode, AxValue, GetFullAxTreeParams, QueryAxTreeParams,
};
use chromiumoxide_cdp::cdp::browser_protocol::dom::{
    BackendNodeId, GetBoxModelParams, GetDocumentParams, ResolveNodeParams,
    ScrollIntoViewIfNeededParams,
};
use chromiumoxide_cdp::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide_cdp::cdp::js_protocol::runtime::{CallArgument, CallFunctionOnParams};
use serde_json::{Value, json};
use tracing::{debug, trace};

use super::snapshot::{AxRecord, nest_ax_records};
use super::{AxMatch, BrowserError, BrowserPage, BrowserResult, ElementHandle};
use crate::aria::AxSnapshotNode;

fn cdp_err(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Cdp(e.to_string())
}

fn ax_text(value: Option<&AxValue>) -> String {
    value
        .and_then(|v| v.value.as_ref())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

fn ax_record(node: &AxNode) -> AxRecord {
    AxRecord {
        id: node.node_id.inner().clone(),
        parent_id: node.parent_id.as_ref().map(|p| p.inner().clone()),
        role: ax_text(node.role.as_ref()),
        name: ax_text(node.name.as_ref()),
        value: node
            .value
            .as_ref()
            .and_then(|v| v.value.clone())
            .filter(|v| !v.is_null() && v.as_str() != Some("")),
        child_ids: node
            .child_ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| id.inner().clone()).collect())
            .unwrap_or_default(),
        ignored: node.ignored,
    }
}

/// Key table for the handful of named keys the executor sends
fn key_definition(key: &str) -> (&str, i64, Option<&str>) {
    match key {
        "Enter" => ("Enter", 13, Some("\r")),
        "Tab" => ("Tab", 9, None),
        "Escape" => ("Escape", 27, None),
        "Backspace" => ("Backspace", 8, None),
        other => (other, 0, Some(other)),
    }
}

/// A single chromiumoxide page driven through raw CDP commands
#[derive(Clone)]
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn inner(&self) -> &Page {
        &self.page
    }

    async fn document_backend_id(&self) -> BrowserResult<BackendNodeId> {
        let document = self
            .page
            .execute(GetDocumentParams::default())
            .await
            .map_err(cdp_err)?;
        Ok(document.result.root.backend_node_id.clone())
    }

    /// Scroll the element into view and return the centre of its content box
    async fn element_center(&self, element: &ElementHandle) -> BrowserResult<(f64, f64)> {
        let backend = BackendNodeId::new(element.backend_node_id);

        let mut scroll = ScrollIntoViewIfNeededParams::default();
        scroll.backend_node_id = Some(backend.clone());
        self.page.execute(scroll).await.map_err(cdp_err)?;

        let mut box_model = GetBoxModelParams::default();
        box_model.backend_node_id = Some(backend);
        let model = self.page.execute(box_model).await.map_err(cdp_err)?;

        let quad = model.result.model.content.inner();
        if quad.len() < 8 {
            return Err(BrowserError::Cdp(format!(
                "Element {} has no layout box",
                element.backend_node_id
            )));
        }
        let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
        let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
        Ok((x, y))
    }

    async fn dispatch_mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
        click_count: i64,
    ) -> BrowserResult<()> {
        let mut builder = DispatchMouseEventParams::builder().r#type(kind).x(x).y(y);
        if click_count > 0 {
            builder = builder.button(MouseButton::Left).click_count(click_count);
        }
        let params = builder.build().map_err(BrowserError::Cdp)?;
        self.page.execute(params).await.map_err(cdp_err)?;
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for CdpPage {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn url(&self) -> BrowserResult<String> {
        Ok(self.page.url().await.map_err(cdp_err)?.unwrap_or_default())
    }

    async fn accessibility_snapshot(&self) -> BrowserResult<Option<AxSnapshotNode>> {
        let response = self
            .page
            .execute(GetFullAxTreeParams::default())
            .await
            .map_err(cdp_err)?;
        let records: Vec<AxRecord> = response.result.nodes.iter().map(ax_record).collect();
        trace!("Full accessibility tree has {} raw nodes", records.len());
        Ok(nest_ax_records(&records))
    }

    async fn query_accessibility(&self, role: &str, name: &str) -> BrowserResult<Vec<AxMatch>> {
        let mut params = QueryAxTreeParams::default();
        params.backend_node_id = Some(self.document_backend_id().await?);
        params.accessible_name = Some(name.to_string());
        params.role = Some(role.to_string());

        let response = self.page.execute(params).await.map_err(cdp_err)?;
        Ok(response
            .result
            .nodes
            .iter()
            .map(|node| AxMatch {
                role: ax_text(node.role.as_ref()),
                name: ax_text(node.name.as_ref()),
                backend_node_id: node.backend_dom_node_id.as_ref().map(|id| *id.inner()),
            })
            .collect())
    }

    async fn adopt_backend_node(&self, backend_node_id: i64) -> BrowserResult<ElementHandle> {
        let mut params = ResolveNodeParams::default();
        params.backend_node_id = Some(BackendNodeId::new(backend_node_id));

        let response = self.page.execute(params).await.map_err(cdp_err)?;
        let object_id = response
            .result
            .object
            .object_id
            .as_ref()
            .map(|id| id.inner().clone())
            .ok_or_else(|| {
                BrowserError::Cdp(format!(
                    "Backend node {backend_node_id} resolved without a remote object"
                ))
            })?;

        Ok(ElementHandle {
            backend_node_id,
            object_id,
        })
    }

    async fn click(&self, element: &ElementHandle, click_count: u32) -> BrowserResult<()> {
        let (x, y) = self.element_center(element).await?;
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y, 0)
            .await?;
        for count in 1..=i64::from(click_count.max(1)) {
            self.dispatch_mouse(DispatchMouseEventType::MousePressed, x, y, count)
                .await?;
            self.dispatch_mouse(DispatchMouseEventType::MouseReleased, x, y, count)
                .await?;
        }
        debug!(
            "Clicked backend node {} x{} at ({:.0}, {:.0})",
            element.backend_node_id, click_count, x, y
        );
        Ok(())
    }

    async fn hover(&self, element: &ElementHandle) -> BrowserResult<()> {
        let (x, y) = self.element_center(element).await?;
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y, 0)
            .await
    }

    async fn type_text(&self, text: &str) -> BrowserResult<()> {
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(cdp_err)?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> BrowserResult<()> {
        let (code, virtual_key, text) = key_definition(key);

        let mut down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyDown)
            .key(key)
            .code(code)
            .windows_virtual_key_code(virtual_key);
        if let Some(text) = text {
            down = down.text(text);
        }
        let down = down.build().map_err(BrowserError::Cdp)?;
        self.page.execute(down).await.map_err(cdp_err)?;

        let up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key(key)
            .code(code)
            .windows_virtual_key_code(virtual_key)
            .build()
            .map_err(BrowserError::Cdp)?;
        self.page.execute(up).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn go_back(&self) -> BrowserResult<()> {
        self.page
            .evaluate("window.history.back()")
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn scroll_by(&self, dx: i64, dy: i64) -> BrowserResult<()> {
        // Parameterized evaluation, no string interpolation into script
        let call = CallFunctionOnParams::builder()
            .function_declaration("(x, y) => window.scrollBy(x, y)")
            .argument(CallArgument::builder().value(json!(dx)).build())
            .argument(CallArgument::builder().value(json!(dy)).build())
            .build()
            .map_err(BrowserError::Cdp)?;

        self.page.evaluate_function(call).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> BrowserResult<Value> {
        let result = self.page.evaluate(expression).await.map_err(cdp_err)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn content(&self) -> BrowserResult<String> {
        self.page.content().await.map_err(cdp_err)
    }

    async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
        self.page
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(cdp_err)
    }

    async fn close(&self) -> BrowserResult<()> {
        self.page.clone().close().await.map_err(cdp_err)
    }
}
