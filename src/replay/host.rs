use anyhow::Result;
use async_trait::async_trait;

use crate::dom::{Document, NodeId};
use crate::selector;

/// The capability surface replay needs from a rendered document. The
/// executor only ever talks to this trait, so the same run loop drives the
/// in-memory host in tests and whatever embedding a controller provides.
#[async_trait]
pub trait DocumentHost: Send {
    /// First element matching the selector, in document order.
    fn query(&self, selector: &str) -> Option<NodeId>;

    /// Bring the element into view before acting on it.
    async fn scroll_into_view(&mut self, node: NodeId) -> Result<()>;

    /// Visually mark the element about to be acted on.
    async fn highlight(&mut self, node: NodeId) -> Result<()>;

    /// Dispatch a click. Toggle controls flip their checked state.
    async fn click(&mut self, node: NodeId) -> Result<()>;

    /// Focus the field, set its value wholesale and raise the synthetic
    /// input/change notifications a page would see after typing.
    async fn fill(&mut self, node: NodeId, text: &str) -> Result<()>;

    /// Set a select control's value and raise its change notification.
    async fn select(&mut self, node: NodeId, value: &str) -> Result<()>;
}

/// One synthetic notification raised by [`DomHost`], journaled so observable
/// page effects can be asserted on.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub node: NodeId,
    pub event: &'static str,
    pub detail: Option<String>,
}

/// In-memory host over a parsed [`Document`]. Applies effects to the
/// element arena and journals every synthetic notification in order.
pub struct DomHost {
    doc: Document,
    journal: Vec<Notification>,
}

impl DomHost {
    pub fn new(doc: Document) -> Self {
        Self { doc, journal: Vec::new() }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn journal(&self) -> &[Notification] {
        &self.journal
    }

    fn notify(&mut self, node: NodeId, event: &'static str, detail: Option<String>) {
        log::debug!("notify {} on node {} {:?}", event, node, detail);
        self.journal.push(Notification { node, event, detail });
    }
}

#[async_trait]
impl DocumentHost for DomHost {
    fn query(&self, selector: &str) -> Option<NodeId> {
        selector::query(&self.doc, selector)
    }

    async fn scroll_into_view(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    async fn highlight(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    async fn click(&mut self, node: NodeId) -> Result<()> {
        self.notify(node, "click", None);
        if self.doc.get(node).is_toggle() {
            let flipped = !self.doc.get(node).checked;
            self.doc.get_mut(node).checked = flipped;
            self.notify(node, "change", Some(flipped.to_string()));
        }
        Ok(())
    }

    async fn fill(&mut self, node: NodeId, text: &str) -> Result<()> {
        self.notify(node, "focus", None);
        self.doc.get_mut(node).value = text.to_string();
        self.notify(node, "input", Some(text.to_string()));
        self.notify(node, "change", Some(text.to_string()));
        Ok(())
    }

    async fn select(&mut self, node: NodeId, value: &str) -> Result<()> {
        self.doc.get_mut(node).value = value.to_string();
        self.notify(node, "change", Some(value.to_string()));
        Ok(())
    }
}
