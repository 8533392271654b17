use crate::dom::NodeId;

/// A raw interaction event delivered by the host embedding. These are the
/// capturing-phase notifications a page integration observes; the recorder
/// translates them into steps.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// Pointer click on an element.
    Click { target: NodeId },
    /// An editable field's value changed while typing; `value` is the
    /// field's full current content, not a delta.
    Input { target: NodeId, value: String },
    /// A control's value was committed (select choice, toggle flip). The
    /// control's new state is read from the document.
    Change { target: NodeId },
}

impl CaptureEvent {
    pub fn target(&self) -> NodeId {
        match self {
            CaptureEvent::Click { target }
            | CaptureEvent::Input { target, .. }
            | CaptureEvent::Change { target } => *target,
        }
    }
}

/// First `max` characters of `text`, on a char boundary.
pub(crate) fn snippet(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        assert_eq!(snippet("héllo wörld", 5), "héllo");
        assert_eq!(snippet("short", 50), "short");
    }
}
