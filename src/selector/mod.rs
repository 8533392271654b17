//! Selector synthesis and matching.
//!
//! The resolver turns an element into a selector string via a fixed priority
//! chain (id, then name, then a document-unique class combination, then a
//! positional path). The matcher evaluates those strings against a document
//! with descendant-combinator semantics. Both sides speak the same small
//! grammar, so anything the resolver produces the matcher can find again in
//! an unchanged document.

mod matcher;
mod synthesis;

pub use matcher::{query, query_all, Segment, Selector};
pub use synthesis::{resolve, resolve_with};

/// Raised when the resolver had to abandon a preferred selector form.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorDiagnostic {
    /// The class-combination selector matched more than one element, so the
    /// resolver fell back to a positional path.
    AmbiguousClasses {
        /// The rejected class-based selector.
        candidate: String,
        /// How many elements it matched.
        matches: usize,
    },
}

impl std::fmt::Display for SelectorDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorDiagnostic::AmbiguousClasses { candidate, matches } => {
                write!(
                    f,
                    "selector '{}' is ambiguous ({} matches), using positional path",
                    candidate, matches
                )
            }
        }
    }
}
