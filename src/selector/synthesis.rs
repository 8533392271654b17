use crate::dom::{Document, NodeId};

use super::matcher::query_all;
use super::SelectorDiagnostic;

/// Synthesize a selector for `node`, reporting fallbacks to `diag`.
///
/// Deterministic: the same node in the same document always yields the same
/// string. Total: every node gets a selector, the positional path being the
/// last resort.
pub fn resolve_with(
    doc: &Document,
    node: NodeId,
    diag: &mut dyn FnMut(SelectorDiagnostic),
) -> String {
    let el = doc.get(node);

    if let Some(id) = el.id() {
        return format!("#{}", id);
    }

    if let Some(name) = el.name() {
        return format!("[name=\"{}\"]", name);
    }

    let classes = el.classes();
    if !classes.is_empty() {
        let candidate = format!("{}.{}", el.tag, classes.join("."));
        let matches = query_all(doc, &candidate).len();
        if matches == 1 {
            return candidate;
        }
        diag(SelectorDiagnostic::AmbiguousClasses { candidate, matches });
    }

    positional_path(doc, node)
}

/// Synthesize a selector for `node`, logging fallbacks.
pub fn resolve(doc: &Document, node: NodeId) -> String {
    resolve_with(doc, node, &mut |d| log::debug!("{}", d))
}

/// Tag path from the nearest id-bearing ancestor (or the document root,
/// exclusive) down to the node, with 1-based `:nth-of-type` ordinals where
/// a level has same-tag siblings ahead of it.
fn positional_path(doc: &Document, node: NodeId) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut cur = node;
    loop {
        segments.push(level_segment(doc, cur));
        match doc.parent(cur) {
            Some(parent) if parent != doc.root() => {
                if let Some(id) = doc.get(parent).id() {
                    segments.push(format!("#{}", id));
                    break;
                }
                cur = parent;
            }
            _ => break,
        }
    }
    segments.reverse();
    segments.join(" ")
}

fn level_segment(doc: &Document, node: NodeId) -> String {
    let tag = &doc.get(node).tag;
    let ordinal = doc.same_tag_ordinal(node);
    if ordinal > 1 {
        format!("{}:nth-of-type({})", tag, ordinal)
    } else {
        tag.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::query;

    const PAGE: &str = r#"
        <body>
          <div id="header">
            <button name="save" class="btn">Save</button>
          </div>
          <div class="content">
            <p class="note">one</p>
            <p class="note">two</p>
            <p class="unique">three</p>
          </div>
          <div id="footer">
            <span>a</span>
            <span>b</span>
          </div>
        </body>
    "#;

    fn doc() -> Document {
        Document::parse(PAGE).unwrap()
    }

    fn node_with_text(d: &Document, text: &str) -> NodeId {
        d.iter().find(|&n| d.get(n).text == text).unwrap()
    }

    #[test]
    fn test_id_wins() {
        let d = doc();
        let header = d
            .iter()
            .find(|&n| d.get(n).id() == Some("header"))
            .unwrap();
        assert_eq!(resolve(&d, header), "#header");
    }

    #[test]
    fn test_name_beats_classes() {
        let d = doc();
        let btn = d.iter().find(|&n| d.get(n).tag == "button").unwrap();
        assert_eq!(resolve(&d, btn), "[name=\"save\"]");
    }

    #[test]
    fn test_unique_class_combination_accepted() {
        let d = doc();
        let three = node_with_text(&d, "three");
        let mut diags = Vec::new();
        let sel = resolve_with(&d, three, &mut |x| diags.push(x));
        assert_eq!(sel, "p.unique");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_ambiguous_classes_fall_back_with_diagnostic() {
        let d = doc();
        let two = node_with_text(&d, "two");
        let mut diags = Vec::new();
        let sel = resolve_with(&d, two, &mut |x| diags.push(x));
        assert_eq!(sel, "div:nth-of-type(2) p:nth-of-type(2)");
        assert_eq!(
            diags,
            vec![SelectorDiagnostic::AmbiguousClasses {
                candidate: "p.note".to_string(),
                matches: 2,
            }]
        );
    }

    #[test]
    fn test_id_anchored_path() {
        let d = doc();
        let b = node_with_text(&d, "b");
        assert_eq!(resolve(&d, b), "#footer span:nth-of-type(2)");
    }

    #[test]
    fn test_first_sibling_omits_ordinal() {
        let d = doc();
        let a = node_with_text(&d, "a");
        assert_eq!(resolve(&d, a), "#footer span");
    }

    #[test]
    fn test_resolve_finds_itself() {
        let d = doc();
        for n in d.iter() {
            let sel = resolve(&d, n);
            assert_eq!(query(&d, &sel), Some(n), "selector '{}'", sel);
        }
    }

    #[test]
    fn test_determinism() {
        let d = doc();
        let two = node_with_text(&d, "two");
        assert_eq!(resolve(&d, two), resolve(&d, two));
    }
}
