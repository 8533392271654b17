use crate::dom::{Document, NodeId};
use crate::error::{DomrecError, Result};

/// One space-separated level of a selector path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `#id`
    Id(String),
    /// `[name="…"]`
    Name(String),
    /// `tag`, `tag.c1.c2`, `tag:nth-of-type(n)`
    Compound {
        tag: String,
        classes: Vec<String>,
        nth: Option<usize>,
    },
}

impl Segment {
    fn parse(raw: &str) -> Result<Segment> {
        if let Some(id) = raw.strip_prefix('#') {
            if id.is_empty() {
                return Err(DomrecError::Parse("empty id selector".to_string()));
            }
            return Ok(Segment::Id(id.to_string()));
        }
        if let Some(rest) = raw.strip_prefix("[name=\"") {
            let name = rest.strip_suffix("\"]").ok_or_else(|| {
                DomrecError::Parse(format!("malformed name selector '{}'", raw))
            })?;
            return Ok(Segment::Name(name.to_string()));
        }

        let (raw, nth) = match raw.find(":nth-of-type(") {
            Some(pos) => {
                let inner = raw[pos + ":nth-of-type(".len()..]
                    .strip_suffix(')')
                    .ok_or_else(|| {
                        DomrecError::Parse(format!(
                            "malformed nth-of-type in '{}'",
                            raw
                        ))
                    })?;
                let n: usize = inner.parse().map_err(|_| {
                    DomrecError::Parse(format!("bad ordinal in '{}'", raw))
                })?;
                (&raw[..pos], Some(n))
            }
            None => (raw, None),
        };

        let mut parts = raw.split('.');
        let tag = parts.next().unwrap_or_default().to_string();
        if tag.is_empty() {
            return Err(DomrecError::Parse(format!(
                "selector segment '{}' has no tag",
                raw
            )));
        }
        let classes: Vec<String> =
            parts.filter(|c| !c.is_empty()).map(|c| c.to_string()).collect();
        Ok(Segment::Compound { tag, classes, nth })
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let el = doc.get(node);
        match self {
            Segment::Id(id) => el.id() == Some(id.as_str()),
            Segment::Name(name) => el.name() == Some(name.as_str()),
            Segment::Compound { tag, classes, nth } => {
                if &el.tag != tag {
                    return false;
                }
                let have = el.classes();
                if !classes.iter().all(|c| have.contains(&c.as_str())) {
                    return false;
                }
                match nth {
                    Some(n) => doc.same_tag_ordinal(node) == *n,
                    None => true,
                }
            }
        }
    }
}

/// A parsed selector: one or more segments joined by the descendant
/// combinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    segments: Vec<Segment>,
}

impl Selector {
    pub fn parse(raw: &str) -> Result<Selector> {
        let segments: Vec<Segment> = raw
            .split_whitespace()
            .map(Segment::parse)
            .collect::<Result<_>>()?;
        if segments.is_empty() {
            return Err(DomrecError::Parse("empty selector".to_string()));
        }
        Ok(Selector { segments })
    }

    /// All matching nodes, in document order.
    pub fn find_all(&self, doc: &Document) -> Vec<NodeId> {
        let mut current: Vec<NodeId> = doc
            .iter()
            .filter(|&n| self.segments[0].matches(doc, n))
            .collect();
        for segment in &self.segments[1..] {
            current = doc
                .iter()
                .filter(|&n| {
                    segment.matches(doc, n)
                        && current.iter().any(|&a| doc.is_ancestor(a, n))
                })
                .collect();
        }
        current
    }
}

/// All elements matching `raw`, in document order. A selector that fails to
/// parse matches nothing.
pub fn query_all(doc: &Document, raw: &str) -> Vec<NodeId> {
    match Selector::parse(raw) {
        Ok(sel) => sel.find_all(doc),
        Err(e) => {
            log::warn!("ignoring unparseable selector '{}': {}", raw, e);
            Vec::new()
        }
    }
}

/// First match in document order.
pub fn query(doc: &Document, raw: &str) -> Option<NodeId> {
    query_all(doc, raw).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <body>
          <div id="top" class="panel">
            <span class="label hot">A</span>
            <span class="label">B</span>
          </div>
          <div class="panel">
            <span class="label hot">C</span>
            <input name="q" type="text"/>
          </div>
        </body>
    "#;

    fn doc() -> Document {
        Document::parse(PAGE).unwrap()
    }

    #[test]
    fn test_id_and_name_segments() {
        let d = doc();
        let top = query(&d, "#top").unwrap();
        assert_eq!(d.get(top).id(), Some("top"));
        let q = query(&d, "[name=\"q\"]").unwrap();
        assert_eq!(d.get(q).name(), Some("q"));
        assert!(query(&d, "#missing").is_none());
    }

    #[test]
    fn test_class_combination() {
        let d = doc();
        assert_eq!(query_all(&d, "span.label").len(), 3);
        assert_eq!(query_all(&d, "span.label.hot").len(), 2);
    }

    #[test]
    fn test_descendant_path_and_nth() {
        let d = doc();
        let hits = query_all(&d, "div:nth-of-type(2) span.hot");
        assert_eq!(hits.len(), 1);
        assert_eq!(d.rendered_text(hits[0]), "C");
        // id-anchored path
        let hits = query_all(&d, "#top span:nth-of-type(2)");
        assert_eq!(hits.len(), 1);
        assert_eq!(d.rendered_text(hits[0]), "B");
    }

    #[test]
    fn test_document_order_first_match() {
        let d = doc();
        let first = query(&d, "span.hot").unwrap();
        assert_eq!(d.rendered_text(first), "A");
    }

    #[test]
    fn test_malformed_selector_matches_nothing() {
        let d = doc();
        assert!(query_all(&d, "[name=\"unterminated").is_empty());
        assert!(query_all(&d, "").is_empty());
    }

    #[test]
    fn test_parse_round_trip_shapes() {
        let sel = Selector::parse("#root div.a.b:nth-of-type(3)").unwrap();
        assert_eq!(sel.segments.len(), 2);
        assert_eq!(sel.segments[0], Segment::Id("root".to_string()));
        assert_eq!(
            sel.segments[1],
            Segment::Compound {
                tag: "div".to_string(),
                classes: vec!["a".to_string(), "b".to_string()],
                nth: Some(3),
            }
        );
    }
}
