//! In-memory document model.
//!
//! A document snapshot is parsed from XML/XHTML markup into a flat arena of
//! elements with parent/children links. The arena index (`NodeId`) is stable
//! for the life of the document and doubles as the element handle everywhere
//! else in the crate.

use std::collections::HashMap;

use crate::error::{DomrecError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

pub type NodeId = usize;

/// A single element in the snapshot.
#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attrs: HashMap<String, String>,
    /// Direct text content of this element (not descendants).
    pub text: String,
    /// Current value of a form control; seeded from the `value` attribute.
    pub value: String,
    /// Checked state of a toggle control; seeded from the `checked` attribute.
    pub checked: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|v| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|v| !v.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.attr("name").filter(|v| !v.is_empty())
    }

    /// Class attribute split on whitespace, empty tokens dropped.
    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn input_type(&self) -> Option<&str> {
        if self.tag == "input" {
            Some(self.attr("type").unwrap_or("text"))
        } else {
            None
        }
    }

    /// Checkbox or radio input.
    pub fn is_toggle(&self) -> bool {
        matches!(self.input_type(), Some("checkbox") | Some("radio"))
    }

    pub fn is_select(&self) -> bool {
        self.tag == "select"
    }

    pub fn is_secret(&self) -> bool {
        self.input_type() == Some("password")
    }

    /// A field whose value the user edits by typing.
    pub fn is_editable(&self) -> bool {
        if self.tag == "textarea" {
            return true;
        }
        match self.input_type() {
            Some("checkbox") | Some("radio") | Some("button") | Some("submit")
            | Some("reset") | Some("file") => false,
            Some(_) => true,
            None => false,
        }
    }
}

/// Element arena for one document snapshot.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
    root: NodeId,
}

impl Document {
    /// Parse a snapshot from markup. Exactly one root element is expected.
    pub fn parse(xml: &str) -> Result<Document> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut nodes: Vec<Element> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf);
            match event {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let self_closing = matches!(&event, Ok(Event::Empty(_)));
                    let tag = String::from_utf8_lossy(e.name().as_ref())
                        .to_lowercase();
                    let mut attrs = HashMap::new();
                    for attr in e.attributes().filter_map(|a| a.ok()) {
                        let key =
                            String::from_utf8_lossy(attr.key.as_ref()).to_string();
                        let value = decode_entities(&String::from_utf8_lossy(
                            &attr.value,
                        ));
                        attrs.insert(key, value);
                    }
                    let id = nodes.len();
                    let parent = stack.last().copied();
                    let value = attrs.get("value").cloned().unwrap_or_default();
                    let checked = attrs.contains_key("checked");
                    nodes.push(Element {
                        tag,
                        attrs,
                        text: String::new(),
                        value,
                        checked,
                        parent,
                        children: Vec::new(),
                    });
                    match parent {
                        Some(p) => nodes[p].children.push(id),
                        None => {
                            if root.is_some() {
                                return Err(DomrecError::Parse(
                                    "multiple root elements".to_string(),
                                ));
                            }
                            root = Some(id);
                        }
                    }
                    if !self_closing {
                        stack.push(id);
                    }
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Text(t)) => {
                    if let Some(&cur) = stack.last() {
                        let raw = String::from_utf8_lossy(&t.into_inner())
                            .to_string();
                        let decoded = decode_entities(&raw);
                        if !nodes[cur].text.is_empty() {
                            nodes[cur].text.push(' ');
                        }
                        nodes[cur].text.push_str(decoded.trim());
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(DomrecError::Parse(format!(
                        "markup error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        let root =
            root.ok_or_else(|| DomrecError::Parse("empty document".to_string()))?;
        Ok(Document { nodes, root })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> &Element {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in document order. Arena order is document order because
    /// elements are pushed as their start tags are read.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        0..self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// True when `ancestor` lies on the parent chain of `id` (strict).
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = self.nodes[id].parent;
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.nodes[p].parent;
        }
        false
    }

    /// 1-based position of `id` among siblings that share its tag name.
    pub fn same_tag_ordinal(&self, id: NodeId) -> usize {
        let tag = &self.nodes[id].tag;
        match self.nodes[id].parent {
            Some(p) => {
                let mut ordinal = 0;
                for &child in &self.nodes[p].children {
                    if &self.nodes[child].tag == tag {
                        ordinal += 1;
                    }
                    if child == id {
                        break;
                    }
                }
                ordinal
            }
            None => 1,
        }
    }

    /// Rendered text of an element: its own text and that of all
    /// descendants, in document order, whitespace-collapsed.
    pub fn rendered_text(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        self.collect_text(id, &mut parts);
        parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, id: NodeId, out: &mut Vec<String>) {
        let node = &self.nodes[id];
        if !node.text.is_empty() {
            out.push(node.text.clone());
        }
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }

    /// Address a node by child-index path from the root, e.g. `[0, 2]` is
    /// the third child of the root's first child. An empty path is the root.
    pub fn node_at_path(&self, path: &[usize]) -> Option<NodeId> {
        let mut cur = self.root;
        for &idx in path {
            cur = *self.nodes[cur].children.get(idx)?;
        }
        Some(cur)
    }
}

/// Decode the named entities XHTML snapshots commonly carry plus numeric
/// character references.
pub fn decode_entities(text: &str) -> String {
    let mut result = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    if let Ok(re) = regex::Regex::new(r"&#(\d+);") {
        result = re
            .replace_all(&result, |caps: &regex::Captures| {
                caps[1]
                    .parse::<u32>()
                    .ok()
                    .and_then(char::from_u32)
                    .map(|c| c.to_string())
                    .unwrap_or_default()
            })
            .to_string();
    }
    if let Ok(re) = regex::Regex::new(r"&#x([0-9a-fA-F]+);") {
        result = re
            .replace_all(&result, |caps: &regex::Captures| {
                u32::from_str_radix(&caps[1], 16)
                    .ok()
                    .and_then(char::from_u32)
                    .map(|c| c.to_string())
                    .unwrap_or_default()
            })
            .to_string();
    }
    // &amp; last so freshly decoded ampersands don't re-trigger
    result.replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <body>
            <div id="main" class="container">
              <p>Hello &amp; welcome</p>
              <p>Second</p>
              <input type="checkbox" name="agree" checked="checked"/>
              <input type="password" name="pw"/>
              <select name="color">
                <option value="red">Red</option>
                <option value="blue">Blue</option>
              </select>
            </div>
          </body>
        </html>
    "#;

    #[test]
    fn test_parse_builds_tree() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(doc.get(doc.root()).tag, "html");
        let main = doc
            .iter()
            .find(|&n| doc.get(n).id() == Some("main"))
            .unwrap();
        assert_eq!(doc.get(main).children.len(), 5);
        assert!(doc.is_ancestor(doc.root(), main));
    }

    #[test]
    fn test_text_decoding() {
        let doc = Document::parse(PAGE).unwrap();
        let p = doc.iter().find(|&n| doc.get(n).tag == "p").unwrap();
        assert_eq!(doc.get(p).text, "Hello & welcome");
    }

    #[test]
    fn test_same_tag_ordinals() {
        let doc = Document::parse(PAGE).unwrap();
        let ps: Vec<_> =
            doc.iter().filter(|&n| doc.get(n).tag == "p").collect();
        assert_eq!(doc.same_tag_ordinal(ps[0]), 1);
        assert_eq!(doc.same_tag_ordinal(ps[1]), 2);
        // inputs count separately from the p siblings
        let inputs: Vec<_> =
            doc.iter().filter(|&n| doc.get(n).tag == "input").collect();
        assert_eq!(doc.same_tag_ordinal(inputs[1]), 2);
    }

    #[test]
    fn test_control_classification() {
        let doc = Document::parse(PAGE).unwrap();
        let checkbox = doc
            .iter()
            .find(|&n| doc.get(n).name() == Some("agree"))
            .unwrap();
        assert!(doc.get(checkbox).is_toggle());
        assert!(doc.get(checkbox).checked);
        let pw = doc
            .iter()
            .find(|&n| doc.get(n).name() == Some("pw"))
            .unwrap();
        assert!(doc.get(pw).is_secret());
        assert!(doc.get(pw).is_editable());
        let select = doc.iter().find(|&n| doc.get(n).is_select()).unwrap();
        assert!(!doc.get(select).is_editable());
    }

    #[test]
    fn test_rendered_text_spans_descendants() {
        let doc = Document::parse(PAGE).unwrap();
        let select = doc.iter().find(|&n| doc.get(n).is_select()).unwrap();
        assert_eq!(doc.rendered_text(select), "Red Blue");
    }

    #[test]
    fn test_node_at_path() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(doc.node_at_path(&[]), Some(doc.root()));
        let main = doc.node_at_path(&[0, 0]).unwrap();
        assert_eq!(doc.get(main).id(), Some("main"));
        assert!(doc.node_at_path(&[9]).is_none());
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(decode_entities("caf&#233;"), "café");
        assert_eq!(decode_entities("&#x41;&amp;&#x42;"), "A&B");
    }
}
