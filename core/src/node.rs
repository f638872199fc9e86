//! Page content in the API's DOM-like node format.
//!
//! # Design
//! A node is either a text run or an element with optional attributes and
//! ordered children. `normalize` accepts the two representations callers
//! actually have in hand: a pre-built JSON node array, which passes through
//! untouched, or an HTML fragment, which is parsed and canonicalized into the
//! same tree. Anything the API would reject (unknown tags, broken markup) is
//! reported here instead of after a round-trip.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Tags the API accepts in page content.
pub const ALLOWED_TAGS: &[&str] = &[
    "a",
    "aside",
    "b",
    "blockquote",
    "br",
    "code",
    "em",
    "figcaption",
    "figure",
    "h3",
    "h4",
    "hr",
    "i",
    "iframe",
    "img",
    "li",
    "ol",
    "p",
    "pre",
    "s",
    "strong",
    "u",
    "ul",
    "video",
];

/// Attributes kept on elements parsed from HTML. All others are dropped.
pub const ALLOWED_ATTRS: &[&str] = &["href", "src"];

/// html5ever's report for `/>` on a non-void tag.
const SELF_CLOSING_ERROR: &str = "Unacknowledged self-closing tag";

/// A DOM node: a text run or an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Element(NodeElement),
}

/// A DOM element. Serializes as `{"tag", "attrs"?, "children"?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeElement {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Node>>,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    /// Concatenated text of this node and its descendants, in document order.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                for child in el.children.iter().flatten() {
                    child.collect_text(out);
                }
            }
        }
    }
}

impl NodeElement {
    /// Childless element without attributes.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: None,
            children: None,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.get_or_insert_with(Vec::new).push(node.into());
        self
    }
}

impl From<NodeElement> for Node {
    fn from(el: NodeElement) -> Self {
        Node::Element(el)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

/// Where a piece of content came from.
enum Parsed {
    /// A JSON node array, valid as given.
    Json(Vec<Node>),
    Html(Vec<Node>),
}

fn parse_content(content: &str) -> Result<Parsed> {
    match serde_json::from_str::<Vec<Node>>(content) {
        Ok(nodes) => Ok(Parsed::Json(nodes)),
        Err(err) if serde_json::from_str::<IgnoredAny>(content).is_ok() => Err(ApiError::Format(format!(
            "JSON content is not an array of nodes: {err}"
        ))),
        Err(_) => parse_html(content).map(Parsed::Html),
    }
}

/// Canonicalize page content into a node array.
///
/// A JSON array of nodes is returned as-is. Any other valid JSON is
/// rejected, since its intent cannot be inferred. Input that is not JSON at
/// all is parsed as an HTML fragment.
pub fn normalize(content: &str) -> Result<Vec<Node>> {
    match parse_content(content)? {
        Parsed::Json(nodes) | Parsed::Html(nodes) => Ok(nodes),
    }
}

/// Value of the `content` wire field for `content`, on behalf of `method`.
///
/// A JSON node array is validated and then sent exactly as written. HTML is
/// sent as the serialized node array it normalizes to.
pub fn content_field(method: &str, content: &str) -> Result<String> {
    match parse_content(content)? {
        Parsed::Json(_) => Ok(content.to_string()),
        Parsed::Html(nodes) => to_content_json(method, &nodes),
    }
}

/// Serialize a node array into the `content` wire field.
pub fn to_content_json(method: &str, nodes: &[Node]) -> Result<String> {
    serde_json::to_string(nodes).map_err(|source| ApiError::Encode {
        method: method.to_string(),
        source,
    })
}

/// Parse an HTML fragment into nodes. Multiple top-level siblings are allowed.
pub fn parse_html(fragment: &str) -> Result<Vec<Node>> {
    let html = Html::parse_fragment(fragment);
    // `<p/>` style self-closing syntax is tolerated: the element stays open
    // per HTML rules instead of failing the whole fragment.
    let errors: Vec<&str> = html
        .errors
        .iter()
        .map(|e| e.as_ref())
        .filter(|e| !e.starts_with(SELF_CLOSING_ERROR))
        .collect();
    if !errors.is_empty() {
        return Err(ApiError::Format(format!("malformed HTML: {}", errors.join("; "))));
    }
    convert_children(html.root_element())
}

fn convert_children(parent: ElementRef<'_>) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                let text: &str = text;
                // Formatting whitespace between tags.
                if !text.trim().is_empty() {
                    nodes.push(Node::Text(text.to_string()));
                }
            }
            scraper::Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    nodes.push(convert_element(el)?);
                }
            }
            _ => {}
        }
    }
    Ok(nodes)
}

fn convert_element(el: ElementRef<'_>) -> Result<Node> {
    let tag = el.value().name().to_ascii_lowercase();
    if !ALLOWED_TAGS.contains(&tag.as_str()) {
        return Err(ApiError::Format(format!("unsupported tag <{tag}>")));
    }

    let attrs: BTreeMap<String, String> = ALLOWED_ATTRS
        .iter()
        .filter_map(|name| el.value().attr(name).map(|v| (name.to_string(), v.to_string())))
        .collect();
    let children = convert_children(el)?;

    Ok(Node::Element(NodeElement {
        tag,
        attrs: (!attrs.is_empty()).then_some(attrs),
        children: (!children.is_empty()).then_some(children),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_paragraph() {
        let nodes = normalize("<p>Hello</p>").unwrap();
        assert_eq!(nodes, vec![Node::from(NodeElement::new("p").child("Hello"))]);
        assert_eq!(
            to_content_json("createPage", &nodes).unwrap(),
            r#"[{"tag":"p","children":["Hello"]}]"#
        );
    }

    #[test]
    fn link_keeps_only_allowed_attributes() {
        let nodes = normalize(r#"<a href="https://x" class="btn" target="_blank">t</a>"#).unwrap();
        let expected: Node = NodeElement::new("a").attr("href", "https://x").child("t").into();
        assert_eq!(nodes, vec![expected]);
    }

    #[test]
    fn multiple_top_level_siblings() {
        let nodes = normalize("<h3>Title</h3><p>Body</p>plain tail").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[2], Node::text("plain tail"));
    }

    #[test]
    fn whitespace_between_tags_is_dropped() {
        let html = "\n  <p>One</p>\n  <p>Two <b>bold</b> end</p>\n";
        let nodes = normalize(html).unwrap();
        let expected: Vec<Node> = vec![
            NodeElement::new("p").child("One").into(),
            NodeElement::new("p")
                .child("Two ")
                .child(NodeElement::new("b").child("bold"))
                .child(" end")
                .into(),
        ];
        assert_eq!(nodes, expected);
    }

    #[test]
    fn void_tags_are_childless() {
        let nodes = normalize(r#"<p>a<br>b</p><img src="/file/x.jpg"><hr/>"#).unwrap();
        assert_eq!(
            to_content_json("createPage", &nodes).unwrap(),
            r#"[{"tag":"p","children":["a",{"tag":"br"},"b"]},{"tag":"img","attrs":{"src":"/file/x.jpg"}},{"tag":"hr"}]"#
        );
    }

    #[test]
    fn tags_are_lower_cased() {
        let nodes = normalize("<P>Shout</P>").unwrap();
        assert_eq!(nodes, vec![Node::from(NodeElement::new("p").child("Shout"))]);
    }

    #[test]
    fn comments_are_skipped() {
        let nodes = normalize("<p>kept<!-- hidden --></p>").unwrap();
        assert_eq!(nodes, vec![Node::from(NodeElement::new("p").child("kept"))]);
    }

    #[test]
    fn entities_are_decoded() {
        let nodes = normalize("<p>fish &amp; chips</p>").unwrap();
        assert_eq!(nodes[0].plain_text(), "fish & chips");
    }

    #[test]
    fn unsupported_tag_is_format_error() {
        let err = normalize("<h1>Too big</h1>").unwrap_err();
        match err {
            ApiError::Format(msg) => assert!(msg.contains("h1"), "{msg}"),
            other => panic!("expected Format, got {other:?}"),
        }
    }

    #[test]
    fn truncated_markup_is_format_error() {
        let err = normalize(r#"<p>broken <a href="https://x"#).unwrap_err();
        assert!(matches!(err, ApiError::Format(_)));
    }

    #[test]
    fn stray_end_tag_is_format_error() {
        let err = normalize("<p>ok</p></div>").unwrap_err();
        assert!(matches!(err, ApiError::Format(_)));
    }

    #[test]
    fn json_array_passes_through_unchanged() {
        let json = r#"[{"tag":"h3","children":["A Sample Page"]},{"tag":"p","attrs":{"href":"x"},"children":["Hello ",{"tag":"b","children":["world"]}]},"tail"]"#;
        let nodes = normalize(json).unwrap();
        assert_eq!(to_content_json("createPage", &nodes).unwrap(), json);
    }

    #[test]
    fn json_array_is_sent_byte_for_byte() {
        let inputs = [
            r#"[{"children":["x"],"tag":"p"}]"#,
            r#"[{"tag":"a","attrs":{"src":"1","href":"2"}}]"#,
            r#"[{"tag":"p","attrs":null}]"#,
            "[ \"spaced\" ,\n {\"tag\" : \"br\"} ]",
        ];
        for input in inputs {
            assert_eq!(content_field("createPage", input).unwrap(), input);
        }
    }

    #[test]
    fn html_is_sent_as_its_node_array() {
        assert_eq!(
            content_field("editPage", "<p>Hi</p>").unwrap(),
            r#"[{"tag":"p","children":["Hi"]}]"#
        );
        let err = content_field("editPage", "<h1>nope</h1>").unwrap_err();
        assert!(matches!(err, ApiError::Format(_)));
    }

    #[test]
    fn self_closing_non_void_tag_is_an_element() {
        let nodes = normalize("<p>a</p><p/>").unwrap();
        let expected: Vec<Node> = vec![NodeElement::new("p").child("a").into(), NodeElement::new("p").into()];
        assert_eq!(nodes, expected);
    }

    #[test]
    fn json_array_keeps_empty_children() {
        let json = r#"[{"tag":"p","children":[]}]"#;
        let nodes = normalize(json).unwrap();
        assert_eq!(to_content_json("createPage", &nodes).unwrap(), json);
    }

    #[test]
    fn normalized_output_is_a_fixed_point() {
        let first = normalize("<p>Hi <a href=\"https://x\">there</a></p>\n<ul><li>one</li></ul>").unwrap();
        let json = to_content_json("createPage", &first).unwrap();
        let second = normalize(&json).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bare_json_scalar_is_format_error() {
        for input in ["42", "true", r#""just a string""#, r#"{"tag":"p"}"#] {
            let err = normalize(input).unwrap_err();
            assert!(matches!(err, ApiError::Format(_)), "{input}");
        }
    }

    #[test]
    fn json_array_of_wrong_shape_is_format_error() {
        let err = normalize(r#"[{"children":["no tag"]}]"#).unwrap_err();
        assert!(matches!(err, ApiError::Format(_)));

        let err = normalize("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ApiError::Format(_)));
    }

    #[test]
    fn plain_text_joins_descendants() {
        let node: Node = NodeElement::new("p")
            .child("a ")
            .child(NodeElement::new("em").child("b"))
            .child(" c")
            .into();
        assert_eq!(node.plain_text(), "a b c");
    }
}
