//! Import and markup generation for a component subtree.
//!
//! Both walks are depth-first and pre-order: a node's own import (or open tag
//! and text) comes before anything its children produce, and siblings keep
//! their declared order. The emitted sibling order depends on this.

use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

use super::dependency_index::DependencyIndex;
use crate::schema::{ComponentMapEntry, ComponentNode, TreeNode};

/// Props consumed by the generator instead of becoming attributes.
const NON_ATTRIBUTE_PROPS: &[&str] = &["text"];

/// Generated source for one page: its import statements and its markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSource {
    /// Unique import statements in first-seen order.
    pub imports: Vec<String>,
    /// Rendered tag markup.
    pub markup: String,
}

impl PageSource {
    /// Generate imports and markup for a forest of nodes.
    pub fn generate(nodes: &[TreeNode], index: &DependencyIndex) -> Self {
        let mut imports = ImportCollector::default();
        imports.visit_all(nodes, index);
        Self {
            imports: imports.statements,
            markup: render_nodes(nodes),
        }
    }

    /// The import block, one statement per line.
    pub fn import_block(&self) -> String {
        self.imports.join("\n")
    }

    /// The full page module: imports followed by a default-exported
    /// function of `props` returning the markup as a template string.
    pub fn to_module(&self) -> String {
        let mut module = String::new();
        module.push_str(&self.import_block());
        module.push('\n');
        module.push_str("export default (props) => {\n");
        module.push_str("  return `\n");
        module.push_str(&self.markup);
        module.push_str("\n`\n");
        module.push_str("}\n");
        module
    }
}

/// Collects unique import statements during a pre-order walk.
#[derive(Default)]
struct ImportCollector {
    seen: FxHashSet<String>,
    statements: Vec<String>,
}

impl ImportCollector {
    fn visit_all(&mut self, nodes: &[TreeNode], index: &DependencyIndex) {
        for node in nodes {
            if let TreeNode::Component(component) = node {
                if let Some(entry) = index.get(&component.component_name) {
                    let statement = import_statement(entry);
                    if self.seen.insert(statement.clone()) {
                        self.statements.push(statement);
                    }
                }
                self.visit_all(component.children(), index);
            }
        }
    }
}

/// Build the import statement for a component entry.
pub fn import_statement(entry: &ComponentMapEntry) -> String {
    let module = entry.module_path();
    match entry.export_name.as_deref().filter(|name| !name.is_empty()) {
        Some(name) if entry.destructuring => format!("import {{ {} }} from '{}'", name, module),
        Some(name) => format!("import {} from '{}'", name, module),
        None => format!("import '{}'", module),
    }
}

/// Render a forest of nodes, siblings separated by newlines.
pub fn render_nodes(nodes: &[TreeNode]) -> String {
    nodes.iter().map(render_node).collect::<Vec<_>>().join("\n")
}

fn render_node(node: &TreeNode) -> String {
    match node {
        TreeNode::Text(text) => text.clone(),
        TreeNode::Component(component) => render_component(component),
    }
}

fn render_component(component: &ComponentNode) -> String {
    let mut content = open_tag(&component.component_name, component.props.as_ref());

    if let Some(text) = component
        .props
        .as_ref()
        .and_then(|props| props.get("text"))
        .filter(|text| is_truthy(text))
    {
        content.push_str(&raw_value(text));
    }

    content.push_str(&render_nodes(component.children()));
    content.push_str(&format!("</{}>", component.component_name));
    content
}

fn open_tag(component_name: &str, props: Option<&Map<String, Value>>) -> String {
    let attributes = props.map(attribute_string).unwrap_or_default();
    if attributes.is_empty() {
        format!("<{}>", component_name)
    } else {
        format!("<{} {}>", component_name, attributes)
    }
}

/// Serialize props as tag attributes, in declaration order.
fn attribute_string(props: &Map<String, Value>) -> String {
    props
        .iter()
        .filter(|(key, _)| !NON_ATTRIBUTE_PROPS.contains(&key.as_str()))
        .map(|(key, value)| match (key.as_str(), value) {
            ("style", Value::Object(style)) => format!("style=\"{}\"", style_string(style)),
            ("style", other) => format!("style=\"{}\"", raw_value(other)),
            (key, Value::String(s)) => format!("{}='{}'", kebab_case(key), s),
            (key, other) => format!("{}='{}'", kebab_case(key), other),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `{fontSize: "12px", color: "red"}` -> `font-size: 12px;color: red`.
fn style_string(style: &Map<String, Value>) -> String {
    style
        .iter()
        .map(|(key, value)| format!("{}: {}", kebab_case(key), raw_value(value)))
        .collect::<Vec<_>>()
        .join(";")
}

/// Strings are emitted as-is; everything else as JSON.
/// Falsy text (`null`, `false`, `0`, `""`) is not injected.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn raw_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rewrite camelCase to kebab-case: every ASCII uppercase letter becomes `-`
/// followed by its lowercase form.
pub fn kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> TreeNode {
        serde_json::from_value(value).unwrap()
    }

    fn entry(name: &str, export: Option<&str>, destructuring: bool) -> ComponentMapEntry {
        ComponentMapEntry {
            component_name: name.to_string(),
            package: "@acme/ui".to_string(),
            version: "1.0.0".to_string(),
            destructuring,
            export_name: export.map(str::to_string),
            path: Some(format!("/dist/{}.js", name.to_lowercase())),
            extra_imports: Vec::new(),
        }
    }

    #[test]
    fn test_box_with_text_and_style() {
        let tree = node(json!({
            "componentName": "Box",
            "props": {"text": "hi", "style": {"fontSize": "12px"}},
            "children": []
        }));

        assert_eq!(render_nodes(&[tree]), r#"<Box style="font-size: 12px">hi</Box>"#);
    }

    #[test]
    fn test_attribute_order_and_serialization() {
        let tree = node(json!({
            "componentName": "Card",
            "props": {
                "maxWidth": "200px",
                "style": {"backgroundColor": "red", "marginTop": 4},
                "items": [1, 2],
                "disabled": true
            }
        }));

        assert_eq!(
            render_nodes(&[tree]),
            r#"<Card max-width='200px' style="background-color: red;margin-top: 4" items='[1,2]' disabled='true'></Card>"#
        );
    }

    #[test]
    fn test_children_and_literals() {
        let tree = node(json!({
            "componentName": "List",
            "props": {"text": "Title"},
            "children": [
                {"componentName": "Item", "props": {"text": "one"}},
                "raw <b>html</b>",
                {"componentName": "Item", "children": [{"componentName": "Icon"}]}
            ]
        }));

        assert_eq!(
            render_nodes(&[tree]),
            "<List>Title<Item>one</Item>\nraw <b>html</b>\n<Item><Icon></Icon></Item></List>"
        );
    }

    #[test]
    fn test_top_level_siblings_joined_by_newline() {
        let nodes = vec![node(json!({"componentName": "A"})), node(json!("text"))];
        assert_eq!(render_nodes(&nodes), "<A></A>\ntext");
    }

    #[test]
    fn test_non_string_text_is_json() {
        let tree = node(json!({"componentName": "Count", "props": {"text": 42}}));
        assert_eq!(render_nodes(&[tree]), "<Count>42</Count>");
    }

    #[test]
    fn test_falsy_text_is_skipped() {
        for text in [json!(null), json!(false), json!(0), json!("")] {
            let tree = node(json!({"componentName": "Label", "props": {"text": text}}));
            assert_eq!(render_nodes(&[tree]), "<Label></Label>");
        }
    }

    #[test]
    fn test_import_shapes() {
        assert_eq!(
            import_statement(&entry("Button", Some("Button"), true)),
            "import { Button } from '@acme/ui/dist/button.js'"
        );
        assert_eq!(
            import_statement(&entry("Chart", Some("Chart"), false)),
            "import Chart from '@acme/ui/dist/chart.js'"
        );
        assert_eq!(
            import_statement(&entry("Reset", None, false)),
            "import '@acme/ui/dist/reset.js'"
        );
    }

    #[test]
    fn test_identical_imports_collapse() {
        let index = DependencyIndex::new(&[entry("Button", Some("Button"), true)]);
        let nodes = vec![
            node(json!({"componentName": "Button"})),
            node(json!({"componentName": "Wrapper", "children": [{"componentName": "Button"}]})),
        ];

        let page = PageSource::generate(&nodes, &index);
        assert_eq!(page.imports, vec!["import { Button } from '@acme/ui/dist/button.js'"]);
    }

    #[test]
    fn test_distinct_export_names_both_survive() {
        let mut primary = entry("PrimaryButton", Some("PrimaryButton"), true);
        primary.path = Some("/dist/index.js".to_string());
        let mut ghost = entry("GhostButton", Some("GhostButton"), true);
        ghost.path = Some("/dist/index.js".to_string());
        let index = DependencyIndex::new(&[primary, ghost]);

        let nodes = vec![node(json!({
            "componentName": "PrimaryButton",
            "children": [{"componentName": "GhostButton"}, {"componentName": "Unknown"}, "text"]
        }))];

        let page = PageSource::generate(&nodes, &index);
        assert_eq!(
            page.imports,
            vec![
                "import { PrimaryButton } from '@acme/ui/dist/index.js'",
                "import { GhostButton } from '@acme/ui/dist/index.js'",
            ]
        );
    }

    #[test]
    fn test_module_shape() {
        let index = DependencyIndex::new(&[entry("Box", Some("Box"), false)]);
        let page = PageSource::generate(&[node(json!({"componentName": "Box"}))], &index);

        assert_eq!(
            page.to_module(),
            "import Box from '@acme/ui/dist/box.js'\nexport default (props) => {\n  return `\n<Box></Box>\n`\n}\n"
        );
    }

    #[test]
    fn test_kebab_case() {
        assert_eq!(kebab_case("fontSize"), "font-size");
        assert_eq!(kebab_case("dataTestID"), "data-test-i-d");
        assert_eq!(kebab_case("plain"), "plain");
    }
}
