//! Page-description schema model.
//!
//! A schema describes one application: the components it may use
//! (`componentsMap`), a forest of component subtrees (`componentsTree`),
//! the pages that pick a subtree by id, optional routing and app metadata.
//!
//! ```text
//! Schema
//! ├── componentsMap: [ComponentMapEntry]   # package/import metadata per component
//! ├── componentsTree: [ComponentNode]      # addressable subtrees (by id)
//! ├── pages: [Page { id, treeId }]
//! ├── router.routes: [Route { path, page }]
//! └── meta: Meta { appVersion, project_name, .. }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Treat an explicit JSON `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Top-level schema document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Protocol version.
    #[serde(default, deserialize_with = "nullable")]
    pub version: String,

    /// Component metadata entries.
    #[serde(default, deserialize_with = "nullable")]
    pub components_map: Vec<ComponentMapEntry>,

    /// Addressable component subtrees.
    #[serde(default, deserialize_with = "nullable")]
    pub components_tree: Vec<ComponentNode>,

    /// Declared pages.
    #[serde(default, deserialize_with = "nullable")]
    pub pages: Vec<Page>,

    /// Optional routing table.
    #[serde(default)]
    pub router: Option<Router>,

    /// Application metadata.
    #[serde(default, deserialize_with = "nullable")]
    pub meta: Meta,
}

impl Schema {
    /// Parse a schema from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Parse(format!("schema is not valid JSON: {}", e)))
    }

    /// Find the subtree with the given id.
    pub fn find_tree(&self, tree_id: &str) -> Option<&ComponentNode> {
        self.components_tree
            .iter()
            .find(|node| node.id.as_deref() == Some(tree_id))
    }

    /// Declared routes, if the schema has an explicit routing table.
    pub fn declared_routes(&self) -> Option<&[Route]> {
        self.router.as_ref().and_then(|r| r.routes.as_deref())
    }
}

/// Package and import metadata for one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMapEntry {
    /// Component name, the lookup key.
    #[serde(default)]
    pub component_name: String,

    /// npm package name.
    #[serde(default)]
    pub package: String,

    /// Package version.
    #[serde(default)]
    pub version: String,

    /// Import as `{ exportName }` rather than a default import.
    #[serde(default)]
    pub destructuring: bool,

    /// Exported binding name; absent means a side-effect-only import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,

    /// Sub-path inside the package, starting with `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Side-effect imports that must accompany the component (stylesheets etc).
    #[serde(default, deserialize_with = "nullable")]
    pub extra_imports: Vec<ExtraImport>,
}

impl ComponentMapEntry {
    /// The full module path: package followed by the optional sub-path.
    pub fn module_path(&self) -> String {
        format!("{}{}", self.package, self.path.as_deref().unwrap_or_default())
    }
}

/// An additional side-effect import declared by a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraImport {
    #[serde(default)]
    pub path: Option<String>,
}

/// A node in the component tree: a literal string or a structured component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Emitted verbatim.
    Text(String),
    /// A component with props and children.
    Component(ComponentNode),
}

/// A structured component node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    /// Subtree id (only meaningful for `componentsTree` roots).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tag name.
    #[serde(default)]
    pub component_name: String,

    /// Props in declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, Value>>,

    /// Ordered children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,

    /// Page-level settings, read from page roots only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_config: Option<Value>,
}

impl ComponentNode {
    /// Children, or an empty slice when none are declared.
    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or_default()
    }
}

/// A page picks a component subtree by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub tree_id: String,
}

/// Routing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Router {
    #[serde(default)]
    pub routes: Option<Vec<Route>>,
}

/// One route: a URL path mapped to a page id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub path: String,
    pub page: String,
}

/// Application metadata.
///
/// Only the fields the build pipeline reads are typed; everything else is
/// kept so scaffold templates can still reference it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Application version; selects the `dist/<env>/<appVersion>` output folder.
    #[serde(rename = "appVersion", default)]
    pub app_version: String,

    /// Project name; the first path segment of published artifacts.
    #[serde(default)]
    pub project_name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Target deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    #[default]
    Fat,
    Uat,
    Pre,
    Pro,
}

impl Env {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fat => "fat",
            Self::Uat => "uat",
            Self::Pre => "pre",
            Self::Pro => "pro",
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Env {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fat" => Ok(Self::Fat),
            "uat" => Ok(Self::Uat),
            "pre" => Ok(Self::Pre),
            "pro" => Ok(Self::Pro),
            other => Err(Error::InvalidJob(format!(
                "unknown environment '{}' (expected fat, uat, pre or pro)",
                other
            ))),
        }
    }
}
