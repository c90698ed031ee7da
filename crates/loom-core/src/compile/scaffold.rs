//! Scaffold stamping: renders template files in a staged tree.
//!
//! Any file whose name ends in `.hbs` is rendered with the compile context
//! and written next to itself without the marker (`index.html.hbs` becomes
//! `index.html`); the template itself is removed. Other files are untouched.

use std::fs;
use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

use super::dependency_index::PackageDependency;
use crate::error::{Error, Result};
use crate::schema::{Env, Meta};

/// Marker extension for template files.
pub const TEMPLATE_EXTENSION: &str = "hbs";

/// A route annotated with the relative module path of its page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRoute {
    pub path: String,
    pub page: String,
    pub page_path: String,
}

/// Context handed to every scaffold template.
#[derive(Debug, Clone, Serialize)]
pub struct ScaffoldContext {
    pub meta: Meta,
    pub routes: Vec<ResolvedRoute>,
    #[serde(rename = "APP_ENV")]
    pub app_env: Env,
    #[serde(rename = "isPreview")]
    pub is_preview: bool,
    pub dependencies: Vec<PackageDependency>,
    #[serde(rename = "extraImports")]
    pub extra_imports: Vec<String>,
    #[serde(rename = "pageConfig")]
    pub page_config: Value,
    /// Simple mode only: the page's import block.
    #[serde(rename = "importContent", skip_serializing_if = "Option::is_none")]
    pub import_content: Option<String>,
    /// Simple mode only: the page's rendered markup.
    #[serde(rename = "componentsContent", skip_serializing_if = "Option::is_none")]
    pub components_content: Option<String>,
}

/// Renders `.hbs` files found under a root directory.
pub struct ScaffoldRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for ScaffoldRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScaffoldRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Output is JS/HTML source, never user-facing text.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(false);
        Self { handlebars }
    }

    /// Find every template file under `root`, sorted by path.
    pub fn find_templates(root: &Path) -> Result<Vec<PathBuf>> {
        let mut templates = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if entry.file_type().is_file() && is_template(entry.path()) {
                templates.push(entry.into_path());
            }
        }
        Ok(templates)
    }

    /// Render every template under `root`, returning the written paths.
    pub fn render_tree(&self, root: &Path, context: &ScaffoldContext) -> Result<Vec<PathBuf>> {
        let data = serde_json::to_value(context)?;
        let mut written = Vec::new();
        for template_path in Self::find_templates(root)? {
            written.push(self.render_file(&template_path, &data)?);
        }
        Ok(written)
    }

    /// Render one template file and replace it with its output.
    pub fn render_file(&self, template_path: &Path, data: &Value) -> Result<PathBuf> {
        let source = fs::read_to_string(template_path)?;
        let rendered = self
            .handlebars
            .render_template(&source, data)
            .map_err(|e| Error::Template {
                path: template_path.display().to_string(),
                message: e.to_string(),
            })?;

        let dest_path = template_path.with_extension("");
        fs::write(&dest_path, rendered)?;
        fs::remove_file(template_path)?;
        tracing::info!("Generated {}", dest_path.display());
        Ok(dest_path)
    }
}

fn is_template(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn context() -> ScaffoldContext {
        ScaffoldContext {
            meta: Meta {
                app_version: "1.0.0".to_string(),
                project_name: "demo".to_string(),
                ..Default::default()
            },
            routes: vec![ResolvedRoute {
                path: String::new(),
                page: "home".to_string(),
                page_path: "./pages/home".to_string(),
            }],
            app_env: Env::Uat,
            is_preview: true,
            dependencies: vec![PackageDependency {
                package: "@acme/ui".to_string(),
                version: "1.0.0".to_string(),
            }],
            extra_imports: vec!["import '@acme/ui/style.css'".to_string()],
            page_config: json!({"title": "Home"}),
            import_content: None,
            components_content: None,
        }
    }

    #[test]
    fn test_renders_and_strips_marker() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("main.js.hbs"),
            "{{#each extraImports}}{{this}}\n{{/each}}const env = '{{APP_ENV}}'; // {{pageConfig.title}} <{{isPreview}}>",
        )
        .unwrap();
        fs::write(src.join("untouched.js"), "{{APP_ENV}}").unwrap();

        let written = ScaffoldRenderer::new().render_tree(temp.path(), &context()).unwrap();

        assert_eq!(written, vec![src.join("main.js")]);
        assert!(!src.join("main.js.hbs").exists());
        assert_eq!(
            fs::read_to_string(src.join("main.js")).unwrap(),
            "import '@acme/ui/style.css'\nconst env = 'uat'; // Home <true>"
        );
        assert_eq!(fs::read_to_string(src.join("untouched.js")).unwrap(), "{{APP_ENV}}");
    }

    #[test]
    fn test_manifest_dependencies_and_routes() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("package.json.hbs"),
            "{{#each dependencies}}\"{{package}}\": \"{{version}}\"{{/each}}|{{#each routes}}{{pagePath}}{{/each}}|{{meta.appVersion}}",
        )
        .unwrap();

        ScaffoldRenderer::new().render_tree(temp.path(), &context()).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("package.json")).unwrap(),
            "\"@acme/ui\": \"1.0.0\"|./pages/home|1.0.0"
        );
    }

    #[test]
    fn test_bad_template_reports_path() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("broken.html.hbs"), "{{#each}}").unwrap();

        let err = ScaffoldRenderer::new().render_tree(temp.path(), &context()).unwrap_err();
        match err {
            Error::Template { path, .. } => assert!(path.ends_with("broken.html.hbs")),
            other => panic!("expected template error, got {:?}", other),
        }
    }
}
