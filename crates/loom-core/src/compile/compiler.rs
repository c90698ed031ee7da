//! Schema compiler: turns a schema into generated modules inside a staged
//! template tree.
//!
//! Compilation runs in two phases. [`CompilePlan::new`] validates the schema
//! and generates every module in memory; nothing touches the filesystem until
//! the plan is complete, so a malformed schema never leaves a half-written
//! tree. [`SchemaCompiler::compile`] then writes the plan out.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::dependency_index::{DependencyIndex, extra_imports};
use super::markup::PageSource;
use super::scaffold::{ResolvedRoute, ScaffoldContext, ScaffoldRenderer};
use crate::error::{Error, Result};
use crate::paths::is_plain_name;
use crate::schema::{Env, Schema};

/// Pre-boot integrity check served alongside every bundle.
const PAGE_VALID_CHECK: &str = include_str!("../../assets/page-valid-check.js");

/// Location of the validation script inside the staged tree.
pub const PAGE_VALID_CHECK_PATH: &str = "src/page-valid-check.js";

/// Directory whose presence selects standard mode.
pub const PAGES_DIR: &str = "src/pages";

/// How the staged template expects generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// One module per declared page under `src/pages/`.
    Standard,
    /// A single document body built from the first page, injected through
    /// the scaffold context.
    Simple,
}

impl CompileMode {
    /// Select the mode from the staged tree: a `src/pages` directory means
    /// the template wants one module per page.
    pub fn detect(staging_dir: &Path) -> Self {
        if staging_dir.join(PAGES_DIR).is_dir() {
            Self::Standard
        } else {
            Self::Simple
        }
    }
}

/// A fully generated, validated compilation that has not been written yet.
#[derive(Debug, Clone)]
pub struct CompilePlan {
    pub mode: CompileMode,
    /// Generated page sources, keyed by page id, in declaration order.
    /// Simple mode holds only the first page.
    pub pages: Vec<(String, PageSource)>,
    pub context: ScaffoldContext,
}

impl CompilePlan {
    /// Validate the schema and generate all sources for the given mode.
    pub fn new(schema: &Schema, mode: CompileMode, env: Env, is_preview: bool) -> Result<Self> {
        if schema.pages.is_empty() {
            return Err(Error::Validation("schema declares no pages".to_string()));
        }
        if schema.components_tree.is_empty() {
            return Err(Error::Validation(
                "schema declares no componentsTree".to_string(),
            ));
        }

        // Page ids name generated files and appVersion names the output
        // directory, so both must stay inside the staging tree.
        if let Some(page) = schema.pages.iter().find(|page| !is_plain_name(&page.id)) {
            return Err(Error::Validation(format!(
                "page id '{}' is not a valid file name",
                page.id
            )));
        }
        let app_version = &schema.meta.app_version;
        if !app_version.is_empty() && !is_plain_name(app_version) {
            return Err(Error::Validation(format!(
                "meta.appVersion '{}' is not a valid directory name",
                app_version
            )));
        }

        let index = DependencyIndex::new(&schema.components_map);

        let selected = match mode {
            CompileMode::Standard => &schema.pages[..],
            CompileMode::Simple => &schema.pages[..1],
        };

        let mut pages = Vec::with_capacity(selected.len());
        for page in selected {
            let tree = schema.find_tree(&page.tree_id).ok_or_else(|| {
                Error::Validation(format!(
                    "page '{}' refers to treeId '{}' which is not in componentsTree",
                    page.id, page.tree_id
                ))
            })?;
            if tree.children().is_empty() {
                return Err(Error::Validation(format!(
                    "componentsTree entry '{}' (page '{}') has no children",
                    page.tree_id, page.id
                )));
            }
            pages.push((page.id.clone(), PageSource::generate(tree.children(), &index)));
        }

        let page_config = schema
            .find_tree(&schema.pages[0].tree_id)
            .and_then(|tree| tree.page_config.clone())
            .unwrap_or_else(|| Value::Object(Default::default()));

        let (import_content, components_content) = match mode {
            CompileMode::Simple => {
                let (_, source) = &pages[0];
                (Some(source.import_block()), Some(source.markup.clone()))
            }
            CompileMode::Standard => (None, None),
        };

        let context = ScaffoldContext {
            meta: schema.meta.clone(),
            routes: resolve_routes(schema),
            app_env: env,
            is_preview,
            dependencies: index.dedupe_packages(),
            extra_imports: extra_imports(&schema.components_map),
            page_config,
            import_content,
            components_content,
        };

        Ok(Self {
            mode,
            pages,
            context,
        })
    }
}

/// Routes from the schema, or a single root route to the first page.
pub fn resolve_routes(schema: &Schema) -> Vec<ResolvedRoute> {
    let annotate = |path: &str, page: &str| ResolvedRoute {
        path: path.to_string(),
        page: page.to_string(),
        page_path: format!("./pages/{}", page),
    };

    match schema.declared_routes() {
        Some(routes) => routes
            .iter()
            .map(|route| annotate(&route.path, &route.page))
            .collect(),
        None => schema
            .pages
            .first()
            .map(|page| vec![annotate("", &page.id)])
            .unwrap_or_default(),
    }
}

/// What a compilation wrote into the staging tree.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub mode: CompileMode,
    /// Generated page modules (standard mode only).
    pub page_files: Vec<PathBuf>,
    /// Files produced from scaffold templates.
    pub scaffold_files: Vec<PathBuf>,
}

/// Compiles schemas into a staged template tree.
#[derive(Default)]
pub struct SchemaCompiler {
    renderer: ScaffoldRenderer,
}

impl SchemaCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `schema` into `staging_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before any write when the schema has no
    /// pages, no componentsTree, an unresolved treeId, an empty page tree, or
    /// a page id or appVersion that is not a plain file name.
    pub fn compile(
        &self,
        schema: &Schema,
        staging_dir: &Path,
        env: Env,
        is_preview: bool,
    ) -> Result<CompileOutput> {
        let mode = CompileMode::detect(staging_dir);
        match mode {
            CompileMode::Standard => tracing::info!("Standard mode: one module per page"),
            CompileMode::Simple => tracing::info!("Simple mode: single document from the first page"),
        }

        let plan = CompilePlan::new(schema, mode, env, is_preview)?;
        self.write(&plan, staging_dir)
    }

    /// Write a validated plan into the staging tree.
    pub fn write(&self, plan: &CompilePlan, staging_dir: &Path) -> Result<CompileOutput> {
        let mut page_files = Vec::new();
        if plan.mode == CompileMode::Standard {
            let pages_dir = staging_dir.join(PAGES_DIR);
            fs::create_dir_all(&pages_dir)?;
            for (page_id, source) in &plan.pages {
                let path = pages_dir.join(format!("{}.js", page_id));
                fs::write(&path, source.to_module())?;
                tracing::info!("Generated {}", path.display());
                page_files.push(path);
            }
        }

        let scaffold_files = self.renderer.render_tree(staging_dir, &plan.context)?;

        let check_path = staging_dir.join(PAGE_VALID_CHECK_PATH);
        if let Some(parent) = check_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&check_path, PAGE_VALID_CHECK)?;

        Ok(CompileOutput {
            mode: plan.mode,
            page_files,
            scaffold_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn schema(value: Value) -> Schema {
        serde_json::from_value(value).unwrap()
    }

    fn two_page_schema() -> Schema {
        schema(json!({
            "componentsMap": [
                {"componentName": "Button", "package": "@acme/ui", "version": "1.0.0",
                 "exportName": "Button", "destructuring": true}
            ],
            "componentsTree": [
                {"id": "t-home", "componentName": "Page", "pageConfig": {"title": "Home"},
                 "children": [{"componentName": "Button", "props": {"text": "Go"}}]},
                {"id": "t-about", "componentName": "Page", "children": ["About us"]}
            ],
            "pages": [{"id": "home", "treeId": "t-home"}, {"id": "about", "treeId": "t-about"}],
            "meta": {"appVersion": "1.0.0", "project_name": "demo"}
        }))
    }

    #[test]
    fn test_no_pages_rejected() {
        let mut s = two_page_schema();
        s.pages.clear();
        let err = CompilePlan::new(&s, CompileMode::Standard, Env::Fat, false).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_no_tree_rejected() {
        let mut s = two_page_schema();
        s.components_tree.clear();
        let err = CompilePlan::new(&s, CompileMode::Simple, Env::Fat, false).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_unresolved_tree_id_rejected_in_standard_mode() {
        let mut s = two_page_schema();
        s.pages[1].tree_id = "missing".to_string();

        let err = CompilePlan::new(&s, CompileMode::Standard, Env::Fat, false).unwrap_err();
        assert!(err.to_string().contains("missing"));

        // Simple mode only looks at the first page.
        assert!(CompilePlan::new(&s, CompileMode::Simple, Env::Fat, false).is_ok());
    }

    #[test]
    fn test_page_id_escaping_staging_rejected() {
        let mut s = two_page_schema();
        s.pages[1].id = "../../../x".to_string();

        let err = CompilePlan::new(&s, CompileMode::Standard, Env::Fat, false).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("../../../x"));
    }

    #[test]
    fn test_app_version_escaping_dist_rejected() {
        let mut s = two_page_schema();
        s.meta.app_version = "../1.0.0".to_string();
        let err = CompilePlan::new(&s, CompileMode::Simple, Env::Fat, false).unwrap_err();
        assert!(err.to_string().contains("meta.appVersion"));

        s.meta.app_version = String::new();
        assert!(CompilePlan::new(&s, CompileMode::Simple, Env::Fat, false).is_ok());
    }

    #[test]
    fn test_unsafe_page_id_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        fs::create_dir_all(staging.join(PAGES_DIR)).unwrap();

        let mut s = two_page_schema();
        s.pages[0].id = "../../escaped".to_string();
        assert!(SchemaCompiler::new().compile(&s, &staging, Env::Fat, false).is_err());

        assert!(!staging.join("escaped.js").exists());
        assert_eq!(fs::read_dir(staging.join(PAGES_DIR)).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_children_rejected() {
        let mut s = two_page_schema();
        s.components_tree[0].children = Some(Vec::new());
        let err = CompilePlan::new(&s, CompileMode::Simple, Env::Fat, false).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_default_route_points_at_first_page() {
        let routes = resolve_routes(&two_page_schema());
        assert_eq!(
            routes,
            vec![ResolvedRoute {
                path: String::new(),
                page: "home".to_string(),
                page_path: "./pages/home".to_string(),
            }]
        );
    }

    #[test]
    fn test_declared_routes_are_annotated() {
        let mut s = two_page_schema();
        s.router = Some(serde_json::from_value(json!({
            "routes": [{"path": "/", "page": "home"}, {"path": "/about", "page": "about"}]
        })).unwrap());

        let routes = resolve_routes(&s);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].page_path, "./pages/about");
    }

    #[test]
    fn test_simple_plan_context() {
        let plan = CompilePlan::new(&two_page_schema(), CompileMode::Simple, Env::Pre, true).unwrap();

        assert_eq!(plan.pages.len(), 1);
        assert_eq!(
            plan.context.import_content.as_deref(),
            Some("import { Button } from '@acme/ui'")
        );
        assert_eq!(plan.context.components_content.as_deref(), Some("<Button>Go</Button>"));
        assert_eq!(plan.context.page_config, json!({"title": "Home"}));
        assert!(plan.context.is_preview);
    }

    #[test]
    fn test_mode_detection() {
        let temp = TempDir::new().unwrap();
        assert_eq!(CompileMode::detect(temp.path()), CompileMode::Simple);

        fs::create_dir_all(temp.path().join(PAGES_DIR)).unwrap();
        assert_eq!(CompileMode::detect(temp.path()), CompileMode::Standard);
    }

    #[test]
    fn test_validation_failure_writes_nothing() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(PAGES_DIR)).unwrap();
        fs::write(temp.path().join("index.html.hbs"), "{{meta.appVersion}}").unwrap();

        let mut s = two_page_schema();
        s.pages[0].tree_id = "missing".to_string();
        assert!(SchemaCompiler::new().compile(&s, temp.path(), Env::Fat, false).is_err());

        assert!(temp.path().join("index.html.hbs").exists());
        assert!(!temp.path().join("index.html").exists());
        assert!(!temp.path().join(PAGE_VALID_CHECK_PATH).exists());
        assert_eq!(fs::read_dir(temp.path().join(PAGES_DIR)).unwrap().count(), 0);
    }
}
