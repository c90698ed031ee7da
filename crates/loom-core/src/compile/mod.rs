//! Schema compilation pipeline.
//!
//! This module provides:
//! - Dependency indexing (component name → package/import metadata)
//! - Markup generation (component subtree → imports + nested tags)
//! - Scaffold stamping (template files rendered with a compile context)
//! - The schema compiler tying them together over a staged template tree
//!
//! # Architecture
//!
//! ```text
//! Schema
//!     │
//!     ├── componentsMap ──► DependencyIndex ──► dependencies / extraImports
//!     │                           │
//!     └── pages + componentsTree ─┴──► PageSource (imports, markup)
//!                                          │
//!               standard mode ─────────────┼──► src/pages/<id>.js
//!               simple mode ───────────────┴──► importContent / componentsContent
//!                                          │
//!                                   ScaffoldRenderer (*.hbs) ──► staged tree
//! ```

mod compiler;
mod dependency_index;
mod markup;
mod scaffold;

pub use compiler::{
    CompileMode, CompileOutput, CompilePlan, PAGE_VALID_CHECK_PATH, PAGES_DIR, SchemaCompiler,
    resolve_routes,
};
pub use dependency_index::{DependencyIndex, PackageDependency, extra_imports};
pub use markup::{PageSource, import_statement, kebab_case, render_nodes};
pub use scaffold::{ResolvedRoute, ScaffoldContext, ScaffoldRenderer, TEMPLATE_EXTENSION};
