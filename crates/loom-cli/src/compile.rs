//! Compile command implementation for Loom CLI.
//!
//! Compiles a schema into a directory without bundling, for inspecting the
//! generated sources.

use std::fs;
use std::path::Path;

use loom_core::paths::copy_dir;
use loom_core::{Env, Schema, SchemaCompiler};

use crate::colors;

/// Compile `schema_path` into `out_dir`, seeding it from `template` when given.
pub fn execute(
    schema_path: &Path,
    out_dir: &Path,
    template: Option<&Path>,
    env: Env,
    preview: bool,
) -> anyhow::Result<()> {
    let json = fs::read_to_string(schema_path)?;
    let schema = Schema::from_json(&json)?;

    if let Some(template) = template {
        let copied = copy_dir(template, out_dir)?;
        println!(
            "{}Staged{} {} files from {}",
            colors::DIM,
            colors::RESET,
            copied,
            template.display()
        );
    } else {
        fs::create_dir_all(out_dir)?;
    }

    let output = SchemaCompiler::new().compile(&schema, out_dir, env, preview)?;

    println!(
        "{}Compiled{} {} ({:?} mode)",
        colors::GREEN,
        colors::RESET,
        schema_path.display(),
        output.mode
    );
    for file in output.page_files.iter().chain(&output.scaffold_files) {
        let shown = file.strip_prefix(out_dir).unwrap_or(file);
        println!("  {}", shown.display());
    }

    Ok(())
}
