//! End-to-end schema compilation against the fixture templates.

use std::fs;
use std::path::{Path, PathBuf};

use loom_core::compile::{CompileMode, PAGE_VALID_CHECK_PATH, SchemaCompiler};
use loom_core::paths::copy_dir;
use loom_core::{Env, Schema};
use tempfile::TempDir;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn schema() -> Schema {
    let json = fs::read_to_string(fixtures().join("schema.json")).expect("Failed to read schema");
    Schema::from_json(&json).expect("Failed to parse schema")
}

fn stage(template: &str, into: &Path) {
    copy_dir(&fixtures().join("templates").join(template), into).expect("Failed to stage");
}

#[test]
fn test_standard_mode_generates_one_module_per_page() {
    let temp = TempDir::new().unwrap();
    stage("standard", temp.path());

    let output = SchemaCompiler::new()
        .compile(&schema(), temp.path(), Env::Uat, false)
        .expect("Compilation failed");

    assert_eq!(output.mode, CompileMode::Standard);
    assert_eq!(output.page_files.len(), 2);

    let home = fs::read_to_string(temp.path().join("src/pages/home.js")).unwrap();
    assert_eq!(
        home,
        "import { Card } from '@acme/ui'\n\
         import { Button } from '@acme/ui'\n\
         import Chart from '@acme/charts'\n\
         export default (props) => {\n  return `\n\
         <Card title='Welcome' style=\"margin-top: 8px\">Hello\n\
         <Button size='large'>Start</Button></Card>\n\
         <Chart data='[1,2,3]'></Chart>\n`\n}\n"
    );

    let about = fs::read_to_string(temp.path().join("src/pages/about.js")).unwrap();
    assert!(about.starts_with("import { Button } from '@acme/ui'\n"));
    assert!(about.contains("<Button>Back</Button>"));
}

#[test]
fn test_standard_mode_stamps_scaffold() {
    let temp = TempDir::new().unwrap();
    stage("standard", temp.path());

    SchemaCompiler::new()
        .compile(&schema(), temp.path(), Env::Pre, true)
        .expect("Compilation failed");

    // Templates are replaced by their rendered output.
    assert!(!temp.path().join("package.json.hbs").exists());
    assert!(!temp.path().join("src/router.js.hbs").exists());

    let package: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join("package.json")).unwrap())
            .expect("package.json is not valid JSON");
    assert_eq!(package["name"], "demo");
    assert_eq!(package["version"], "1.0.0");
    assert_eq!(package["scripts"]["build"], "vite build --mode pre");
    let deps = package["dependencies"].as_object().unwrap();
    assert_eq!(deps.len(), 2);
    assert_eq!(deps["@acme/ui"], "2.1.0");
    assert_eq!(deps["@acme/charts"], "0.4.2");

    let router = fs::read_to_string(temp.path().join("src/router.js")).unwrap();
    assert!(router.contains("import '@acme/ui/dist/button.css'"));
    assert!(router.contains("{ path: '/about', component: () => import('./pages/about') }"));

    let index = fs::read_to_string(temp.path().join("index.html")).unwrap();
    assert!(index.contains("<title>Home</title>"));
    assert!(index.contains("window.IS_PREVIEW = true;"));

    // Untouched files pass through; the validation script is always written.
    assert!(temp.path().join("vite.config.js").exists());
    assert!(temp.path().join(PAGE_VALID_CHECK_PATH).exists());
}

#[test]
fn test_simple_mode_injects_first_page() {
    let temp = TempDir::new().unwrap();
    stage("simple", temp.path());

    let output = SchemaCompiler::new()
        .compile(&schema(), temp.path(), Env::Fat, false)
        .expect("Compilation failed");

    assert_eq!(output.mode, CompileMode::Simple);
    assert!(output.page_files.is_empty());
    assert!(!temp.path().join("src/pages").exists());

    let main = fs::read_to_string(temp.path().join("src/main.js")).unwrap();
    assert!(main.starts_with("import { Card } from '@acme/ui'\n"));
    assert!(main.contains("<Chart data='[1,2,3]'></Chart>"));
    assert!(!main.contains("Back"));

    let index = fs::read_to_string(temp.path().join("index.html")).unwrap();
    assert!(index.contains("<title>Demo</title>"));
}

#[test]
fn test_compilation_is_deterministic() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    for dir in [&first, &second] {
        stage("standard", dir.path());
        SchemaCompiler::new()
            .compile(&schema(), dir.path(), Env::Fat, false)
            .unwrap();
    }

    for file in ["src/pages/home.js", "src/pages/about.js", "src/router.js", "package.json"] {
        assert_eq!(
            fs::read_to_string(first.path().join(file)).unwrap(),
            fs::read_to_string(second.path().join(file)).unwrap(),
            "{} differs between runs",
            file
        );
    }
}

#[test]
fn test_unresolved_page_writes_nothing() {
    let temp = TempDir::new().unwrap();
    stage("standard", temp.path());

    let mut schema = schema();
    schema.pages[1].tree_id = "tree-missing".to_string();

    let err = SchemaCompiler::new()
        .compile(&schema, temp.path(), Env::Fat, false)
        .unwrap_err();
    assert!(err.to_string().contains("tree-missing"));

    assert!(!temp.path().join("src/pages/home.js").exists());
    assert!(temp.path().join("package.json.hbs").exists());
    assert!(!temp.path().join(PAGE_VALID_CHECK_PATH).exists());
}
