//! Component-name lookup over a schema's `componentsMap`.
//!
//! The index keeps entries in registration order. The first registration of a
//! component name wins; later duplicates are dropped, not merged.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::schema::ComponentMapEntry;

/// A deduplicated `{package, version}` pair for the generated manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDependency {
    pub package: String,
    pub version: String,
}

/// Lookup from component name to its package/import metadata.
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    /// Surviving entries in insertion order.
    entries: Vec<ComponentMapEntry>,
    /// Component name -> position in `entries`.
    by_name: FxHashMap<String, usize>,
}

impl DependencyIndex {
    /// Build the index from a list of component entries.
    ///
    /// Entries without a component name are skipped.
    pub fn new(entries: &[ComponentMapEntry]) -> Self {
        let mut index = Self::default();
        for entry in entries {
            if entry.component_name.is_empty() {
                continue;
            }
            if index.by_name.contains_key(&entry.component_name) {
                tracing::debug!(
                    "Ignoring duplicate componentsMap entry for '{}' (package {})",
                    entry.component_name,
                    entry.package
                );
                continue;
            }
            index
                .by_name
                .insert(entry.component_name.clone(), index.entries.len());
            index.entries.push(entry.clone());
        }
        index
    }

    /// Look up a component by name.
    pub fn get(&self, component_name: &str) -> Option<&ComponentMapEntry> {
        self.by_name
            .get(component_name)
            .map(|&position| &self.entries[position])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `{package, version}` per distinct package, first occurrence wins.
    pub fn dedupe_packages(&self) -> Vec<PackageDependency> {
        let mut seen = FxHashSet::default();
        self.entries
            .iter()
            .filter(|entry| seen.insert(entry.package.as_str()))
            .map(|entry| PackageDependency {
                package: entry.package.clone(),
                version: entry.version.clone(),
            })
            .collect()
    }
}

/// Side-effect imports gathered from every entry's `extraImports`.
///
/// Works on the raw `componentsMap` (duplicates included) and deduplicates by
/// resolved path, keeping first-seen order.
pub fn extra_imports(entries: &[ComponentMapEntry]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut imports = Vec::new();
    for entry in entries {
        for extra in &entry.extra_imports {
            let full_path = format!("{}{}", entry.package, extra.path.as_deref().unwrap_or_default());
            if seen.insert(full_path.clone()) {
                imports.push(format!("import '{}'", full_path));
            }
        }
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ExtraImport;

    fn entry(name: &str, package: &str, version: &str) -> ComponentMapEntry {
        ComponentMapEntry {
            component_name: name.to_string(),
            package: package.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_registration_wins() {
        let index = DependencyIndex::new(&[entry("A", "pkgX", "1.0.0"), entry("A", "pkgY", "2.0.0")]);

        assert_eq!(index.len(), 1);
        let a = index.get("A").unwrap();
        assert_eq!(a.package, "pkgX");
        assert_eq!(a.version, "1.0.0");
    }

    #[test]
    fn test_empty_input() {
        let index = DependencyIndex::new(&[]);
        assert!(index.is_empty());
        assert!(index.dedupe_packages().is_empty());
        assert!(index.get("anything").is_none());
    }

    #[test]
    fn test_nameless_entries_skipped() {
        let index = DependencyIndex::new(&[entry("", "pkgX", "1"), entry("B", "pkgB", "1")]);
        assert_eq!(index.len(), 1);
        assert!(index.get("B").is_some());
    }

    #[test]
    fn test_dedupe_packages_keeps_first_version_and_order() {
        let index = DependencyIndex::new(&[
            entry("Button", "@acme/ui", "1.0.0"),
            entry("Chart", "charts", "3.1.0"),
            entry("Input", "@acme/ui", "1.4.0"),
        ]);

        let packages = index.dedupe_packages();
        assert_eq!(
            packages,
            vec![
                PackageDependency {
                    package: "@acme/ui".to_string(),
                    version: "1.0.0".to_string()
                },
                PackageDependency {
                    package: "charts".to_string(),
                    version: "3.1.0".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_extra_imports_dedupe_by_path() {
        let mut button = entry("Button", "@acme/ui", "1.0.0");
        button.extra_imports = vec![
            ExtraImport {
                path: Some("/dist/button.css".to_string()),
            },
            ExtraImport { path: None },
        ];
        let mut input = entry("Input", "@acme/ui", "1.0.0");
        input.extra_imports = vec![ExtraImport {
            path: Some("/dist/button.css".to_string()),
        }];

        let imports = extra_imports(&[button, input]);
        assert_eq!(
            imports,
            vec![
                "import '@acme/ui/dist/button.css'".to_string(),
                "import '@acme/ui'".to_string(),
            ]
        );
    }
}
