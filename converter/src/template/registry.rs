//! Template Registry - load schemas once, resolve them per input file
//!
//! Every template in the templates directory is parsed at startup and shared
//! read-only (`Arc<Schema>`) by all concurrent units.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::read_template;
use crate::error::{PipelineError, PipelineResult, SchemaError, SchemaResult};
use crate::models::Schema;

/// Template file extensions the registry picks up
const TEMPLATE_EXTENSIONS: &[&str] = &["csv", "tsv", "json"];

/// Filename-based template selection rule of a department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRule {
    /// Substring of the input file name
    pub if_filename_contains: String,
    /// Template file name in the registry
    pub use_template: String,
}

/// Loaded schemas keyed by template file name
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<Schema>>,
}

impl TemplateRegistry {
    /// Load every template in `dir`. Any unreadable template fails the load.
    pub fn load_dir(dir: impl AsRef<Path>) -> SchemaResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let entries = fs::read_dir(&dir).map_err(|source| SchemaError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut templates = HashMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_template = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e.to_lowercase().as_str()));
            if !path.is_file() || !is_template {
                continue;
            }

            let schema = read_template(&path)?;
            tracing::debug!(template = %schema.name, fields = schema.len(), "Loaded template");
            templates.insert(schema.name.clone(), Arc::new(schema));
        }

        Ok(Self { templates })
    }

    /// Registry holding a single schema
    pub fn single(schema: Schema) -> Self {
        let mut templates = HashMap::new();
        templates.insert(schema.name.clone(), Arc::new(schema));
        Self { templates }
    }

    /// Template names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.templates.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Pick the template name for an input file.
    ///
    /// First rule whose substring occurs in the file name, else the default,
    /// else the only rule if exactly one exists.
    pub fn select<'a>(file_name: &str, rules: &'a [TemplateRule], default: Option<&'a str>) -> Option<&'a str> {
        rules
            .iter()
            .find(|rule| file_name.contains(&rule.if_filename_contains))
            .map(|rule| rule.use_template.as_str())
            .or(default.filter(|d| !d.is_empty()))
            .or_else(|| match rules {
                [only] => Some(only.use_template.as_str()),
                _ => None,
            })
    }

    /// Resolve the schema for an input file.
    pub fn resolve(
        &self,
        file_name: &str,
        rules: &[TemplateRule],
        default: Option<&str>,
    ) -> PipelineResult<Arc<Schema>> {
        let name = Self::select(file_name, rules, default).ok_or_else(|| PipelineError::SchemaUnresolvable {
            file: file_name.to_string(),
            reason: "no template mapping matches the file name".to_string(),
        })?;

        self.get(name).ok_or_else(|| PipelineError::SchemaUnresolvable {
            file: file_name.to_string(),
            reason: format!("template '{}' is not loaded", name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(contains: &str, template: &str) -> TemplateRule {
        TemplateRule {
            if_filename_contains: contains.to_string(),
            use_template: template.to_string(),
        }
    }

    fn registry_with(names: &[&str]) -> (tempfile::TempDir, TemplateRegistry) {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), "h,t,p\nAmount,Amount,lineItem\n").unwrap();
        }
        fs::write(dir.path().join("notes.md"), "not a template").unwrap();
        let registry = TemplateRegistry::load_dir(dir.path()).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_load_dir() {
        let (_dir, registry) = registry_with(&["checks.csv", "deposits.csv"]);
        assert_eq!(registry.names(), vec!["checks.csv", "deposits.csv"]);
        assert!(registry.get("notes.md").is_none());
    }

    #[test]
    fn test_load_dir_missing() {
        assert!(TemplateRegistry::load_dir("/definitely/not/here").is_err());
    }

    #[test]
    fn test_select_order() {
        let rules = vec![rule("CHK", "checks.csv"), rule("DEP", "deposits.csv")];

        assert_eq!(TemplateRegistry::select("FIN_DEP_0101.csv", &rules, None), Some("deposits.csv"));
        assert_eq!(TemplateRegistry::select("FIN_CHK_DEP.csv", &rules, None), Some("checks.csv"));
        assert_eq!(TemplateRegistry::select("other.csv", &rules, Some("fallback.csv")), Some("fallback.csv"));
        assert_eq!(TemplateRegistry::select("other.csv", &rules, None), None);
        assert_eq!(TemplateRegistry::select("other.csv", &[rule("X", "only.csv")], None), Some("only.csv"));
    }

    #[test]
    fn test_resolve() {
        let (_dir, registry) = registry_with(&["checks.csv"]);
        let rules = vec![rule("CHK", "checks.csv"), rule("DEP", "deposits.csv")];

        let schema = registry.resolve("FIN_CHK.csv", &rules, None).unwrap();
        assert_eq!(schema.name, "checks.csv");

        let missing = registry.resolve("FIN_DEP.csv", &rules, None).unwrap_err();
        assert!(missing.to_string().contains("not loaded"));

        let unmatched = registry.resolve("misc.csv", &rules, None).unwrap_err();
        assert!(matches!(unmatched, PipelineError::SchemaUnresolvable { .. }));
    }
}
