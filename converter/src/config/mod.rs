//! Configuration loading.
//!
//! - [`MainConfig`]: run-wide settings from `ledgerxml.toml`, overridable by
//!   `LEDGERXML_*` environment variables
//! - [`DepartmentConfig`]: one file per department (`.toml` or `.json`) with
//!   reader settings, template selection, ruleset, output and validation
//!   settings
//!
//! Every department ruleset is checked at load, so a bad action kind or
//! pattern stops the run before any file is touched.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::models::is_xml_name;
use crate::parser::CsvSettings;
use crate::template::TemplateRule;
use crate::transform::dsl::ruleset::Ruleset;
use crate::validation::ValidationOptions;
use crate::xml::AssembleOptions;

/// Main config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ledgerxml.toml";

const ENV_LOG_LEVEL: &str = "LEDGERXML_LOG_LEVEL";
const ENV_MAX_CONCURRENCY: &str = "LEDGERXML_MAX_CONCURRENCY";
const ENV_INPUT_DIR: &str = "LEDGERXML_INPUT_DIR";
const ENV_OUTPUT_DIR: &str = "LEDGERXML_OUTPUT_DIR";

// =============================================================================
// Main Config
// =============================================================================

/// Run-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub input_archive_dir: PathBuf,
    pub output_archive_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub configs_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    /// `pretty`, `compact` or `json`
    pub log_format: String,
    /// Output file name with `{uuid}`, `{timestamp}`, `{date}`, `{time}`,
    /// `{dept}` and `{stem}` placeholders.
    pub output_name_format: String,
    pub max_concurrency: usize,
    /// Write documents even when validation reports errors.
    pub continue_on_error: bool,
    /// Move inputs and copy outputs to the archive directories after success.
    pub archive: bool,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./input"),
            output_dir: PathBuf::from("./output"),
            input_archive_dir: PathBuf::from("./input_archive"),
            output_archive_dir: PathBuf::from("./output_archive"),
            templates_dir: PathBuf::from("./templates"),
            configs_dir: PathBuf::from("./configs"),
            log_file: Some(PathBuf::from("./logs/converter.log")),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            output_name_format: "{uuid}.xml".to_string(),
            max_concurrency: 4,
            continue_on_error: false,
            archive: true,
        }
    }
}

impl MainConfig {
    /// Load the main config.
    ///
    /// An explicit path must exist. Without one, `ledgerxml.toml` in the
    /// working directory is used when present, else the defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = read(path)?;
        Self::from_toml(&content, path)
    }

    pub fn from_toml(content: &str, path: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `LEDGERXML_*` overrides from `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(value) = lookup(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_CONCURRENCY.to_string(),
                message: format!("'{}' is not a positive integer", value),
            })?;
        }
        if let Some(dir) = lookup(ENV_INPUT_DIR) {
            self.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    /// Worker count, at least one.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

// =============================================================================
// Department Config
// =============================================================================

/// Settings of one department.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentConfig {
    pub department_name: String,
    /// Short code; defaults to the config file stem.
    pub department_code: String,
    /// Glob patterns (`*`, `?`) matched against input file names.
    pub file_matching_patterns: Vec<String>,
    pub csv_settings: CsvSettings,
    pub template_mapping: Vec<TemplateRule>,
    pub default_template: Option<String>,
    #[serde(flatten)]
    pub ruleset: Ruleset,
    pub xml: AssembleOptions,
    pub validation: ValidationOptions,
}

impl DepartmentConfig {
    /// Load and check one department file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = read(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let mut department: DepartmentConfig = match extension.as_str() {
            "toml" => toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?,
            "json" => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        if department.department_code.trim().is_empty() {
            department.department_code = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("department")
                .to_string();
        }

        department.check()?;
        Ok(department)
    }

    /// Load every `.toml` / `.json` file in `dir`, sorted by department code.
    pub fn load_all(dir: &Path) -> ConfigResult<Vec<Self>> {
        let entries = fs::read_dir(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut departments = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e.to_lowercase().as_str(), "toml" | "json"));
            if path.is_file() && supported {
                departments.push(Self::load(&path)?);
            }
        }

        departments.sort_by(|a, b| a.department_code.cmp(&b.department_code));
        Ok(departments)
    }

    /// Reject settings that would fail every unit of this department.
    pub fn check(&self) -> ConfigResult<()> {
        self.ruleset.validate(&self.department_code)?;
        self.csv_settings
            .delimiter_char()
            .map_err(|e| ConfigError::InvalidValue {
                key: format!("{}.csv_settings.delimiter", self.department_code),
                message: e.to_string(),
            })?;
        if self.csv_settings.header_rows == 0 {
            return Err(ConfigError::InvalidValue {
                key: format!("{}.csv_settings.header_rows", self.department_code),
                message: "must be at least 1".to_string(),
            });
        }
        self.check_xml_names()
    }

    fn check_xml_names(&self) -> ConfigResult<()> {
        let xml = &self.xml;
        let names = [
            ("xml.root_element", xml.root_element.as_deref()),
            ("xml.transaction_element", xml.transaction_element.as_deref()),
            ("xml.line_item_element", xml.line_item_element.as_deref()),
            ("xml.transaction_index_attribute", Some(xml.transaction_index_attribute.as_str())),
            ("xml.line_item_index_attribute", Some(xml.line_item_index_attribute.as_str())),
        ];
        let named = names.into_iter().filter_map(|(key, name)| name.map(|n| (key, n)));
        let root_attributes = xml.root_attributes.keys().map(|k| ("xml.root_attributes", k.as_str()));
        let static_tags = self
            .ruleset
            .static_fields
            .iter()
            .map(|f| ("static_fields.xml_tag", f.xml_tag.as_str()));

        for (key, name) in named.chain(root_attributes).chain(static_tags) {
            if !is_xml_name(name) {
                return Err(ConfigError::InvalidValue {
                    key: format!("{}.{}", self.department_code, key),
                    message: format!("'{}' is not a valid XML name", name),
                });
            }
        }
        Ok(())
    }

    /// Display name, falling back to the code.
    pub fn name(&self) -> &str {
        if self.department_name.is_empty() {
            &self.department_code
        } else {
            &self.department_name
        }
    }

    /// Whether any file pattern matches `file_name`.
    pub fn matches(&self, file_name: &str) -> bool {
        self.file_matching_patterns
            .iter()
            .any(|pattern| glob_matches(pattern, file_name))
    }
}

/// First department claiming `file_name`.
pub fn find_department<'a>(departments: &'a [DepartmentConfig], file_name: &str) -> Option<&'a DepartmentConfig> {
    departments.iter().find(|d| d.matches(file_name))
}

/// Department by code, case-insensitive.
pub fn department_by_code<'a>(departments: &'a [DepartmentConfig], code: &str) -> Option<&'a DepartmentConfig> {
    departments
        .iter()
        .find(|d| d.department_code.eq_ignore_ascii_case(code))
}

/// Whole-name glob match with `*` and `?`.
pub fn glob_matches(pattern: &str, name: &str) -> bool {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');

    Regex::new(&regex).map(|re| re.is_match(name)).unwrap_or(false)
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParentLevel;
    use crate::transform::dsl::ruleset::SortOrder;
    use std::collections::HashMap;

    const FINANCE_TOML: &str = r#"
department_name = "Finance"
department_code = "FIN"
file_matching_patterns = ["FIN_*.csv", "finance_??.csv"]
default_template = "checks.csv"

[csv_settings]
delimiter = "pipe"
header_rows = 2

[[template_mapping]]
if_filename_contains = "DEP"
use_template = "deposits.csv"

[transaction_grouping]
group_by_field = "Check Number"
sort_by_field = "Line"
sort_order = "desc"

[[transformation_rules]]
field = "Check Number"
actions = [
    { type = "extract_digits" },
    { type = "pad_zeros_to_length", value = "9" },
]

[[static_fields]]
xml_tag = "SourceSystem"
value = "LEGACY"
parent_tag = "cashbook"

[xml]
root_element = "ledger"
global_numbering = false

[validation]
skip_optional = true
"#;

    #[test]
    fn test_main_defaults() {
        let config = MainConfig::default();
        assert_eq!(config.input_dir, PathBuf::from("./input"));
        assert_eq!(config.output_name_format, "{uuid}.xml");
        assert_eq!(config.max_concurrency, 4);
        assert!(!config.continue_on_error);
    }

    #[test]
    fn test_main_partial_toml() {
        let config = MainConfig::from_toml("max_concurrency = 0\ncontinue_on_error = true\n", Path::new("x.toml")).unwrap();
        assert_eq!(config.concurrency(), 1);
        assert!(config.continue_on_error);
        assert_eq!(config.templates_dir, PathBuf::from("./templates"));

        assert!(matches!(
            MainConfig::from_toml("max_concurrency = \"many\"", Path::new("x.toml")),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = MainConfig::load(Some(Path::new("/no/such/ledgerxml.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LEDGERXML_LOG_LEVEL", "debug"),
            ("LEDGERXML_MAX_CONCURRENCY", "8"),
            ("LEDGERXML_OUTPUT_DIR", "/tmp/out"),
        ]
        .into_iter()
        .collect();

        let config = MainConfig::default()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.input_dir, PathBuf::from("./input"));

        let bad = MainConfig::default().with_env_overrides(|key| {
            (key == "LEDGERXML_MAX_CONCURRENCY").then(|| "lots".to_string())
        });
        assert!(matches!(bad, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_department_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finance.toml");
        fs::write(&path, FINANCE_TOML).unwrap();

        let dept = DepartmentConfig::load(&path).unwrap();
        assert_eq!(dept.department_code, "FIN");
        assert_eq!(dept.csv_settings.delimiter, "pipe");
        assert_eq!(dept.csv_settings.header_rows, 2);
        assert_eq!(dept.csv_settings.quote_char, '"');
        assert_eq!(dept.template_mapping[0].use_template, "deposits.csv");
        assert_eq!(dept.ruleset.group_by_field(), "Check Number");
        assert_eq!(dept.ruleset.transaction_grouping.sort_order, SortOrder::Desc);
        assert_eq!(dept.ruleset.transformation_rules[0].actions.len(), 2);
        assert_eq!(dept.ruleset.static_fields[0].parent_tag, ParentLevel::Root);
        assert_eq!(dept.xml.root_element.as_deref(), Some("ledger"));
        assert!(!dept.xml.global_numbering);
        assert_eq!(dept.xml.indent, 2);
        assert!(dept.validation.skip_optional);
    }

    #[test]
    fn test_department_json_and_code_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payroll.json");
        fs::write(
            &path,
            r#"{"file_matching_patterns": ["PAY*"], "transformation_rules": [{"field": "A", "actions": [{"type": "trim"}]}]}"#,
        )
        .unwrap();

        let dept = DepartmentConfig::load(&path).unwrap();
        assert_eq!(dept.department_code, "payroll");
        assert_eq!(dept.name(), "payroll");
        assert!(dept.xml.global_numbering);
    }

    #[test]
    fn test_unknown_action_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"department_code": "BAD", "transformation_rules": [{"field": "A", "actions": [{"type": "trim"}, {"type": "explode"}]}]}"#,
        )
        .unwrap();

        match DepartmentConfig::load(&path) {
            Err(ConfigError::InvalidAction { department, field, index, .. }) => {
                assert_eq!(department, "BAD");
                assert_eq!(field, "A");
                assert_eq!(index, 1);
            }
            other => panic!("expected InvalidAction, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_xml_names_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");

        fs::write(&path, "department_code = \"BAD\"\n[[static_fields]]\nxml_tag = \"Source System\"\n").unwrap();
        match DepartmentConfig::load(&path) {
            Err(ConfigError::InvalidValue { key, message }) => {
                assert_eq!(key, "BAD.static_fields.xml_tag");
                assert!(message.contains("'Source System'"));
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }

        fs::write(&path, "department_code = \"BAD\"\n[xml]\nline_item_element = \"2items\"\n").unwrap();
        assert!(matches!(DepartmentConfig::load(&path), Err(ConfigError::InvalidValue { .. })));

        fs::write(&path, "department_code = \"BAD\"\n[xml.root_attributes]\n\"a b\" = \"1\"\n").unwrap();
        assert!(matches!(DepartmentConfig::load(&path), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_load_all_sorted_and_matching() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("finance.toml"), FINANCE_TOML).unwrap();
        fs::write(dir.path().join("ap.json"), r#"{"department_code": "AP", "file_matching_patterns": ["AP_*"]}"#).unwrap();
        fs::write(dir.path().join("readme.txt"), "ignored").unwrap();

        let departments = DepartmentConfig::load_all(dir.path()).unwrap();
        let codes: Vec<&str> = departments.iter().map(|d| d.department_code.as_str()).collect();
        assert_eq!(codes, vec!["AP", "FIN"]);

        assert_eq!(find_department(&departments, "FIN_0101.csv").map(|d| d.name()), Some("Finance"));
        assert_eq!(find_department(&departments, "finance_07.csv").map(|d| d.name()), Some("Finance"));
        assert!(find_department(&departments, "finance_007.csv").is_none());
        assert_eq!(department_by_code(&departments, "ap").map(|d| d.department_code.as_str()), Some("AP"));
    }

    #[test]
    fn test_glob_matches() {
        assert!(glob_matches("*.csv", "a.csv"));
        assert!(glob_matches("FIN_?.csv", "FIN_1.csv"));
        assert!(!glob_matches("FIN_?.csv", "FIN_12.csv"));
        assert!(!glob_matches("*.csv", "a.csv.bak"));
        assert!(glob_matches("a+b(1).csv", "a+b(1).csv"));
        assert!(!glob_matches("fin_*", "FIN_1"));
    }
}
