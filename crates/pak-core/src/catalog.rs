//! Signature catalog: which columns identify a row, and which PAK ships a table
//!
//! The catalog is plain configuration loaded once per run. Lookups are pure;
//! nothing here touches the file system after [`CatalogConfig::load`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Columns whose combined values identify a row within a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Signature {
    /// A single key column (e.g. `buff_id`)
    Single(String),
    /// An ordered set of key columns
    Composite(Vec<String>),
}

impl Signature {
    /// Key columns in declaration order
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Signature::Single(column) => vec![column.as_str()],
            Signature::Composite(columns) => columns.iter().map(String::as_str).collect(),
        }
    }
}

/// Declared type of a column, used by the merge workaround check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    #[default]
    Text,
}

/// Catalog entry for one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSignature {
    /// Path suffix identifying the table (e.g. `rpg/buff.xml`)
    pub path: String,
    /// Name of the row element
    #[serde(default = "default_row_element")]
    pub element: String,
    /// Key columns
    pub attributes: Signature,
    /// Column-type metadata; undeclared columns are text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, ColumnKind>,
}

impl TableSignature {
    /// Create an entry with the default `row` element and no column types
    pub fn new(path: impl Into<String>, attributes: Signature) -> Self {
        Self {
            path: path.into(),
            element: default_row_element(),
            attributes,
            columns: BTreeMap::new(),
        }
    }

    /// Declare the type of a column
    pub fn with_column(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.insert(name.into(), kind);
        self
    }

    /// Declared kind of a column
    pub fn column_kind(&self, name: &str) -> ColumnKind {
        self.columns.get(name).copied().unwrap_or_default()
    }
}

fn default_row_element() -> String {
    "row".to_string()
}

/// Maps a data-relative path prefix to the PAK file holding its baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMapping {
    /// Path prefix relative to the data root (e.g. `Libs/Tables`)
    pub prefix: String,
    /// PAK file name (e.g. `Tables.pak`)
    pub archive: String,
}

/// Constants for the sub-1.0 float workaround in data-table merges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkaroundConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

impl Default for WorkaroundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            sentinel: default_sentinel(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    1.0
}

fn default_sentinel() -> String {
    "8772".to_string()
}

/// Catalog configuration file (JSON)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Table signatures, first match wins
    #[serde(default)]
    pub signatures: Vec<TableSignature>,
    /// Path prefix to PAK mappings, first match wins
    #[serde(default)]
    pub packages: Vec<PackageMapping>,
    /// Case-insensitive path fragments that are never patched
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Localization file names eligible for string-table merge
    #[serde(default)]
    pub localization: Vec<String>,
    #[serde(default)]
    pub workaround: WorkaroundConfig,
}

impl CatalogConfig {
    /// Load a catalog from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the catalog to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// A small starter catalog showing every field
    pub fn template() -> Self {
        Self {
            signatures: vec![
                TableSignature::new("rpg/buff.xml", Signature::Single("buff_id".into()))
                    .with_column("buff_id", ColumnKind::Text)
                    .with_column("duration", ColumnKind::Float),
                TableSignature::new(
                    "rpg/soul2perk.xml",
                    Signature::Composite(vec!["soul_id".into(), "perk_id".into()]),
                ),
            ],
            packages: vec![
                PackageMapping {
                    prefix: "Libs/Tables".into(),
                    archive: "Tables.pak".into(),
                },
                PackageMapping {
                    prefix: "Libs".into(),
                    archive: "Scripts.pak".into(),
                },
            ],
            exclusions: vec!["Libs/UI".into()],
            localization: vec!["text_ui_items.xml".into()],
            workaround: WorkaroundConfig::default(),
        }
    }
}

/// Where the baseline copy of a table lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineSource {
    /// PAK file name
    pub archive: String,
    /// Entry name inside the PAK
    pub member: String,
}

/// Lookup service over a loaded [`CatalogConfig`]
#[derive(Debug, Clone)]
pub struct SignatureCatalog {
    config: CatalogConfig,
    signature_keys: Vec<String>,
    package_keys: Vec<String>,
}

impl SignatureCatalog {
    /// Build a catalog from configuration
    pub fn new(config: CatalogConfig) -> Self {
        let signature_keys = config
            .signatures
            .iter()
            .map(|s| normalize_key(&s.path))
            .collect();
        let package_keys = config
            .packages
            .iter()
            .map(|p| normalize_key(&p.prefix))
            .collect();
        Self {
            config,
            signature_keys,
            package_keys,
        }
    }

    /// Load and build a catalog from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        CatalogConfig::load(path).map(Self::new)
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn workaround(&self) -> &WorkaroundConfig {
        &self.config.workaround
    }

    /// Find the signature entry for a table path
    ///
    /// Matching is case- and separator-insensitive: the table path must equal the
    /// configured key or end with `/` followed by it.
    pub fn resolve_signature(&self, table_path: &str) -> Result<&TableSignature> {
        let path = normalize_key(table_path);
        self.signature_keys
            .iter()
            .position(|key| is_component_suffix(&path, key))
            .map(|i| &self.config.signatures[i])
            .ok_or_else(|| Error::UnknownSignature(fix_slashes(table_path)))
    }

    /// Find the PAK and entry name holding the baseline for a data-relative path
    pub fn resolve_baseline_source(&self, relative_path: &str) -> Result<BaselineSource> {
        let path = normalize_key(relative_path);
        self.package_keys
            .iter()
            .position(|prefix| is_component_prefix(&path, prefix))
            .map(|i| BaselineSource {
                archive: self.config.packages[i].archive.clone(),
                member: fix_slashes(relative_path),
            })
            .ok_or_else(|| Error::UnknownArchiveMapping(fix_slashes(relative_path)))
    }

    /// Whether a project path matches any configured exclusion
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = normalize_key(path);
        self.config
            .exclusions
            .iter()
            .any(|fragment| path.contains(&normalize_key(fragment)))
    }

    /// Whether a localization file name is eligible for merging
    pub fn is_localization_table(&self, file_name: &str) -> bool {
        self.config
            .localization
            .iter()
            .any(|name| name.eq_ignore_ascii_case(file_name))
    }
}

/// Convert back slashes to forward slashes and strip leading `./` and `/`
pub fn fix_slashes(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut trimmed = path.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed.trim_end_matches('/').to_string()
}

fn normalize_key(path: &str) -> String {
    fix_slashes(path).to_ascii_lowercase()
}

fn is_component_suffix(path: &str, key: &str) -> bool {
    path == key
        || path
            .strip_suffix(key)
            .is_some_and(|head| head.ends_with('/'))
}

fn is_component_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|tail| tail.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SignatureCatalog {
        SignatureCatalog::new(CatalogConfig::template())
    }

    #[test]
    fn test_signature_deserializes_single_and_composite() {
        let single: Signature = serde_json::from_str("\"buff_id\"").unwrap();
        assert_eq!(single, Signature::Single("buff_id".into()));
        assert_eq!(single.columns(), vec!["buff_id"]);

        let composite: Signature = serde_json::from_str("[\"soul_id\", \"perk_id\"]").unwrap();
        assert_eq!(composite.columns(), vec!["soul_id", "perk_id"]);
    }

    #[test]
    fn test_resolve_signature_is_case_and_separator_insensitive() {
        let catalog = catalog();
        let entry = catalog
            .resolve_signature(r"Libs\Tables\RPG\Buff.xml")
            .unwrap();
        assert_eq!(entry.attributes, Signature::Single("buff_id".into()));
        assert_eq!(entry.element, "row");
        assert_eq!(entry.column_kind("duration"), ColumnKind::Float);
        assert_eq!(entry.column_kind("buff_name"), ColumnKind::Text);
    }

    #[test]
    fn test_resolve_signature_requires_component_boundary() {
        let catalog = catalog();
        let err = catalog
            .resolve_signature("Libs/Tables/rpg/perk_buff.xml")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSignature(_)));
    }

    #[test]
    fn test_resolve_signature_first_match_wins() {
        let config = CatalogConfig {
            signatures: vec![
                TableSignature::new("buff.xml", Signature::Single("first".into())),
                TableSignature::new("rpg/buff.xml", Signature::Single("second".into())),
            ],
            ..Default::default()
        };
        let catalog = SignatureCatalog::new(config);
        let entry = catalog.resolve_signature("rpg/buff.xml").unwrap();
        assert_eq!(entry.attributes, Signature::Single("first".into()));
    }

    #[test]
    fn test_resolve_baseline_source() {
        let catalog = catalog();
        let source = catalog
            .resolve_baseline_source(r"Libs\Tables\rpg\buff.xml")
            .unwrap();
        assert_eq!(source.archive, "Tables.pak");
        assert_eq!(source.member, "Libs/Tables/rpg/buff.xml");

        let source = catalog
            .resolve_baseline_source("Libs/Scripts/x.xml")
            .unwrap();
        assert_eq!(source.archive, "Scripts.pak");
    }

    #[test]
    fn test_resolve_baseline_source_unknown() {
        let catalog = catalog();
        let err = catalog
            .resolve_baseline_source("Entities/foo.xml")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownArchiveMapping(p) if p == "Entities/foo.xml"));

        // prefix must end on a path component
        assert!(catalog.resolve_baseline_source("LibsExtra/foo.xml").is_err());
    }

    #[test]
    fn test_exclusions_and_localization() {
        let catalog = catalog();
        assert!(catalog.is_excluded(r"Data\Libs\UI\hud.xml"));
        assert!(!catalog.is_excluded("Data/Libs/Tables/rpg/buff.xml"));
        assert!(catalog.is_localization_table("TEXT_UI_ITEMS.xml"));
        assert!(!catalog.is_localization_table("text_ui_menus.xml"));
    }

    #[test]
    fn test_config_defaults_and_roundtrip() {
        let config: CatalogConfig = serde_json::from_str(
            r#"{"signatures": [{"path": "item.xml", "attributes": "item_id"}]}"#,
        )
        .unwrap();
        assert_eq!(config.signatures[0].element, "row");
        assert_eq!(config.workaround, WorkaroundConfig::default());
        assert_eq!(config.workaround.sentinel, "8772");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        CatalogConfig::template().save(&path).unwrap();
        let loaded = CatalogConfig::load(&path).unwrap();
        assert_eq!(loaded.signatures.len(), 2);
        assert_eq!(loaded.packages[0].archive, "Tables.pak");
    }

    #[test]
    fn test_fix_slashes() {
        assert_eq!(fix_slashes(r".\Libs\Tables\"), "Libs/Tables");
        assert_eq!(fix_slashes("/rpg/buff.xml"), "rpg/buff.xml");
    }
}
