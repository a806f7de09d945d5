//! Persistent Rule Catalog
//!
//! Stores rule declarations as JSON so the same rule set can be loaded
//! on every engine start. When the declarations on disk change between
//! process lifetimes, `refresh_inference` reconciles the derived facts
//! with the new set.
//!
//! ## Storage
//!
//! Declarations are stored at the path given to [`RuleCatalog::open`],
//! one entry per rule name.

use crate::rules::RuleDecl;
use crate::store::StoreResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// One catalog entry: the declaration plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub decl: RuleDecl,
    /// When the rule was registered.
    pub created_at: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Catalog file format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    rules: BTreeMap<String, CatalogEntry>,
}

impl Default for CatalogFile {
    fn default() -> Self {
        CatalogFile {
            version: 1,
            rules: BTreeMap::new(),
        }
    }
}

/// Rule catalog - manages persistent rule declarations.
#[derive(Debug)]
pub struct RuleCatalog {
    rules: BTreeMap<String, CatalogEntry>,
    catalog_path: PathBuf,
    dirty: bool,
}

impl RuleCatalog {
    /// Open a catalog file, loading existing declarations if present.
    pub fn open(catalog_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let mut catalog = RuleCatalog {
            rules: BTreeMap::new(),
            catalog_path: catalog_path.into(),
            dirty: false,
        };
        if catalog.catalog_path.exists() {
            catalog.load()?;
        }
        Ok(catalog)
    }

    /// Register a declaration, replacing any previous rule of the same
    /// name, and persist the catalog.
    pub fn register(&mut self, decl: RuleDecl) -> StoreResult<()> {
        self.rules.insert(
            decl.name.clone(),
            CatalogEntry {
                decl,
                created_at: chrono::Utc::now().to_rfc3339(),
                description: None,
            },
        );
        self.dirty = true;
        self.save()
    }

    /// Drop a rule by name and persist the catalog.
    pub fn drop_rule(&mut self, name: &str) -> StoreResult<bool> {
        let existed = self.rules.remove(name).is_some();
        if existed {
            self.dirty = true;
            self.save()?;
        }
        Ok(existed)
    }

    /// Whether a rule is registered.
    pub fn exists(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Get an entry by rule name.
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.rules.get(name)
    }

    /// Registered rule names in sorted order.
    pub fn list(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    /// Every registered declaration, in name order. Feed the result to
    /// `compile_rules`.
    pub fn decls(&self) -> Vec<RuleDecl> {
        self.rules.values().map(|entry| entry.decl.clone()).collect()
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Force a reload from disk.
    pub fn reload(&mut self) -> StoreResult<()> {
        if self.catalog_path.exists() {
            self.load()
        } else {
            self.rules.clear();
            self.dirty = false;
            Ok(())
        }
    }

    fn load(&mut self) -> StoreResult<()> {
        let content = fs::read_to_string(&self.catalog_path)?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        self.rules = file.rules;
        self.dirty = false;
        Ok(())
    }

    /// Save the catalog to disk.
    pub fn save(&mut self) -> StoreResult<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.catalog_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = CatalogFile {
            version: 1,
            rules: self.rules.clone(),
        };
        fs::write(&self.catalog_path, serde_json::to_string_pretty(&file)?)?;
        self.dirty = false;
        Ok(())
    }
}
