//! String-template catalog
//!
//! Firmware sends compact numeric identifiers instead of format strings; the catalog maps
//! each identifier back to its template. Catalogs are produced by the firmware build as a
//! JSON or YAML mapping and loaded once per probe session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Result, RttError};

/// Identifier to template mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HashMap<RawId, String>", into = "HashMap<u16, String>")]
pub struct Catalog {
    templates: HashMap<u16, String>,
}

/// Keys arrive as integers from YAML and as strings from JSON.
#[derive(Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl TryFrom<HashMap<RawId, String>> for Catalog {
    type Error = RttError;

    fn try_from(raw: HashMap<RawId, String>) -> Result<Self> {
        let templates = raw
            .into_iter()
            .map(|(id, template)| {
                let parsed = match &id {
                    RawId::Number(n) => u16::try_from(*n).ok(),
                    RawId::Text(text) => parse_id(text),
                };
                parsed.map(|id| (id, template)).ok_or_else(|| {
                    RttError::parse("catalog", format!("identifier {id:?} is not a 16-bit number"))
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self { templates })
    }
}

fn parse_id(text: &str) -> Option<u16> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

impl Catalog {
    pub fn new(templates: HashMap<u16, String>) -> Self {
        Self { templates }
    }

    /// Template for `id`, if the firmware build declared one.
    pub fn get(&self, id: u16) -> Option<&str> {
        self.templates.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Parse a JSON or YAML document.
    pub fn parse_str(contents: &str) -> Result<Self> {
        serde_yaml_ng::from_str(contents).map_err(|e| RttError::parse("catalog", e.to_string()))
    }

    /// Load a catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RttError::file_error(path.to_path_buf(), e))?;
        let catalog = Self::parse_str(&contents)?;
        debug!(path = %path.display(), templates = catalog.len(), "Loaded catalog");
        Ok(catalog)
    }
}

impl From<Catalog> for HashMap<u16, String> {
    fn from(catalog: Catalog) -> Self {
        catalog.templates
    }
}

impl FromIterator<(u16, String)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (u16, String)>>(iter: I) -> Self {
        Self { templates: iter.into_iter().collect() }
    }
}

/// Where a session gets its catalog from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogSource {
    /// Re-read at the start of every session, so a rebuilt firmware is picked up.
    Path(PathBuf),
    Inline(Catalog),
}

impl CatalogSource {
    pub fn load(&self) -> Result<Catalog> {
        match self {
            CatalogSource::Path(path) => Catalog::load(path),
            CatalogSource::Inline(catalog) => Ok(catalog.clone()),
        }
    }
}

impl From<Catalog> for CatalogSource {
    fn from(catalog: Catalog) -> Self {
        CatalogSource::Inline(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keys_are_strings() {
        let catalog = Catalog::parse_str(r#"{"1": "boot {}", "0x10": "tick"}"#).unwrap();
        assert_eq!(catalog.get(1), Some("boot {}"));
        assert_eq!(catalog.get(16), Some("tick"));
        assert_eq!(catalog.get(2), None);
    }

    #[test]
    fn yaml_keys_are_numbers() {
        let catalog = Catalog::parse_str("3: adc {}\n65535: last\n").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(u16::MAX), Some("last"));
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        let err = Catalog::parse_str("70000: too big\n").unwrap_err();
        assert!(matches!(err, RttError::Parse { .. }));
        assert!(Catalog::parse_str(r#"{"abc": "x"}"#).is_err());
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let err = CatalogSource::Path(PathBuf::from("/nonexistent/catalog.json")).load().unwrap_err();
        assert!(matches!(err, RttError::File { .. }));
    }

    #[test]
    fn serializes_back_to_a_mapping() {
        let catalog: Catalog = [(7, "seven".to_string())].into_iter().collect();
        let yaml = serde_yaml_ng::to_string(&catalog).unwrap();
        assert_eq!(Catalog::parse_str(&yaml).unwrap(), catalog);
    }

    #[test]
    fn inline_source_clones() {
        let catalog: Catalog = [(7, "seven".to_string())].into_iter().collect();
        let source = CatalogSource::from(catalog.clone());
        assert_eq!(source.load().unwrap(), catalog);
    }
}
