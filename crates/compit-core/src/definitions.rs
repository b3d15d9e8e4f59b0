// ── Device definition index ──
//
// Immutable `(class, type code) → DeviceDefinition` map, built once per
// load from a per-language catalog. Lookups hand out the same `Arc`, so
// every device instance of a model shares one definition.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use compit_api::{CompitClient, Device, DeviceDefinition};
use tracing::{debug, warn};

use crate::config::{CatalogSource, DEFAULT_LANGUAGE};
use crate::error::CoreError;

const BUNDLED_EN: &str = include_str!("../definitions/devices_en.json");
const BUNDLED_PL: &str = include_str!("../definitions/devices_pl.json");

/// O(1) definition lookup keyed by `(class, code)`.
#[derive(Debug, Clone, Default)]
pub struct DefinitionIndex {
    by_key: HashMap<(u32, u32), Arc<DeviceDefinition>>,
}

impl DefinitionIndex {
    /// Index a catalog. On duplicate keys the first entry wins.
    pub fn new(definitions: Vec<DeviceDefinition>) -> Self {
        let mut by_key = HashMap::with_capacity(definitions.len());
        for def in definitions {
            let key = (def.class, def.code);
            if by_key.contains_key(&key) {
                debug!(class = def.class, code = def.code, name = %def.name, "duplicate definition ignored");
                continue;
            }
            by_key.insert(key, Arc::new(def));
        }
        Self { by_key }
    }

    pub fn lookup(&self, class: u32, code: u32) -> Option<Arc<DeviceDefinition>> {
        self.by_key.get(&(class, code)).map(Arc::clone)
    }

    /// Definition for a topology record, joined on `(class, type)`.
    pub fn for_device(&self, device: &Device) -> Option<Arc<DeviceDefinition>> {
        self.lookup(device.class, device.device_type)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeviceDefinition>> {
        self.by_key.values()
    }
}

// ── Catalog loading ──────────────────────────────────────────────────

/// Load and index the catalog for `language` from the given source.
pub async fn load_index(
    source: &CatalogSource,
    language: &str,
    client: &CompitClient,
) -> Result<DefinitionIndex, CoreError> {
    let definitions = match source {
        CatalogSource::Bundled => bundled_catalog(language)?,
        CatalogSource::Directory(dir) => load_catalog_dir(dir, language)?,
        CatalogSource::Remote => client.device_definitions().await.map_err(|e| {
            if e.is_auth_error() {
                CoreError::from(e)
            } else {
                CoreError::CatalogUnavailable {
                    message: format!("remote catalog: {e}"),
                }
            }
        })?,
    };

    let index = DefinitionIndex::new(definitions);
    debug!(definitions = index.len(), language, "definition index built");
    Ok(index)
}

pub fn parse_catalog(json: &str) -> Result<Vec<DeviceDefinition>, CoreError> {
    serde_json::from_str(json).map_err(|e| CoreError::CatalogUnavailable {
        message: format!("invalid catalog: {e}"),
    })
}

/// Catalog compiled into the binary. Unknown languages use `en`.
pub fn bundled_catalog(language: &str) -> Result<Vec<DeviceDefinition>, CoreError> {
    let json = match language {
        "pl" => BUNDLED_PL,
        "en" => BUNDLED_EN,
        other => {
            debug!(language = other, "no bundled catalog for language, using en");
            BUNDLED_EN
        }
    };
    parse_catalog(json)
}

/// `devices_{language}.json` from `dir`, falling back to `devices_en.json`.
pub fn load_catalog_dir(dir: &Path, language: &str) -> Result<Vec<DeviceDefinition>, CoreError> {
    if language != DEFAULT_LANGUAGE {
        let localized = dir.join(catalog_file_name(language));
        match std::fs::read_to_string(&localized) {
            Ok(json) => match parse_catalog(&json) {
                Ok(defs) => return Ok(defs),
                Err(e) => warn!(path = %localized.display(), error = %e, "localized catalog unusable, falling back"),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %localized.display(), "no localized catalog, falling back");
            }
            Err(e) => warn!(path = %localized.display(), error = %e, "cannot read localized catalog"),
        }
    }

    let default = dir.join(catalog_file_name(DEFAULT_LANGUAGE));
    let json = std::fs::read_to_string(&default).map_err(|e| CoreError::CatalogUnavailable {
        message: format!("{}: {e}", default.display()),
    })?;
    parse_catalog(&json)
}

fn catalog_file_name(language: &str) -> String {
    format!("devices_{language}.json")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"[
        { "Name": "Test Model", "Code": 5, "Class": 10, "Parameters": [
            { "ParameterCode": "__tpokojowa", "Label": "Room", "ReadWrite": "R" }
        ] }
    ]"#;

    #[test]
    fn lookup_returns_same_arc() {
        let index = DefinitionIndex::new(bundled_catalog("en").unwrap());
        let a = index.lookup(10, 5).unwrap();
        let b = index.lookup(10, 5).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name, "Nano Color 2");
    }

    #[test]
    fn unknown_key_is_absent() {
        let index = DefinitionIndex::new(bundled_catalog("en").unwrap());
        assert!(index.lookup(10, 999).is_none());
        assert!(index.lookup(999, 5).is_none());
    }

    #[test]
    fn duplicate_keys_keep_first() {
        let mut defs = parse_catalog(MINIMAL).unwrap();
        let mut dup = defs[0].clone();
        dup.name = "Shadow".into();
        defs.push(dup);

        let index = DefinitionIndex::new(defs);
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup(10, 5).unwrap().name, "Test Model");
    }

    #[test]
    fn bundled_languages_share_models() {
        let en = DefinitionIndex::new(bundled_catalog("en").unwrap());
        let pl = DefinitionIndex::new(bundled_catalog("pl").unwrap());
        assert_eq!(en.len(), pl.len());

        let label = |index: &DefinitionIndex| {
            index
                .lookup(10, 5)
                .unwrap()
                .parameter("__tpokojowa")
                .unwrap()
                .label
                .clone()
        };
        assert_eq!(label(&en), "Room temperature");
        assert_eq!(label(&pl), "Temperatura pokojowa");
    }

    #[test]
    fn unknown_language_uses_english() {
        let de = bundled_catalog("de").unwrap();
        assert_eq!(de, bundled_catalog("en").unwrap());
    }

    #[test]
    fn directory_falls_back_to_english() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devices_en.json"), MINIMAL).unwrap();

        let defs = load_catalog_dir(dir.path(), "pl").unwrap();
        assert_eq!(defs[0].name, "Test Model");
    }

    #[test]
    fn directory_prefers_localized_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devices_en.json"), MINIMAL).unwrap();
        std::fs::write(
            dir.path().join("devices_pl.json"),
            MINIMAL.replace("Test Model", "Model testowy"),
        )
        .unwrap();

        let defs = load_catalog_dir(dir.path(), "pl").unwrap();
        assert_eq!(defs[0].name, "Model testowy");
    }

    #[test]
    fn missing_default_catalog_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_catalog_dir(dir.path(), "en").unwrap_err();
        assert!(matches!(err, CoreError::CatalogUnavailable { .. }));
    }

    #[test]
    fn unparsable_default_catalog_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devices_en.json"), "{ not a catalog").unwrap();
        let err = load_catalog_dir(dir.path(), "pl").unwrap_err();
        assert!(matches!(err, CoreError::CatalogUnavailable { .. }));
    }
}
