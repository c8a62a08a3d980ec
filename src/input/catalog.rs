//! Code for reading the equipment catalog.
use super::{input_err_msg, read_toml};
use crate::equipment::{Equipment, EquipmentCatalog};
use crate::id::into_id_map;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const CATALOG_FILE_NAME: &str = "catalog.toml";

/// The catalog used when a design directory has none of its own
const DEFAULT_CATALOG: &str = include_str!("../../data/catalog.toml");

/// The raw contents of a catalog file
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    panels: Vec<Equipment>,
    #[serde(default)]
    inverters: Vec<Equipment>,
    #[serde(default)]
    batteries: Vec<Equipment>,
}

impl CatalogFile {
    /// Index the entries by ID and check each has the specifications its role needs
    fn into_catalog(self) -> Result<EquipmentCatalog> {
        let catalog = EquipmentCatalog {
            panels: into_id_map(self.panels).context("Invalid panels")?,
            inverters: into_id_map(self.inverters).context("Invalid inverters")?,
            batteries: into_id_map(self.batteries).context("Invalid batteries")?,
        };
        catalog.validate()?;

        Ok(catalog)
    }
}

/// The built-in equipment catalog
pub fn default_catalog() -> Result<EquipmentCatalog> {
    let file: CatalogFile =
        toml::from_str(DEFAULT_CATALOG).context("Invalid built-in equipment catalog")?;
    file.into_catalog()
}

/// Read the equipment catalog for a design.
///
/// Uses `catalog.toml` in `design_dir` if present, otherwise the built-in catalog.
pub fn read_catalog(design_dir: &Path) -> Result<EquipmentCatalog> {
    let file_path = design_dir.join(CATALOG_FILE_NAME);
    if !file_path.is_file() {
        return default_catalog();
    }

    let file: CatalogFile = read_toml(&file_path)?;
    file.into_catalog()
        .with_context(|| input_err_msg(&file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_catalog() {
        let catalog = default_catalog().unwrap();
        assert_eq!(catalog.panels.len(), 2);
        assert_eq!(catalog.inverters.len(), 2);
        assert_eq!(catalog.batteries.len(), 2);
        assert_eq!(catalog.panels.get_index(0).unwrap().0.to_string(), "rec400aa");
    }

    #[test]
    fn test_read_catalog_falls_back_to_default() {
        let dir = tempdir().unwrap();
        assert_eq!(read_catalog(dir.path()).unwrap(), default_catalog().unwrap());
    }

    #[test]
    fn test_read_catalog_from_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CATALOG_FILE_NAME),
            r#"
[[panels]]
id = "p1"
manufacturer = "Acme"
model = "One"
specifications = { watts = 350, efficiency = 20, voltage = 35, current = 10, cost = 300 }
dimensions = { width = 1.6, height = 1.0 }
"#,
        )
        .unwrap();

        let catalog = read_catalog(dir.path()).unwrap();
        assert_eq!(catalog.panels.len(), 1);
        assert!(catalog.inverters.is_empty());
        assert_eq!(catalog.panel("p1").unwrap().panel_spec().unwrap().watts, 350.0);
    }

    #[test]
    fn test_read_catalog_duplicate_id() {
        let dir = tempdir().unwrap();
        let entry = r#"
[[batteries]]
id = "b1"
manufacturer = "Acme"
model = "Store"
specifications = { capacity = 10, powerOutput = 5, cost = 5000 }
dimensions = { width = 1.0, height = 1.0 }
"#;
        fs::write(dir.path().join(CATALOG_FILE_NAME), entry.repeat(2)).unwrap();

        let err = read_catalog(dir.path()).unwrap_err();
        assert!(format!("{err:?}").contains("Duplicate ID found: b1"));
    }

    #[test]
    fn test_read_catalog_missing_specification() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CATALOG_FILE_NAME),
            r#"
[[inverters]]
id = "i1"
manufacturer = "Acme"
model = "Invert"
specifications = { powerRating = 5000, type = "String", cost = 1000 }
dimensions = { width = 0.5, height = 0.3 }
"#,
        )
        .unwrap();

        let err = read_catalog(dir.path()).unwrap_err();
        assert!(format!("{err:?}").contains("i1 is missing required specification maxVoltage"));
    }
}
