//! Per-package license overrides loaded from `licenses.json` files. An
//! override replaces the metadata-chain walk for the license field only, and
//! doubles as a last-resort source for coordinates nothing else resolved.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{ Deserialize, Serialize };

use crate::coordinate::ModuleId;
use crate::licenses::{ ConfigError, Licenses };
use crate::record::{ LicenseEntry, LicenseRecord };

pub const LICENSES_JSON: &str = "licenses.json";

/// One override row: either an explicit catalog id, or an explicit
/// `(license, license_url)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseDefinition {
    pub artifact: String,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub license_id: Option<String>,
    #[serde(default)]
    pub license_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<ModuleId, LicenseEntry>,
}

impl OverrideTable {
    pub fn empty() -> Self {
        OverrideTable::default()
    }

    /// Load every `licenses.json` reachable from the project directory
    /// upwards, closest file first.
    pub fn load(project_dir: &Path, licenses: &Licenses) -> anyhow::Result<Self> {
        let mut definitions: Vec<LicenseDefinition> = Vec::new();
        for dir in project_dir.ancestors() {
            let file = dir.join(LICENSES_JSON);
            if file.is_file() {
                let content = fs
                    ::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?;
                let mut parsed: Vec<LicenseDefinition> = serde_json
                    ::from_str(&content)
                    .with_context(|| format!("failed to parse {}", file.display()))?;
                definitions.append(&mut parsed);
            }
        }
        Ok(Self::from_definitions(&definitions, licenses)?)
    }

    pub fn from_definitions(
        definitions: &[LicenseDefinition],
        licenses: &Licenses
    ) -> Result<Self, ConfigError> {
        let mut entries = HashMap::new();
        for definition in definitions {
            let identifier = match ModuleId::parse(&definition.artifact) {
                Some(identifier) => identifier,
                None => {
                    continue;
                }
            };
            if let Some(license_id) = &definition.license_id {
                match licenses.catalog().find_by_id(license_id) {
                    Some(entry) => {
                        entries.insert(
                            identifier.clone(),
                            licenses.license(&identifier, entry.name, None, false)
                        );
                    }
                    None => {
                        log::error!(target: "license::unknown", "The licenseId {} is unknown", license_id);
                    }
                }
            } else if
                let (Some(license), Some(license_url)) = (
                    &definition.license,
                    &definition.license_url,
                )
            {
                // custom licenses declared directly by a project are expected
                // to be unknown to the catalog, so no diagnostic here
                entries.insert(
                    identifier.clone(),
                    licenses.license(&identifier, license, Some(license_url), false)
                );
            } else {
                return Err(ConfigError::InvalidOverride(definition.artifact.clone()));
            }
        }
        Ok(OverrideTable { entries })
    }

    pub fn get(&self, identifier: &ModuleId) -> Option<&LicenseEntry> {
        self.entries.get(identifier)
    }

    #[allow(dead_code)] // exercised by tests only
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Minimal license-only record for a coordinate nothing else resolved.
    pub fn fallback_record(&self, identifier: &ModuleId) -> Option<LicenseRecord> {
        self.get(identifier).map(|entry| LicenseRecord {
            dependency: identifier.to_string(),
            version: identifier.version.clone(),
            project: format!("{}:{}", identifier.group, identifier.name),
            description: None,
            url: None,
            year: None,
            licenses: vec![entry.clone()],
            developers: Vec::new(),
        })
    }
}
