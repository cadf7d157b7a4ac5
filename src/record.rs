use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{ Deserialize, Serialize };

/// One classified license declaration. `license_id` is only set for catalog
/// matches; custom and unknown licenses carry `None`.
///
/// Equality covers all fields, so a raw license set keeps two entries with the
/// same id but different captured URLs apart. Output lists are collapsed by
/// `(license, license_id)` via [`dedup_licenses`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LicenseEntry {
    pub license: String,
    pub license_id: Option<String>,
    pub license_url: String,
}

impl LicenseEntry {
    pub fn new(
        license: impl Into<String>,
        license_id: Option<&str>,
        license_url: impl Into<String>
    ) -> Self {
        LicenseEntry {
            license: license.into(),
            license_id: license_id.map(|id| id.to_string()),
            license_url: license_url.into(),
        }
    }

    /// Display form used in diagnostics, e.g. `BSD` or `MIT License, licenseId = MIT`.
    pub fn name_with_id(&self) -> String {
        match &self.license_id {
            Some(id) => format!("{}, licenseId = {}", self.license, id),
            None => self.license.clone(),
        }
    }
}

/// The unit of report output: one resolved package with everything we know
/// about it. Serialized as the persisted JSON array form, which is also read
/// back when merging previously generated sibling-module reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub dependency: String,
    pub version: String,
    pub project: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub year: Option<String>,
    pub licenses: Vec<LicenseEntry>,
    pub developers: Vec<String>,
}

/// Collapse a license list to one entry per `(license, license_id)` pair,
/// keeping the first occurrence.
pub fn dedup_licenses(licenses: Vec<LicenseEntry>) -> Vec<LicenseEntry> {
    let mut result: Vec<LicenseEntry> = Vec::new();
    for entry in licenses {
        if
            !result
                .iter()
                .any(|e| e.license == entry.license && e.license_id == entry.license_id)
        {
            result.push(entry);
        }
    }
    result
}

pub fn read_records(path: &Path) -> anyhow::Result<Vec<LicenseRecord>> {
    let content = fs
        ::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json
        ::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))
}

pub fn write_records(path: &Path, records: &[LicenseRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(records)?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
