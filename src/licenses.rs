//! License classification: maps a free-text license declaration plus optional
//! URL to a canonical [`LicenseEntry`], consulting the catalog, the custom
//! license table and finally passing unknown declarations through unchanged.

use thiserror::Error;

use crate::coordinate::ModuleId;
use crate::custom::CustomLicenses;
use crate::record::LicenseEntry;
use crate::spdx::SpdxCatalog;

pub const BSD: &str = "BSD";
const MIT: &str = "MIT";

/// Preference order consulted when a package declares more than one license.
/// The first family found in the declared set wins.
pub const PREFERRED_LICENSE_IDS: &[&str] = &[
    "MIT",
    "BSD",
    "CDDL-1.1",
    "CDDL-1.0",
    "Apache-2.0",
    "EPL-2.0",
    "EPL-1.0",
    "LGPL-3.0",
    "LGPL-2.1",
    "GPL-2.0-with-classpath-exception",
];

/// A broken input dataset. These abort the whole resolution pass, unlike the
/// per-package gaps which are only logged.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Duplicate License name {0}")]
    DuplicateLicense(String),
    #[error("Unknown license {license} referenced by synonym '{synonym}'")]
    UnknownSynonymTarget {
        synonym: String,
        license: String,
    },
    #[error("Custom license definition for '{0}' needs to either have an id or a name and an URL")]
    InvalidOverride(String),
}

/// The classifier. Holds the read-only catalog and custom tables; safe to
/// share across any number of package resolutions.
#[derive(Debug, Clone)]
pub struct Licenses {
    catalog: SpdxCatalog,
    custom: CustomLicenses,
}

impl Licenses {
    pub fn new(catalog: SpdxCatalog, custom: CustomLicenses) -> Self {
        Licenses { catalog, custom }
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Ok(Licenses::new(SpdxCatalog::builtin(), CustomLicenses::builtin()?))
    }

    pub fn catalog(&self) -> &SpdxCatalog {
        &self.catalog
    }

    /// Classify one license declaration. Never fails: unresolvable input is
    /// returned as-is with `license_id = None`, optionally with an
    /// unknown-license diagnostic.
    pub fn license(
        &self,
        identifier: &ModuleId,
        name: &str,
        url: Option<&str>,
        log_unknown: bool
    ) -> LicenseEntry {
        let url = url.map(str::trim).filter(|u| !u.is_empty());

        if let Some(entry) = self.catalog.find_license(name, url) {
            // MIT is commonly published under per-project URLs which are more
            // useful in the report than the catalog default.
            if entry.license_id == MIT {
                if let Some(url) = url {
                    return LicenseEntry::new(name, Some(entry.license_id), url);
                }
            }
            if let Some(alt) = entry.see_also.first() {
                return LicenseEntry::new(entry.name, Some(entry.license_id), sanitize_url(alt));
            }
            if let Some(url) = url {
                return LicenseEntry::new(entry.name, Some(entry.license_id), sanitize_url(url));
            }
            log_missing_url(identifier, name, url);
            return LicenseEntry::new(entry.name, Some(entry.license_id), "");
        }

        if let Some(custom) = self.custom.get_by_description(name) {
            // The BSD tag alone says nothing about the variant, so a declared
            // URL is more precise than the canonical one.
            if custom.license == BSD {
                if let Some(url) = url {
                    return LicenseEntry::new(BSD, None, url);
                }
            }
            return custom.clone();
        }

        if log_unknown {
            log_unknown_license(identifier, name, url);
        }
        LicenseEntry::new(name, None, url.unwrap_or(""))
    }

    /// Pick the first preferred license family present in a multi-license set.
    /// Returns `None` when no preference matches; the caller then keeps the
    /// full set un-reduced.
    pub fn choose_preferred(
        licenses: &[LicenseEntry],
        preferred_ids: &[&str],
        context: &str
    ) -> Option<LicenseEntry> {
        for license_id in preferred_ids {
            if let Some(chosen) = licenses.iter().find(|entry| matches_license(entry, license_id)) {
                let discarded: Vec<String> = licenses
                    .iter()
                    .filter(|entry| *entry != chosen)
                    .map(|entry| entry.name_with_id())
                    .collect();
                log::debug!(
                    target: "license::multiple",
                    "Automatically chose {} out of {} for {}",
                    chosen.name_with_id(),
                    discarded.join(", "),
                    context
                );
                return Some(chosen.clone());
            }
        }
        None
    }
}

/// BSD licenses live in the custom table without an SPDX-style id, so the
/// preference match treats the bare tag as its own family.
fn matches_license(entry: &LicenseEntry, license_id: &str) -> bool {
    if entry.license_id.as_deref() == Some(license_id) {
        return true;
    }
    license_id == BSD && entry.license == BSD && entry.license_id.is_none()
}

/// Prefix bare host/paths with `https://` and rewrite `http://` to
/// `https://`; the URL is never otherwise altered.
pub fn sanitize_url(url: &str) -> String {
    if !url.starts_with("http") {
        format!("https://{}", url)
    } else {
        url.replace("http://", "https://")
    }
}

pub fn log_missing_license(identifier: &ModuleId) {
    log::error!(target: "license::missing", "'{}' does not provide any license information.", identifier);
}

fn log_missing_url(identifier: &ModuleId, name: &str, url: Option<&str>) {
    log::error!(
        target: "license::missing",
        "'{}' does not provide a valid license URL ({}) for '{}'.",
        identifier,
        url.unwrap_or(""),
        name
    );
}

pub fn log_multiple_licenses(identifier: &ModuleId, licenses: &[LicenseEntry]) {
    let alternatives: Vec<String> = licenses.iter().map(|entry| entry.name_with_id()).collect();
    log::error!(
        target: "license::multiple",
        "'{}' provides ambiguous licenses, choose the appropriate one:\n        {}",
        identifier,
        alternatives.join("\n        ")
    );
}

fn log_unknown_license(identifier: &ModuleId, name: &str, url: Option<&str>) {
    log::error!(
        target: "license::unknown",
        "'{}' provides unknown license information. '{}' ({}) needs to be verified.",
        identifier,
        name,
        url.unwrap_or("")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifier() -> ModuleId {
        // only used for logging, the value itself is irrelevant here
        ModuleId::new("io.cloudflight", "gradle", "1.0")
    }

    fn licenses() -> Licenses {
        Licenses::builtin().unwrap()
    }

    #[test]
    fn mit_license_without_url() {
        let license = licenses().license(&identifier(), "MIT", None, false);
        assert_eq!(license.license_url, "https://opensource.org/licenses/MIT");
        assert_eq!(license.license_id.as_deref(), Some("MIT"));
    }

    #[test]
    fn mit_license_keeps_caller_url() {
        let license = licenses().license(
            &identifier(),
            "MIT",
            Some("https://my-custom-mit-license"),
            false
        );
        assert_eq!(license.license_url, "https://my-custom-mit-license");
        assert_eq!(license.license, "MIT");
    }

    #[test]
    fn bsd_license_without_url() {
        let license = licenses().license(&identifier(), "BSD 3-clause New License", None, false);
        assert_eq!(license.license_url, "https://opensource.org/licenses/BSD-3-Clause#Default");
        assert_eq!(license.license_id, None);
    }

    #[test]
    fn bsd_license_keeps_caller_url() {
        let license = licenses().license(
            &identifier(),
            "BSD 3-clause New License",
            Some("https://my-custom-bsd-license"),
            false
        );
        assert_eq!(license.license, "BSD");
        assert_eq!(license.license_url, "https://my-custom-bsd-license");
    }

    #[test]
    fn apache_caller_url_is_overridden() {
        let license = licenses().license(
            &identifier(),
            "Apache-2.0",
            Some("https://my-fake-apache"),
            false
        );
        assert_eq!(license.license_url, "https://www.apache.org/licenses/LICENSE-2.0");
        assert_eq!(license.license_id.as_deref(), Some("Apache-2.0"));
    }

    #[test]
    fn zero_bsd_license_is_known() {
        let license = licenses().license(&identifier(), "0BSD", None, false);
        assert_eq!(license.license_id.as_deref(), Some("0BSD"));
    }

    #[test]
    fn synonym_classifies_like_canonical_name() {
        let by_synonym = licenses().license(
            &identifier(),
            "The Apache Software License, Version 2.0",
            None,
            false
        );
        let by_name = licenses().license(&identifier(), "Apache-2.0", None, false);
        assert_eq!(by_synonym, by_name);
    }

    #[test]
    fn unknown_license_passes_through() {
        let license = licenses().license(
            &identifier(),
            "My Very Own License",
            Some("https://example.org/license"),
            true
        );
        assert_eq!(license.license, "My Very Own License");
        assert_eq!(license.license_id, None);
        assert_eq!(license.license_url, "https://example.org/license");

        let without_url = licenses().license(&identifier(), "My Very Own License", None, false);
        assert_eq!(without_url.license_url, "");
    }

    #[test]
    fn sanitizes_urls() {
        assert_eq!(sanitize_url("www.example.org/l"), "https://www.example.org/l");
        assert_eq!(sanitize_url("http://example.org/l"), "https://example.org/l");
        assert_eq!(sanitize_url("https://example.org/l"), "https://example.org/l");
    }

    #[test]
    fn preferred_license_wins_over_alternatives() {
        let mit = licenses().license(&identifier(), "MIT", None, false);
        let apache = licenses().license(&identifier(), "Apache-2.0", None, false);
        let set = vec![apache.clone(), mit.clone()];

        let chosen = Licenses::choose_preferred(&set, &["MIT", "Apache-2.0"], "test");
        assert_eq!(chosen, Some(mit));

        let flipped = Licenses::choose_preferred(&set, &["Apache-2.0", "MIT"], "test");
        assert_eq!(flipped, Some(apache));
    }

    #[test]
    fn no_preference_match_keeps_the_set() {
        let gpl = licenses().license(&identifier(), "GPL-3.0", None, false);
        let chosen = Licenses::choose_preferred(&[gpl], &["MIT", "Apache-2.0"], "test");
        assert_eq!(chosen, None);
    }

    #[test]
    fn bsd_matches_the_bsd_family() {
        let bsd = licenses().license(&identifier(), "BSD 3-clause New License", None, false);
        let chosen = Licenses::choose_preferred(&[bsd.clone()], PREFERRED_LICENSE_IDS, "test");
        assert_eq!(chosen, Some(bsd));
    }
}
