//! Hand-maintained table of licenses that have no SPDX-style catalog entry,
//! plus a synonym table mapping alternate free-text descriptions onto them.

use std::collections::HashMap;

use crate::licenses::ConfigError;
use crate::record::LicenseEntry;

/// `(canonical name, reference URL)` rows of the built-in custom table.
static CUSTOM_LICENSES: &[(&str, &str)] = &[
    ("BSD", "https://opensource.org/licenses/BSD-3-Clause#Default"),
    ("Public Domain", "https://creativecommons.org/publicdomain/zero/1.0/"),
    ("Bouncy Castle Licence", "https://www.bouncycastle.org/licence.html"),
    ("JSON License", "https://www.json.org/license.html"),
];

/// `(canonical name, synonyms)` rows. Every synonym must reference a canonical
/// name from the table above.
static CUSTOM_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "BSD",
        &[
            "BSD 3-clause New License",
            "BSD New license",
            "BSD Licence 3",
            "The BSD License",
            "The BSD 3-Clause License",
            "BSD-style license",
        ],
    ),
    ("Public Domain", &["Public Domain, per Creative Commons CC0"]),
    ("JSON License", &["The JSON License"]),
];

/// Case-insensitive description index over the custom licenses.
///
/// Construction validates the tables once; a broken table is a configuration
/// error that aborts the whole pass rather than a per-package condition.
#[derive(Debug, Clone)]
pub struct CustomLicenses {
    by_description: HashMap<String, LicenseEntry>,
}

impl CustomLicenses {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(CUSTOM_LICENSES, CUSTOM_SYNONYMS)
    }

    pub fn new(
        licenses: &[(&str, &str)],
        synonyms: &[(&str, &[&str])]
    ) -> Result<Self, ConfigError> {
        let mut by_description: HashMap<String, LicenseEntry> = HashMap::new();

        for (name, url) in licenses {
            let entry = LicenseEntry::new(*name, None, *url);
            if by_description.insert(name.to_lowercase(), entry).is_some() {
                return Err(ConfigError::DuplicateLicense(name.to_string()));
            }
        }

        for (canonical, descriptions) in synonyms {
            let entry = by_description
                .get(&canonical.to_lowercase())
                .filter(|entry| entry.license == *canonical)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownSynonymTarget {
                    synonym: descriptions.first().unwrap_or(&"").to_string(),
                    license: canonical.to_string(),
                })?;
            for description in *descriptions {
                if
                    by_description
                        .insert(description.to_lowercase(), entry.clone())
                        .is_some()
                {
                    return Err(ConfigError::DuplicateLicense(description.to_string()));
                }
            }
        }

        Ok(CustomLicenses { by_description })
    }

    pub fn get_by_description(&self, description: &str) -> Option<&LicenseEntry> {
        self.by_description.get(&description.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_license() {
        let custom = CustomLicenses::builtin().unwrap();
        assert_eq!(custom.get_by_description("BSD").unwrap().license, "BSD");
    }

    #[test]
    fn finds_license_by_synonym() {
        let custom = CustomLicenses::builtin().unwrap();
        let entry = custom.get_by_description("BSD 3-clause New License").unwrap();
        assert_eq!(entry.license, "BSD");
        assert_eq!(entry.license_url, "https://opensource.org/licenses/BSD-3-Clause#Default");
        assert_eq!(entry.license_id, None);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let custom = CustomLicenses::builtin().unwrap();
        assert!(custom.get_by_description("bsd 3-CLAUSE new license").is_some());
        assert!(custom.get_by_description("no such license").is_none());
    }

    #[test]
    fn duplicate_license_name_is_fatal() {
        let result = CustomLicenses::new(&[("BSD", "https://a"), ("bsd", "https://b")], &[]);
        assert!(matches!(result, Err(ConfigError::DuplicateLicense(_))));
    }

    #[test]
    fn synonym_clashing_with_existing_key_is_fatal() {
        let result = CustomLicenses::new(
            &[("BSD", "https://a"), ("Public Domain", "https://b")],
            &[("BSD", &["Public Domain"])]
        );
        assert!(matches!(result, Err(ConfigError::DuplicateLicense(_))));
    }

    #[test]
    fn synonym_for_unknown_license_is_fatal() {
        let result = CustomLicenses::new(
            &[("BSD", "https://a")],
            &[("No Such License", &["whatever"])]
        );
        assert!(matches!(result, Err(ConfigError::UnknownSynonymTarget { .. })));
    }
}
