//! Built-in catalog of well-known licenses, keyed by their SPDX-style
//! identifiers. Consult https://spdx.org/licenses/ for names and acronyms.

/// One catalog row. `reference` is the canonical reference URL, `see_also`
/// carries the officially published alternates (preferred for report output),
/// `aliases` the free-text names commonly found in package metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub license_id: &'static str,
    pub name: &'static str,
    pub reference: &'static str,
    pub see_also: &'static [&'static str],
    pub aliases: &'static [&'static str],
}

static BUILTIN: &[CatalogEntry] = &[
    CatalogEntry {
        license_id: "MIT",
        name: "MIT License",
        reference: "https://opensource.org/licenses/MIT",
        see_also: &["https://opensource.org/licenses/MIT"],
        aliases: &["The MIT License"],
    },
    CatalogEntry {
        license_id: "Apache-2.0",
        name: "Apache License 2.0",
        reference: "https://opensource.org/licenses/Apache-2.0",
        see_also: &["https://www.apache.org/licenses/LICENSE-2.0"],
        aliases: &[
            "Apache License, Version 2.0",
            "The Apache Software License, Version 2.0",
            "The Apache License, Version 2.0",
            "Apache 2.0",
            "ASL 2.0",
        ],
    },
    CatalogEntry {
        license_id: "BSD-2-Clause",
        name: "BSD 2-Clause \"Simplified\" License",
        reference: "https://opensource.org/licenses/BSD-2-Clause",
        see_also: &["https://opensource.org/licenses/BSD-2-Clause"],
        aliases: &[],
    },
    CatalogEntry {
        license_id: "BSD-3-Clause",
        name: "BSD 3-Clause \"New\" or \"Revised\" License",
        reference: "https://opensource.org/licenses/BSD-3-Clause",
        see_also: &["https://opensource.org/licenses/BSD-3-Clause"],
        aliases: &[],
    },
    CatalogEntry {
        license_id: "0BSD",
        name: "BSD Zero Clause License",
        reference: "https://opensource.org/licenses/0BSD",
        see_also: &["https://opensource.org/licenses/0BSD"],
        aliases: &[],
    },
    CatalogEntry {
        license_id: "ISC",
        name: "ISC License",
        reference: "https://opensource.org/licenses/ISC",
        see_also: &["https://opensource.org/licenses/ISC"],
        aliases: &[],
    },
    CatalogEntry {
        license_id: "GPL-2.0",
        name: "GNU General Public License v2.0 only",
        reference: "https://www.gnu.org/licenses/old-licenses/gpl-2.0.en.html",
        see_also: &["https://www.gnu.org/licenses/old-licenses/gpl-2.0.en.html"],
        aliases: &["GPL-2.0-only", "GPL-2.0-or-later", "GNU General Public License, version 2"],
    },
    CatalogEntry {
        license_id: "GPL-2.0-with-classpath-exception",
        name: "GNU General Public License v2.0 w/Classpath exception",
        reference: "https://openjdk.java.net/legal/gplv2+ce.html",
        see_also: &[],
        aliases: &[
            "GPL2 w/ CPE",
            "GNU General Public License, version 2 with the GNU Classpath Exception",
        ],
    },
    CatalogEntry {
        license_id: "GPL-3.0",
        name: "GNU General Public License v3.0 only",
        reference: "https://www.gnu.org/licenses/gpl-3.0.en.html",
        see_also: &["https://www.gnu.org/licenses/gpl-3.0.en.html"],
        aliases: &["GPL-3.0-only", "GPL-3.0-or-later", "GNU General Public License, version 3"],
    },
    CatalogEntry {
        license_id: "LGPL-2.1",
        name: "GNU Lesser General Public License v2.1 only",
        reference: "https://www.gnu.org/licenses/old-licenses/lgpl-2.1.en.html",
        see_also: &["https://www.gnu.org/licenses/old-licenses/lgpl-2.1.en.html"],
        aliases: &[
            "LGPL-2.1-only",
            "LGPL-2.1-or-later",
            "GNU Lesser General Public License",
            "GNU Lesser General Public License, Version 2.1",
        ],
    },
    CatalogEntry {
        license_id: "LGPL-3.0",
        name: "GNU Lesser General Public License v3.0 only",
        reference: "https://www.gnu.org/licenses/lgpl-3.0.en.html",
        see_also: &["https://www.gnu.org/licenses/lgpl-3.0.en.html"],
        aliases: &["LGPL-3.0-only", "LGPL-3.0-or-later"],
    },
    CatalogEntry {
        license_id: "AGPL-3.0",
        name: "GNU Affero General Public License v3.0",
        reference: "https://www.gnu.org/licenses/agpl-3.0.en.html",
        see_also: &["https://www.gnu.org/licenses/agpl-3.0.en.html"],
        aliases: &["AGPL-3.0-only", "AGPL-3.0-or-later"],
    },
    CatalogEntry {
        license_id: "EPL-1.0",
        name: "Eclipse Public License 1.0",
        reference: "https://opensource.org/licenses/EPL-1.0",
        see_also: &["https://www.eclipse.org/legal/epl-v10.html"],
        aliases: &["Eclipse Public License - v 1.0"],
    },
    CatalogEntry {
        license_id: "EPL-2.0",
        name: "Eclipse Public License 2.0",
        reference: "https://opensource.org/licenses/EPL-2.0",
        see_also: &["https://www.eclipse.org/legal/epl-2.0/"],
        aliases: &["Eclipse Public License v. 2.0", "Eclipse Public License - v 2.0"],
    },
    CatalogEntry {
        license_id: "CDDL-1.0",
        name: "Common Development and Distribution License 1.0",
        reference: "https://opensource.org/licenses/CDDL-1.0",
        see_also: &["https://opensource.org/licenses/CDDL-1.0"],
        aliases: &["CDDL", "Common Development and Distribution License (CDDL) v1.0"],
    },
    CatalogEntry {
        license_id: "CDDL-1.1",
        name: "Common Development and Distribution License 1.1",
        reference: "https://spdx.org/licenses/CDDL-1.1.html",
        see_also: &["https://spdx.org/licenses/CDDL-1.1.html"],
        aliases: &["Common Development and Distribution License (CDDL) v1.1"],
    },
    CatalogEntry {
        license_id: "MPL-2.0",
        name: "Mozilla Public License 2.0",
        reference: "https://opensource.org/licenses/MPL-2.0",
        see_also: &["https://www.mozilla.org/en-US/MPL/2.0/"],
        aliases: &["MPL 2.0"],
    },
    CatalogEntry {
        license_id: "CC0-1.0",
        name: "Creative Commons Zero v1.0 Universal",
        reference: "https://creativecommons.org/publicdomain/zero/1.0/",
        see_also: &["https://creativecommons.org/publicdomain/zero/1.0/"],
        aliases: &["CC0"],
    },
    CatalogEntry {
        license_id: "Unlicense",
        name: "The Unlicense",
        reference: "https://unlicense.org/",
        see_also: &["https://unlicense.org/"],
        aliases: &[],
    },
    CatalogEntry {
        license_id: "Zlib",
        name: "zlib License",
        reference: "https://opensource.org/licenses/Zlib",
        see_also: &["https://opensource.org/licenses/Zlib"],
        aliases: &["zlib/libpng license"],
    },
    CatalogEntry {
        license_id: "WTFPL",
        name: "Do What The F*ck You Want To Public License",
        reference: "http://www.wtfpl.net/",
        see_also: &["http://www.wtfpl.net/"],
        aliases: &[],
    },
];

/// Lookup over the static catalog. The table is immutable after construction,
/// so one instance can be shared by any number of resolution passes.
#[derive(Debug, Clone)]
pub struct SpdxCatalog {
    entries: &'static [CatalogEntry],
}

impl SpdxCatalog {
    pub fn builtin() -> Self {
        SpdxCatalog { entries: BUILTIN }
    }

    /// Exact-match lookup by SPDX-style identifier.
    pub fn find_by_id(&self, license_id: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.license_id.eq_ignore_ascii_case(license_id))
    }

    /// Find a catalog entry by license name (id, display name or alias,
    /// case-insensitive) or by URL containment against the reference URLs.
    pub fn find_license(&self, name: &str, url: Option<&str>) -> Option<&CatalogEntry> {
        let by_name = self.entries.iter().find(|entry| {
            entry.license_id.eq_ignore_ascii_case(name) ||
                entry.name.eq_ignore_ascii_case(name) ||
                entry
                    .aliases
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(name))
        });
        if by_name.is_some() {
            return by_name;
        }

        let url = url?.trim();
        if url.is_empty() {
            return None;
        }
        let query = normalize_url(url);
        self.entries.iter().find(|entry| {
            std::iter
                ::once(&entry.reference)
                .chain(entry.see_also.iter())
                .any(|candidate| {
                    let candidate = normalize_url(candidate);
                    query == candidate || query.contains(&candidate)
                })
        })
    }
}

/// Scheme-insensitive comparison form of a URL.
fn normalize_url(url: &str) -> String {
    let url = url.trim().to_ascii_lowercase();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(&url);
    let url = url.strip_prefix("www.").unwrap_or(url);
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_by_id_and_name() {
        let catalog = SpdxCatalog::builtin();
        assert_eq!(catalog.find_by_id("Apache-2.0").unwrap().name, "Apache License 2.0");
        assert_eq!(
            catalog.find_license("The Apache Software License, Version 2.0", None).unwrap().license_id,
            "Apache-2.0"
        );
        assert_eq!(catalog.find_license("mit license", None).unwrap().license_id, "MIT");
        assert!(catalog.find_license("0BSD", None).is_some());
    }

    #[test]
    fn finds_by_url() {
        let catalog = SpdxCatalog::builtin();
        let entry = catalog
            .find_license("Some Custom Name", Some("http://www.apache.org/licenses/LICENSE-2.0.txt"))
            .unwrap();
        assert_eq!(entry.license_id, "Apache-2.0");
    }

    #[test]
    fn unknown_name_misses() {
        let catalog = SpdxCatalog::builtin();
        assert!(catalog.find_license("BSD 3-clause New License", None).is_none());
        assert!(catalog.find_by_id("NOT-A-LICENSE").is_none());
    }

    #[test]
    fn catalog_ids_are_unique() {
        let catalog = SpdxCatalog::builtin();
        for entry in BUILTIN {
            assert_eq!(
                catalog.find_by_id(entry.license_id).unwrap().license_id,
                entry.license_id
            );
        }
    }
}
