use std::fmt;

use serde::{ Deserialize, Serialize };

/// Canonical identity of a resolved package: group (namespace), name and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl ModuleId {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        ModuleId {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse a `group:name:version` dependency string.
    ///
    /// Returns `None` (with a diagnostic on the `license::unknown` target) when
    /// the group or version segment is missing, mirroring how unresolvable
    /// coordinates are reported everywhere else.
    pub fn parse(dependency: &str) -> Option<ModuleId> {
        let mut parts = dependency.split(':');
        let group = parts.next().unwrap_or_default();
        let name = match parts.next() {
            Some(name) => name,
            None => {
                log::error!(target: "license::unknown", "GroupId of {} cannot be extracted", dependency);
                return None;
            }
        };
        let version = match parts.next() {
            Some(version) => version,
            None => {
                log::error!(target: "license::unknown", "Version of {} cannot be extracted", dependency);
                return None;
            }
        };
        if parts.next().is_some() {
            log::error!(target: "license::unknown", "Version of {} cannot be extracted", dependency);
            return None;
        }
        Some(ModuleId::new(group, name, version))
    }

    /// Coordinate for an npm package: scoped packages keep their scope as the
    /// group (`@scope/name` -> `@scope:name:version`), unscoped packages are
    /// grouped under `@npm` (`name` -> `@npm:name:version`).
    pub fn npm(package_name: &str, version: &str) -> ModuleId {
        if let Some(rest) = package_name.strip_prefix('@') {
            if let Some((scope, name)) = rest.split_once('/') {
                return ModuleId::new(format!("@{}", scope), name, version);
            }
        }
        ModuleId::new("@npm", package_name, version)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}
