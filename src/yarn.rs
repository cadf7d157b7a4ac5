//! YAML-lockfile walker for the yarn ecosystem. The lockfile maps one or more
//! comma-separated alias specifiers to a resolution record; the closure is
//! computed strictly: a declared specifier missing from the index fails the
//! whole operation, because this lockfile format guarantees completeness.

use std::collections::{ BTreeMap, HashMap };
use std::fs;
use std::path::{ Path, PathBuf };

use thiserror::Error;

use crate::coordinate::ModuleId;
use crate::npm::NpmPackage;
use crate::record::LicenseRecord;
use crate::tree::{ Artifact, ArtifactKind, ModuleDependencies };

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("failed to read {}", .path.display())] Io {
        path: PathBuf,
        #[source] source: std::io::Error,
    },
    #[error("failed to parse {}", .path.display())] Yaml {
        path: PathBuf,
        #[source] source: serde_yaml::Error,
    },
    #[error("failed to parse {}", .path.display())] Json {
        path: PathBuf,
        #[source] source: serde_json::Error,
    },
    #[error("'{0}' could not be resolved in the lockfile")] UnresolvedSpecifier(String),
}

/// One resolution record: the resolved version plus the nested dependency
/// ranges. Read-only after parse.
#[derive(Debug, Clone, PartialEq)]
pub struct YarnLockEntry {
    pub version: String,
    pub dependencies: BTreeMap<String, String>,
}

/// Index from alias specifier (`name@npm:range`) to resolution record.
#[derive(Debug, Clone, Default)]
pub struct YarnLock {
    entries: HashMap<String, YarnLockEntry>,
}

impl YarnLock {
    pub fn parse(path: &Path) -> Result<YarnLock, LockfileError> {
        let content = fs::read_to_string(path).map_err(|source| LockfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml
            ::from_str(&content)
            .map_err(|source| LockfileError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;

        let mut entries = HashMap::new();
        for (key, value) in raw {
            // the __metadata block is bookkeeping, not a resolution
            if key.starts_with("__") {
                continue;
            }
            let version = match value.get("version") {
                Some(version) => yaml_to_string(version),
                None => {
                    log::debug!(target: "yarn", "lockfile entry '{}' has no version, skipping", key);
                    continue;
                }
            };
            let dependencies = value
                .get("dependencies")
                .and_then(|deps| deps.as_mapping())
                .map(|mapping| {
                    mapping
                        .iter()
                        .filter_map(|(name, range)| {
                            name.as_str().map(|name| (name.to_string(), yaml_to_string(range)))
                        })
                        .collect()
                })
                .unwrap_or_default();

            let entry = YarnLockEntry { version, dependencies };
            for alias in key.split(", ") {
                entries.insert(alias.to_string(), entry.clone());
            }
        }
        Ok(YarnLock { entries })
    }

    pub fn get(&self, specifier: &str) -> Option<&YarnLockEntry> {
        self.entries.get(specifier)
    }
}

fn yaml_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(text) => text.clone(),
        serde_yaml::Value::Number(number) => number.to_string(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

/// Resolve the module's declared dependencies against the lockfile into
/// trail-annotated artifacts, split by scope.
pub fn parse_npm_module(
    package_json: &Path,
    yarn_lock: &Path
) -> Result<ModuleDependencies, LockfileError> {
    let package = read_package(package_json)?;
    let lock = YarnLock::parse(yarn_lock)?;

    let mut result = ModuleDependencies::default();
    add_dependencies(&package.dependencies, &lock, &mut result.compile)?;
    add_dependencies(&package.dev_dependencies, &lock, &mut result.development)?;
    Ok(result)
}

/// One resolved node module, without provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeModule {
    pub name: String,
    pub version: String,
}

/// License extraction is not implemented for this lockfile format: every
/// record carries an empty license list. The enumeration itself is complete.
pub fn find_npm_packages(
    package_json: &Path,
    yarn_lock: &Path
) -> Result<Vec<LicenseRecord>, LockfileError> {
    let package = read_package(package_json)?;
    let lock = YarnLock::parse(yarn_lock)?;

    let mut modules = Vec::new();
    for (name, range) in &package.dependencies {
        add_module(name, range, &lock, &mut modules)?;
    }

    Ok(
        modules
            .into_iter()
            .map(|module| {
                LicenseRecord {
                    dependency: ModuleId::npm(&module.name, &module.version).to_string(),
                    version: module.version,
                    project: module.name,
                    description: None,
                    url: None,
                    year: None,
                    licenses: Vec::new(),
                    developers: Vec::new(),
                }
            })
            .collect()
    )
}

fn read_package(path: &Path) -> Result<NpmPackage, LockfileError> {
    let content = fs::read_to_string(path).map_err(|source| LockfileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LockfileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Candidate lockfile key for a declared dependency: the range is normalized
/// to the `npm:` protocol unless it already carries one.
fn specifier(package_name: &str, declared_version: &str) -> String {
    if declared_version.starts_with("npm:") {
        format!("{}@{}", package_name, declared_version)
    } else {
        format!("{}@npm:{}", package_name, declared_version)
    }
}

fn add_dependencies(
    declared: &BTreeMap<String, String>,
    lock: &YarnLock,
    result: &mut Vec<Artifact>
) -> Result<(), LockfileError> {
    for (name, range) in declared {
        add_artifact(name, range, lock, result, Vec::new())?;
    }
    Ok(())
}

fn add_artifact(
    package_name: &str,
    declared_version: &str,
    lock: &YarnLock,
    result: &mut Vec<Artifact>,
    trail: Vec<String>
) -> Result<(), LockfileError> {
    let specifier = specifier(package_name, declared_version);
    let entry = lock
        .get(&specifier)
        .ok_or_else(|| LockfileError::UnresolvedSpecifier(specifier.clone()))?;

    let gav = ModuleId::npm(package_name, &entry.version).to_string();
    if result.iter().any(|artifact| artifact.artifact == gav) {
        return Ok(());
    }
    result.push(Artifact::new(gav.clone(), ArtifactKind::Npm, trail.clone()));

    for (nested_name, nested_range) in &entry.dependencies {
        let mut sub_trail = trail.clone();
        sub_trail.push(gav.clone());
        add_artifact(nested_name, nested_range, lock, result, sub_trail)?;
    }
    Ok(())
}

fn add_module(
    package_name: &str,
    declared_version: &str,
    lock: &YarnLock,
    result: &mut Vec<NodeModule>
) -> Result<(), LockfileError> {
    let specifier = specifier(package_name, declared_version);
    let entry = lock
        .get(&specifier)
        .ok_or_else(|| LockfileError::UnresolvedSpecifier(specifier.clone()))?;

    if result.iter().any(|module| module.name == package_name) {
        return Ok(());
    }
    result.push(NodeModule {
        name: package_name.to_string(),
        version: entry.version.clone(),
    });

    for (nested_name, nested_range) in &entry.dependencies {
        add_module(nested_name, nested_range, lock, result)?;
    }
    Ok(())
}
