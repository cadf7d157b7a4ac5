//! Flat-lockfile walker for the npm ecosystem: computes the transitive
//! closure of a module's `package-lock.json`, reads the installed packages'
//! manifests for license information, and derives provenance trails.
//!
//! Gaps in the installed tree (missing `node_modules` directories, broken
//! manifests) are logged and skipped per node; the walk always continues for
//! the siblings.

use std::collections::{ BTreeMap, HashSet, VecDeque };
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::coordinate::ModuleId;
use crate::licenses::Licenses;
use crate::record::{ LicenseEntry, LicenseRecord };
use crate::tree::{ Artifact, ArtifactKind, ModuleDependencies };

pub const PACKAGE_JSON: &str = "package.json";
pub const PACKAGE_LOCK_JSON: &str = "package-lock.json";

const NODE_MODULES: &str = "node_modules";

/// package.json documents in this ecosystem never carry license URLs, and
/// most packages use MIT, so the bare tag gets the canonical URL.
const MIT_DEFAULT_URL: &str = "https://opensource.org/licenses/MIT";

/// `author`/`contributors` appear both as `"Name <mail> (url)"` strings and
/// as objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PersonField {
    Text(String),
    Object {
        name: String,
    },
}

impl PersonField {
    fn name(&self) -> String {
        match self {
            PersonField::Object { name } => name.trim().to_string(),
            PersonField::Text(text) => {
                let name = text
                    .split(|c| c == '<' || c == '(')
                    .next()
                    .unwrap_or(text);
                name.trim().to_string()
            }
        }
    }
}

/// Old manifests publish `license` as `{ "type": ..., "url": ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LicenseField {
    Text(String),
    Object {
        #[serde(rename = "type")]
        kind: String,
    },
}

impl LicenseField {
    fn as_str(&self) -> &str {
        match self {
            LicenseField::Text(text) => text,
            LicenseField::Object { kind } => kind,
        }
    }
}

/// The slice of package.json this engine needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NpmPackage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    license: Option<LicenseField>,
    #[serde(default)]
    author: Option<PersonField>,
    #[serde(default)]
    contributors: Vec<PersonField>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(rename = "devDependencies", default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl NpmPackage {
    pub fn read_from_file(path: &Path) -> anyhow::Result<NpmPackage> {
        let content = fs
            ::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json
            ::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn license(&self) -> Option<&str> {
        self.license.as_ref().map(|license| license.as_str())
    }
}

/// One resolution entry of the flat lockfile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NpmDependency {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dev: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub requires: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NpmPackageLock {
    #[serde(default)]
    pub dependencies: BTreeMap<String, NpmDependency>,
}

impl NpmPackageLock {
    pub fn read_from_file(path: &Path) -> anyhow::Result<NpmPackageLock> {
        let content = fs
            ::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json
            ::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Walk the lockfile closure reachable from the module's direct non-dev
/// dependencies and produce one license record per installed package.
pub fn find_npm_packages(
    package_lock_file: &Path,
    licenses: &Licenses
) -> anyhow::Result<Vec<LicenseRecord>> {
    let package_lock = NpmPackageLock::read_from_file(package_lock_file)?;
    let module_dir = package_lock_file.parent().unwrap_or_else(|| Path::new("."));

    let roots: Vec<String> = match NpmPackage::read_from_file(&module_dir.join(PACKAGE_JSON)) {
        Ok(package) => package.dependencies.keys().cloned().collect(),
        Err(_) => {
            // no manifest next to the lockfile, fall back to its non-dev entries
            log::debug!(
                target: "npm",
                "{} has no readable {}, starting from the lockfile roots",
                module_dir.display(),
                PACKAGE_JSON
            );
            package_lock.dependencies
                .iter()
                .filter(|(_, dependency)| !dependency.dev)
                .map(|(name, _)| name.clone())
                .collect()
        }
    };

    let mut records = Vec::new();
    let mut visited: HashSet<ModuleId> = HashSet::new();
    let mut queue: VecDeque<String> = roots.into_iter().collect();

    while let Some(module_name) = queue.pop_front() {
        let entry = match package_lock.dependencies.get(&module_name) {
            Some(entry) => entry,
            None => {
                // happens when modules have subdependencies that are not
                // tracked down to the root dependencies
                log::warn!(
                    target: "npm",
                    "'{}' is not tracked in {}",
                    module_name,
                    package_lock_file.display()
                );
                continue;
            }
        };

        let identifier = ModuleId::npm(&module_name, &entry.version);
        if !visited.insert(identifier.clone()) {
            continue;
        }

        let install_dir = module_dir.join(NODE_MODULES).join(&module_name);
        if !install_dir.exists() {
            if entry.optional {
                log::debug!(
                    target: "npm",
                    "optional module '{}' is not installed, skipping",
                    module_name
                );
                continue;
            }
            log::error!(
                target: "npm",
                "{} does not exist, license can't be parsed",
                install_dir.display()
            );
        } else {
            let manifest = install_dir.join(PACKAGE_JSON);
            if !manifest.exists() {
                log::warn!(
                    target: "npm",
                    "{} does not exist, license can't be parsed",
                    manifest.display()
                );
            } else {
                match NpmPackage::read_from_file(&manifest) {
                    Ok(package) => {
                        records.push(to_record(&identifier, entry, &package, licenses));
                    }
                    Err(err) => {
                        // there are lots of broken manifests out there, keep
                        // the details out of the main log
                        log::error!(
                            target: "npm",
                            "Error while analyzing license of {}, see debug for more details",
                            module_name
                        );
                        log::debug!(target: "npm", "Error while parsing {}: {:#}", manifest.display(), err);
                    }
                }
            }
        }

        for nested in entry.requires.keys() {
            queue.push_back(nested.clone());
        }
    }

    Ok(records)
}

fn to_record(
    identifier: &ModuleId,
    entry: &NpmDependency,
    package: &NpmPackage,
    licenses: &Licenses
) -> LicenseRecord {
    let project = if package.name.is_empty() {
        identifier.name.clone()
    } else {
        package.name.clone()
    };
    let version = if package.version.is_empty() {
        entry.version.clone()
    } else {
        package.version.clone()
    };

    LicenseRecord {
        dependency: identifier.to_string(),
        version,
        project,
        description: package.description.clone(),
        url: package.homepage.clone(),
        year: None,
        licenses: find_license(package, identifier, licenses),
        developers: find_developers(package),
    }
}

fn find_license(
    package: &NpmPackage,
    identifier: &ModuleId,
    licenses: &Licenses
) -> Vec<LicenseEntry> {
    match package.license() {
        None => Vec::new(),
        Some(license) => {
            let url = if license == "MIT" { Some(MIT_DEFAULT_URL) } else { None };
            vec![licenses.license(identifier, license, url, false)]
        }
    }
}

fn find_developers(package: &NpmPackage) -> Vec<String> {
    let mut developers = Vec::new();
    if let Some(author) = &package.author {
        developers.push(author.name());
    }
    for contributor in &package.contributors {
        let name = contributor.name();
        if !developers.contains(&name) {
            developers.push(name);
        }
    }
    developers
}

/// Turn every lockfile entry into a trail-annotated artifact, split into
/// compile and development dependencies.
pub fn parse_npm_module(
    package_json: &Path,
    package_lock_json: &Path
) -> anyhow::Result<ModuleDependencies> {
    let package = NpmPackage::read_from_file(package_json)?;
    let package_lock = NpmPackageLock::read_from_file(package_lock_json)?;

    let compile_roots: Vec<&str> = package.dependencies.keys().map(String::as_str).collect();
    let development_roots: Vec<&str> = package.dev_dependencies
        .keys()
        .map(String::as_str)
        .collect();

    let mut result = ModuleDependencies::default();
    for (module_name, entry) in &package_lock.dependencies {
        let gav = ModuleId::npm(module_name, &entry.version).to_string();
        let roots = if entry.dev { &development_roots } else { &compile_roots };
        let trail = collect_trail(Vec::new(), module_name, roots, &package_lock).unwrap_or_default();

        let artifact = Artifact::new(gav, ArtifactKind::Npm, trail);
        if entry.dev {
            result.development.push(artifact);
        } else {
            result.compile.push(artifact);
        }
    }
    Ok(result)
}

/// Depth-first search for a path from the module's declared dependencies down
/// to `module`, following the lockfile `requires` maps. The trail itself
/// doubles as the cycle guard.
fn collect_trail(
    trail: Vec<String>,
    module: &str,
    possible_paths: &[&str],
    package_lock: &NpmPackageLock
) -> Option<Vec<String>> {
    if possible_paths.iter().any(|path| *path == module) {
        return Some(trail);
    }
    for possible_path in possible_paths {
        if trail.iter().any(|step| step == possible_path) {
            continue;
        }
        if let Some(dependency) = package_lock.dependencies.get(*possible_path) {
            let mut sub_trail = trail.clone();
            sub_trail.push(possible_path.to_string());
            let nested: Vec<&str> = dependency.requires.keys().map(String::as_str).collect();
            if let Some(found) = collect_trail(sub_trail, module, &nested, package_lock) {
                return Some(found);
            }
        }
    }
    None
}
