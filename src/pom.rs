//! Metadata-chain resolution over POM-style XML documents. Missing fields are
//! filled in by lazily walking the parent chain; parent documents are fetched
//! through the injected [`PomResolver`] so the engine never touches a
//! repository itself.

use std::fs;
use std::path::{ Path, PathBuf };

use thiserror::Error;

use crate::coordinate::ModuleId;
use crate::licenses::Licenses;
use crate::record::LicenseEntry;

/// Locates the metadata document for a coordinate, or `None` if the
/// collaborator cannot resolve it.
pub trait PomResolver {
    fn resolve(&self, identifier: &ModuleId) -> Option<PathBuf>;
}

#[derive(Debug, Error)]
pub enum PomError {
    #[error("failed to read {}", .path.display())] Io {
        path: PathBuf,
        #[source] source: std::io::Error,
    },
    #[error("failed to parse {}", .path.display())] Xml {
        path: PathBuf,
        #[source] source: roxmltree::Error,
    },
    #[error("'{0}' declares more than one parent")] MultipleParents(ModuleId),
}

/// Parsed representation of one metadata document. Owned by a single
/// resolution call; chains are re-walked per field and never cached across
/// packages.
#[derive(Debug, Clone)]
pub struct PomFile {
    identifier: ModuleId,
    name: String,
    artifact_id: String,
    group_id: String,
    version: String,
    description: String,
    url: String,
    inception_year: String,
    organization_name: Option<String>,
    licenses: Vec<(String, Option<String>)>,
    developers: Vec<String>,
    parents: Vec<ModuleId>,
}

impl PomFile {
    #[allow(dead_code)]
    pub fn identifier(&self) -> &ModuleId {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    /// The locally declared group id; may be empty when inherited.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn inception_year(&self) -> &str {
        &self.inception_year
    }

    pub fn parents(&self) -> &[ModuleId] {
        &self.parents
    }
}

pub struct PomParser<R: PomResolver> {
    resolver: R,
}

impl<R: PomResolver> PomParser<R> {
    pub fn new(resolver: R) -> Self {
        PomParser { resolver }
    }

    pub fn parse(&self, identifier: &ModuleId, file: &Path) -> Result<PomFile, PomError> {
        let content = fs::read_to_string(file).map_err(|source| PomError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        let document = roxmltree::Document::parse(&content).map_err(|source| PomError::Xml {
            path: file.to_path_buf(),
            source,
        })?;
        let project = document.root_element();

        let licenses = project
            .children()
            .filter(|node| is_element_named(node, "licenses"))
            .flat_map(|node| node.children().filter(|child| is_element_named(child, "license")))
            .map(|license| {
                let url = child_text(&license, "url");
                (child_text(&license, "name"), if url.is_empty() { None } else { Some(url) })
            })
            .collect();

        let developers = project
            .children()
            .filter(|node| is_element_named(node, "developers"))
            .flat_map(|node| node.children().filter(|child| is_element_named(child, "developer")))
            .map(|developer| child_text(&developer, "name"))
            .collect();

        let parents = project
            .children()
            .filter(|node| is_element_named(node, "parent"))
            .map(|parent| {
                ModuleId::new(
                    child_text(&parent, "groupId"),
                    child_text(&parent, "artifactId"),
                    child_text(&parent, "version")
                )
            })
            .collect();

        let organization_name = project
            .children()
            .find(|node| is_element_named(node, "organization"))
            .map(|organization| child_text(&organization, "name"))
            .filter(|name| !name.is_empty());

        Ok(PomFile {
            identifier: identifier.clone(),
            name: child_text(&project, "name"),
            artifact_id: child_text(&project, "artifactId"),
            group_id: child_text(&project, "groupId"),
            version: child_text(&project, "version"),
            description: child_text(&project, "description"),
            url: child_text(&project, "url"),
            inception_year: child_text(&project, "inceptionYear"),
            organization_name,
            licenses,
            developers,
            parents,
        })
    }

    /// The locally declared version, or the closest ancestor's. A broken
    /// chain resolves to an empty string, not an error.
    pub fn find_version(&self, pom: &PomFile) -> Result<String, PomError> {
        if !pom.version.is_empty() {
            return Ok(pom.version.clone());
        }
        match self.parent_pom(pom)? {
            Some(parent) => self.find_version(&parent),
            None => Ok(String::new()),
        }
    }

    pub fn find_organization_name(&self, pom: &PomFile) -> Result<Option<String>, PomError> {
        if pom.organization_name.is_some() {
            return Ok(pom.organization_name.clone());
        }
        match self.parent_pom(pom)? {
            Some(parent) => self.find_organization_name(&parent),
            None => Ok(None),
        }
    }

    /// All `<license>` entries found on any level of the chain, classified
    /// independently and accumulated in discovery order.
    pub fn find_licenses(
        &self,
        pom: &PomFile,
        licenses: &Licenses
    ) -> Result<Vec<LicenseEntry>, PomError> {
        let mut result: Vec<LicenseEntry> = Vec::new();
        for (name, url) in &pom.licenses {
            let entry = licenses.license(&pom.identifier, name, url.as_deref(), false);
            if !result.contains(&entry) {
                result.push(entry);
            }
        }

        if let Some(parent) = self.parent_pom(pom)? {
            for entry in self.find_licenses(&parent, licenses)? {
                if !result.contains(&entry) {
                    result.push(entry);
                }
            }
        }

        Ok(result)
    }

    pub fn find_developers(&self, pom: &PomFile) -> Result<Vec<String>, PomError> {
        let mut result: Vec<String> = pom.developers.clone();

        if let Some(parent) = self.parent_pom(pom)? {
            for developer in self.find_developers(&parent)? {
                if !result.contains(&developer) {
                    result.push(developer);
                }
            }
        }

        Ok(result)
    }

    /// Resolve and parse the single declared parent. An unresolvable parent
    /// ends the chain with an error log; more than one parent reference is a
    /// configuration error.
    fn parent_pom(&self, pom: &PomFile) -> Result<Option<PomFile>, PomError> {
        if pom.parents.len() > 1 {
            return Err(PomError::MultipleParents(pom.identifier.clone()));
        }
        let parent_id = match pom.parents.first() {
            Some(parent_id) => parent_id,
            None => {
                return Ok(None);
            }
        };

        let file = match self.resolver.resolve(parent_id) {
            Some(file) => file,
            None => {
                log::error!(
                    target: "pom",
                    "parent '{}' of artifact '{}' cannot be resolved",
                    parent_id,
                    pom.identifier
                );
                return Ok(None);
            }
        };

        match self.parse(parent_id, &file) {
            Ok(parent) => Ok(Some(parent)),
            Err(err) => {
                log::error!(
                    target: "pom",
                    "parent '{}' of artifact '{}' cannot be parsed: {}",
                    parent_id,
                    pom.identifier,
                    err
                );
                Ok(None)
            }
        }
    }
}

/// Tag comparison by local name, so namespaced and plain documents parse the
/// same way.
fn is_element_named(node: &roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child_text(node: &roxmltree::Node<'_, '_>, name: &str) -> String {
    node.children()
        .find(|child| is_element_named(child, name))
        .and_then(|child| child.text())
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    /// Resolves `<artifactId>-<version>.pom` inside a fixture directory.
    struct DirResolver {
        dir: PathBuf,
    }

    impl PomResolver for DirResolver {
        fn resolve(&self, identifier: &ModuleId) -> Option<PathBuf> {
            let file = self.dir.join(format!("{}-{}.pom", identifier.name, identifier.version));
            if file.exists() {
                Some(file)
            } else {
                None
            }
        }
    }

    fn write_pom(dir: &Path, file_name: &str, content: &str) -> PathBuf {
        let path = dir.join(file_name);
        fs::write(&path, content).unwrap();
        path
    }

    fn parser(dir: &Path) -> PomParser<DirResolver> {
        PomParser::new(DirResolver { dir: dir.to_path_buf() })
    }

    #[test]
    fn parses_local_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pom(
            dir.path(),
            "spring-boot-2.3.0.pom",
            r#"<project>
                <artifactId>spring-boot</artifactId>
                <name>spring-boot</name>
                <version>2.3.0</version>
                <url>https://spring.io/projects/spring-boot</url>
                <inceptionYear>2014</inceptionYear>
                <organization><name>Pivotal Software, Inc.</name></organization>
            </project>"#
        );

        let parser = parser(dir.path());
        let id = ModuleId::new("org.springframework.boot", "spring-boot", "2.3.0");
        let pom = parser.parse(&id, &path).unwrap();

        assert_eq!(pom.name(), "spring-boot");
        assert_eq!(pom.url(), "https://spring.io/projects/spring-boot");
        assert_eq!(pom.inception_year(), "2014");
        assert_eq!(
            parser.find_organization_name(&pom).unwrap().as_deref(),
            Some("Pivotal Software, Inc.")
        );
    }

    #[test]
    fn resolves_fields_through_the_parent_chain() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "jackson-base-2.11.3.pom",
            r#"<project>
                <artifactId>jackson-base</artifactId>
                <version>2.11.3</version>
                <organization><name>FasterXML</name></organization>
                <licenses><license>
                    <name>Apache License, Version 2.0</name>
                    <url>http://www.apache.org/licenses/LICENSE-2.0.txt</url>
                </license></licenses>
                <developers><developer><name>Tatu Saloranta</name></developer></developers>
            </project>"#
        );
        let path = write_pom(
            dir.path(),
            "jackson-core-2.11.3.pom",
            r#"<project>
                <parent>
                    <groupId>com.fasterxml.jackson</groupId>
                    <artifactId>jackson-base</artifactId>
                    <version>2.11.3</version>
                </parent>
                <artifactId>jackson-core</artifactId>
                <name>Jackson-core</name>
                <developers><developer><name>Another Developer</name></developer></developers>
            </project>"#
        );

        let parser = parser(dir.path());
        let id = ModuleId::new("com.fasterxml.jackson.core", "jackson-core", "2.11.3");
        let pom = parser.parse(&id, &path).unwrap();

        assert_eq!(pom.name(), "Jackson-core");
        assert_eq!(parser.find_version(&pom).unwrap(), "2.11.3");
        assert_eq!(parser.find_organization_name(&pom).unwrap().as_deref(), Some("FasterXML"));

        let licenses = parser.find_licenses(&pom, &Licenses::builtin().unwrap()).unwrap();
        assert_eq!(licenses.len(), 1);
        assert_eq!(licenses[0].license_id.as_deref(), Some("Apache-2.0"));

        let developers = parser.find_developers(&pom).unwrap();
        assert_eq!(developers, vec!["Another Developer".to_string(), "Tatu Saloranta".to_string()]);
    }

    #[test]
    fn version_comes_from_the_deepest_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "grandparent-3.pom",
            r#"<project><artifactId>grandparent</artifactId><version>3</version></project>"#
        );
        write_pom(
            dir.path(),
            "parent-2.pom",
            r#"<project>
                <parent>
                    <groupId>g</groupId><artifactId>grandparent</artifactId><version>3</version>
                </parent>
                <artifactId>parent</artifactId>
            </project>"#
        );
        let path = write_pom(
            dir.path(),
            "child-1.pom",
            r#"<project>
                <parent>
                    <groupId>g</groupId><artifactId>parent</artifactId><version>2</version>
                </parent>
                <artifactId>child</artifactId>
            </project>"#
        );

        let parser = parser(dir.path());
        let pom = parser.parse(&ModuleId::new("g", "child", "1"), &path).unwrap();
        assert_eq!(parser.find_version(&pom).unwrap(), "3");
    }

    #[test]
    fn broken_chain_yields_empty_version() {
        let dir = tempfile::tempdir().unwrap();
        // the declared parent file does not exist
        let path = write_pom(
            dir.path(),
            "child-1.pom",
            r#"<project>
                <parent>
                    <groupId>g</groupId><artifactId>missing</artifactId><version>9</version>
                </parent>
                <artifactId>child</artifactId>
            </project>"#
        );

        let parser = parser(dir.path());
        let pom = parser.parse(&ModuleId::new("g", "child", "1"), &path).unwrap();
        assert_eq!(parser.find_version(&pom).unwrap(), "");
        assert_eq!(
            parser.find_licenses(&pom, &Licenses::builtin().unwrap()).unwrap(),
            Vec::new()
        );
    }

    #[test]
    fn multiple_parents_are_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pom(
            dir.path(),
            "child-1.pom",
            r#"<project>
                <parent>
                    <groupId>g</groupId><artifactId>a</artifactId><version>1</version>
                </parent>
                <parent>
                    <groupId>g</groupId><artifactId>b</artifactId><version>1</version>
                </parent>
                <artifactId>child</artifactId>
            </project>"#
        );

        let parser = parser(dir.path());
        let pom = parser.parse(&ModuleId::new("g", "child", "1"), &path).unwrap();
        assert!(matches!(parser.find_version(&pom), Err(PomError::MultipleParents(_))));
    }

    #[test]
    fn namespaced_documents_parse_the_same_way() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pom(
            dir.path(),
            "lib-1.0.pom",
            r#"<project xmlns="http://maven.apache.org/POM/4.0.0">
                <artifactId>lib</artifactId>
                <version>1.0</version>
                <licenses><license><name>Apache-2.0</name></license></licenses>
            </project>"#
        );

        let parser = parser(dir.path());
        let pom = parser.parse(&ModuleId::new("g", "lib", "1.0"), &path).unwrap();
        assert_eq!(pom.artifact_id(), "lib");
        assert_eq!(parser.find_version(&pom).unwrap(), "1.0");
        let licenses = parser.find_licenses(&pom, &Licenses::builtin().unwrap()).unwrap();
        assert_eq!(licenses[0].license_id.as_deref(), Some("Apache-2.0"));
    }

    #[test]
    fn licenses_accumulate_across_levels() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "parent-1.pom",
            r#"<project>
                <artifactId>parent</artifactId><version>1</version>
                <licenses><license><name>MIT</name></license></licenses>
            </project>"#
        );
        let path = write_pom(
            dir.path(),
            "child-1.pom",
            r#"<project>
                <parent>
                    <groupId>g</groupId><artifactId>parent</artifactId><version>1</version>
                </parent>
                <artifactId>child</artifactId>
                <licenses><license><name>Apache-2.0</name></license></licenses>
            </project>"#
        );

        let parser = parser(dir.path());
        let pom = parser.parse(&ModuleId::new("g", "child", "1"), &path).unwrap();
        let licenses = parser.find_licenses(&pom, &Licenses::builtin().unwrap()).unwrap();

        let ids: Vec<_> = licenses
            .iter()
            .map(|entry| entry.license_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["Apache-2.0", "MIT"]);
    }
}
