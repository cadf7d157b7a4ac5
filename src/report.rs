//! Builds the license report for one module: merges previously generated
//! sibling-module reports, metadata-chain resolution, the flat-lockfile
//! walker and the override fallback into one sorted record list.

use std::path::{ Path, PathBuf };

use crate::coordinate::ModuleId;
use crate::licenses::{ self, Licenses, PREFERRED_LICENSE_IDS };
use crate::npm;
use crate::overrides::OverrideTable;
use crate::pom::{ PomError, PomFile, PomParser, PomResolver };
use crate::record::{ dedup_licenses, read_records, LicenseEntry, LicenseRecord };
use crate::yarn;

/// Locates the local companion file of a given kind (e.g. `pom`) for a
/// coordinate, or `None` if the artifact cannot be resolved.
pub trait ArtifactFileResolver {
    fn resolve(&self, identifier: &ModuleId, kind: &str) -> Option<PathBuf>;
}

pub struct LicenseReportBuilder<'a, R: PomResolver> {
    licenses: &'a Licenses,
    overrides: &'a OverrideTable,
    artifact_resolver: &'a dyn ArtifactFileResolver,
    pom_parser: &'a PomParser<R>,
}

impl<'a, R: PomResolver> LicenseReportBuilder<'a, R> {
    pub fn new(
        licenses: &'a Licenses,
        overrides: &'a OverrideTable,
        artifact_resolver: &'a dyn ArtifactFileResolver,
        pom_parser: &'a PomParser<R>
    ) -> Self {
        LicenseReportBuilder {
            licenses,
            overrides,
            artifact_resolver,
            pom_parser,
        }
    }

    /// Resolve every dependency into a license record. Coordinates already
    /// covered by a sibling-module report are not re-resolved; whatever is
    /// left unresolved at the end is logged and omitted.
    pub fn build(
        &self,
        dependencies: &[ModuleId],
        module_reports: &[PathBuf],
        package_lock: Option<&Path>,
        yarn_module: Option<(&Path, &Path)>
    ) -> anyhow::Result<Vec<LicenseRecord>> {
        let mut remaining: Vec<ModuleId> = dependencies.to_vec();
        let mut records: Vec<LicenseRecord> = Vec::new();

        for report in module_reports {
            match read_records(report) {
                Ok(sibling_records) => {
                    for record in sibling_records {
                        if let Some(identifier) = ModuleId::parse(&record.dependency) {
                            remaining.retain(|id| *id != identifier);
                        }
                        if !records.iter().any(|r| r.dependency == record.dependency) {
                            records.push(record);
                        }
                    }
                }
                Err(err) => {
                    log::debug!(
                        target: "report",
                        "Could not parse {}, transitive license information cannot be fetched: {:#}",
                        report.display(),
                        err
                    );
                }
            }
        }

        for identifier in std::mem::take(&mut remaining) {
            let pom_file = self.artifact_resolver.resolve(&identifier, "pom");
            let parsed = pom_file.and_then(|file| {
                match self.pom_parser.parse(&identifier, &file) {
                    Ok(pom) => Some(pom),
                    Err(err) => {
                        log::error!(target: "report", "cannot parse metadata of '{}': {}", identifier, err);
                        None
                    }
                }
            });
            match parsed {
                Some(pom) => records.push(self.pom_record(&identifier, &pom)?),
                None => remaining.push(identifier),
            }
        }

        if let Some(package_lock) = package_lock {
            records.extend(npm::find_npm_packages(package_lock, self.licenses)?);
        }

        if let Some((package_json, yarn_lock)) = yarn_module {
            records.extend(yarn::find_npm_packages(package_json, yarn_lock)?);
        }

        for identifier in std::mem::take(&mut remaining) {
            match self.overrides.fallback_record(&identifier) {
                Some(record) => records.push(record),
                None => remaining.push(identifier),
            }
        }

        // everything still here could not be resolved via any variant
        for identifier in &remaining {
            licenses::log_missing_license(identifier);
        }

        for record in &mut records {
            record.licenses = dedup_licenses(std::mem::take(&mut record.licenses));
        }
        records.sort_by(|a, b| a.project.cmp(&b.project));
        Ok(records)
    }

    fn pom_record(
        &self,
        identifier: &ModuleId,
        pom: &PomFile
    ) -> Result<LicenseRecord, PomError> {
        let name = pom.name();
        let project = if name.is_empty() { pom.artifact_id() } else { name };

        Ok(LicenseRecord {
            dependency: identifier.to_string(),
            version: self.pom_parser.find_version(pom)?,
            project: project.to_string(),
            description: none_if_empty(pom.description()),
            url: none_if_empty(pom.url()),
            year: none_if_empty(pom.inception_year()),
            licenses: self.extract_licenses(identifier, pom)?,
            developers: self.pom_parser.find_developers(pom)?,
        })
    }

    /// Override table first, then the metadata chain with the multi-license
    /// tie-break applied.
    fn extract_licenses(
        &self,
        identifier: &ModuleId,
        pom: &PomFile
    ) -> Result<Vec<LicenseEntry>, PomError> {
        if let Some(entry) = self.overrides.get(identifier) {
            return Ok(vec![entry.clone()]);
        }

        let found = self.pom_parser.find_licenses(pom, self.licenses)?;
        if found.is_empty() {
            licenses::log_missing_license(identifier);
            return Ok(found);
        }
        if found.len() > 1 {
            if
                let Some(chosen) = Licenses::choose_preferred(
                    &found,
                    PREFERRED_LICENSE_IDS,
                    pom.artifact_id()
                )
            {
                return Ok(vec![chosen]);
            }
            licenses::log_multiple_licenses(identifier, &found);
        }
        Ok(found)
    }
}

fn none_if_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::record::write_records;

    /// Resolves both artifacts and parent metadata out of one fixture
    /// directory of `<name>-<version>.pom` files.
    struct DirResolver {
        dir: PathBuf,
    }

    impl PomResolver for DirResolver {
        fn resolve(&self, identifier: &ModuleId) -> Option<PathBuf> {
            let file = self.dir.join(format!("{}-{}.pom", identifier.name, identifier.version));
            file.exists().then_some(file)
        }
    }

    impl ArtifactFileResolver for DirResolver {
        fn resolve(&self, identifier: &ModuleId, _kind: &str) -> Option<PathBuf> {
            PomResolver::resolve(self, identifier)
        }
    }

    fn write_pom(dir: &Path, file_name: &str, content: &str) {
        fs::write(dir.join(file_name), content).unwrap();
    }

    #[test]
    fn builds_records_from_poms_with_overrides_and_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "lib-1.0.pom",
            r#"<project>
                <artifactId>lib</artifactId>
                <name>A Library</name>
                <version>1.0</version>
                <description>does things</description>
                <licenses>
                    <license><name>Apache-2.0</name></license>
                    <license><name>MIT</name></license>
                </licenses>
            </project>"#
        );

        let licenses = Licenses::builtin().unwrap();
        let overrides = OverrideTable::from_definitions(
            &[crate::overrides::LicenseDefinition {
                artifact: "g:unresolved:2.0".to_string(),
                license: None,
                license_id: Some("MIT".to_string()),
                license_url: None,
            }],
            &licenses
        ).unwrap();
        let resolver = DirResolver { dir: dir.path().to_path_buf() };
        let pom_parser = PomParser::new(DirResolver { dir: dir.path().to_path_buf() });
        let builder = LicenseReportBuilder::new(&licenses, &overrides, &resolver, &pom_parser);

        let dependencies = vec![
            ModuleId::new("g", "lib", "1.0"),
            ModuleId::new("g", "unresolved", "2.0"),
            ModuleId::new("g", "gone", "3.0")
        ];
        let records = builder.build(&dependencies, &[], None, None).unwrap();

        assert_eq!(records.len(), 2);

        let lib = records.iter().find(|r| r.project == "A Library").unwrap();
        assert_eq!(lib.version, "1.0");
        assert_eq!(lib.description.as_deref(), Some("does things"));
        // MIT is preferred over Apache-2.0, the set collapses to one entry
        assert_eq!(lib.licenses.len(), 1);
        assert_eq!(lib.licenses[0].license_id.as_deref(), Some("MIT"));

        let fallback = records.iter().find(|r| r.project == "g:unresolved").unwrap();
        assert_eq!(fallback.licenses[0].license_id.as_deref(), Some("MIT"));
    }

    #[test]
    fn override_replaces_the_chain_for_the_license_field_only() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "lib-1.0.pom",
            r#"<project>
                <artifactId>lib</artifactId>
                <version>1.0</version>
                <url>https://example.org/lib</url>
                <licenses><license><name>GPL-3.0</name></license></licenses>
            </project>"#
        );

        let licenses = Licenses::builtin().unwrap();
        let overrides = OverrideTable::from_definitions(
            &[crate::overrides::LicenseDefinition {
                artifact: "g:lib:1.0".to_string(),
                license: None,
                license_id: Some("Apache-2.0".to_string()),
                license_url: None,
            }],
            &licenses
        ).unwrap();
        let resolver = DirResolver { dir: dir.path().to_path_buf() };
        let pom_parser = PomParser::new(DirResolver { dir: dir.path().to_path_buf() });
        let builder = LicenseReportBuilder::new(&licenses, &overrides, &resolver, &pom_parser);

        let records = builder
            .build(&[ModuleId::new("g", "lib", "1.0")], &[], None, None)
            .unwrap();

        assert_eq!(records[0].licenses.len(), 1);
        assert_eq!(records[0].licenses[0].license_id.as_deref(), Some("Apache-2.0"));
        // other fields still come from the metadata document
        assert_eq!(records[0].url.as_deref(), Some("https://example.org/lib"));
    }

    #[test]
    fn sibling_reports_are_not_re_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("license-report.json");
        write_records(
            &report_path,
            &[LicenseRecord {
                dependency: "g:sibling:1.0".to_string(),
                version: "1.0".to_string(),
                project: "Sibling".to_string(),
                description: None,
                url: None,
                year: None,
                licenses: vec![LicenseEntry::new("MIT", Some("MIT"), "https://opensource.org/licenses/MIT")],
                developers: vec![],
            }]
        ).unwrap();

        let licenses = Licenses::builtin().unwrap();
        let overrides = OverrideTable::empty();
        let resolver = DirResolver { dir: dir.path().to_path_buf() };
        let pom_parser = PomParser::new(DirResolver { dir: dir.path().to_path_buf() });
        let builder = LicenseReportBuilder::new(&licenses, &overrides, &resolver, &pom_parser);

        // no pom fixture exists for the sibling, so resolution would fail if
        // the report entry did not subsume it
        let records = builder
            .build(&[ModuleId::new("g", "sibling", "1.0")], &[report_path], None, None)
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].project, "Sibling");
    }

    #[test]
    fn records_are_sorted_by_project() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "zeta-1.0.pom",
            r#"<project><artifactId>zeta</artifactId><version>1.0</version></project>"#
        );
        write_pom(
            dir.path(),
            "alpha-1.0.pom",
            r#"<project><artifactId>alpha</artifactId><version>1.0</version></project>"#
        );

        let licenses = Licenses::builtin().unwrap();
        let overrides = OverrideTable::empty();
        let resolver = DirResolver { dir: dir.path().to_path_buf() };
        let pom_parser = PomParser::new(DirResolver { dir: dir.path().to_path_buf() });
        let builder = LicenseReportBuilder::new(&licenses, &overrides, &resolver, &pom_parser);

        let records = builder
            .build(
                &[ModuleId::new("g", "zeta", "1.0"), ModuleId::new("g", "alpha", "1.0")],
                &[],
                None,
                None
            )
            .unwrap();

        let projects: Vec<_> = records.iter().map(|r| r.project.as_str()).collect();
        assert_eq!(projects, vec!["alpha", "zeta"]);
    }
}
