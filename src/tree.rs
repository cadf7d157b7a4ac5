//! Flattens resolved dependency graphs into per-scope artifact lists with
//! provenance trails, and assembles the tracker report that carries them.

use serde::{ Deserialize, Serialize };

use crate::record::LicenseRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Jar,
    Bom,
    Npm,
    Sdk,
}

/// One flattened dependency. `trail` is the ordered list of ancestor
/// coordinates from the scope root down to this artifact's direct parent; an
/// empty trail means the artifact is declared directly in the scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact: String,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    #[serde(default)]
    pub trail: Vec<String>,
}

impl Artifact {
    pub fn new(artifact: impl Into<String>, kind: ArtifactKind, trail: Vec<String>) -> Self {
        Artifact {
            artifact: artifact.into(),
            classifier: None,
            kind,
            trail,
        }
    }
}

/// The dependencies of one JS module, split by scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleDependencies {
    pub compile: Vec<Artifact>,
    pub development: Vec<Artifact>,
}

/// A node of an externally resolved component graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedComponent {
    pub module: String,
    pub dependencies: Vec<ResolvedEdge>,
}

/// One dependency edge. `platform` marks BOM/platform constraints, which are
/// reported with their own artifact kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEdge {
    pub target: ResolvedComponent,
    pub platform: bool,
}

impl ResolvedComponent {
    #[allow(dead_code)] // graph construction helper, used by tests
    pub fn new(module: impl Into<String>) -> Self {
        ResolvedComponent {
            module: module.into(),
            dependencies: Vec::new(),
        }
    }

    #[allow(dead_code)] // graph construction helper, used by tests
    pub fn with_dependency(mut self, target: ResolvedComponent) -> Self {
        self.dependencies.push(ResolvedEdge { target, platform: false });
        self
    }

    #[allow(dead_code)] // graph construction helper, used by tests
    pub fn with_platform_dependency(mut self, target: ResolvedComponent) -> Self {
        self.dependencies.push(ResolvedEdge { target, platform: true });
        self
    }
}

/// Supplies the resolved component graph for a named scope, or `None` when
/// the scope does not exist or cannot be resolved.
pub trait ComponentGraphProvider {
    fn resolve(&self, scope: &str) -> Option<ResolvedComponent>;
}

/// Flatten a resolved graph into a coordinate-unique artifact list.
///
/// Subsumption rule: root-level edges always add or replace their coordinate;
/// a deeper edge only proceeds while its coordinate is new; on a collision the
/// existing artifact is removed and re-inserted with the current, shorter
/// trail, and its children are revisited at that trail.
pub fn collect_artifacts(root: &ResolvedComponent) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    add_children(&mut artifacts, root, &[]);
    artifacts
}

fn add_children(artifacts: &mut Vec<Artifact>, node: &ResolvedComponent, trail: &[String]) {
    for edge in &node.dependencies {
        let module = &edge.target.module;
        let existing = artifacts.iter().position(|artifact| artifact.artifact == *module);

        // root artifacts are always added, deeper ones only when new
        if !trail.is_empty() && existing.is_some() {
            continue;
        }

        let kind = if edge.platform { ArtifactKind::Bom } else { ArtifactKind::Jar };
        let artifact = Artifact::new(module.clone(), kind, trail.to_vec());

        if let Some(position) = existing {
            // keep the shortest observed trail
            artifacts.remove(position);
        }
        artifacts.push(artifact);

        let mut sub_trail = trail.to_vec();
        sub_trail.push(module.clone());
        add_children(artifacts, &edge.target, &sub_trail);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub artifact: String,
    pub packaging: String,
}

/// The merged per-scope view of everything a build depends on, serialized for
/// downstream aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerReport {
    pub build_tool: String,
    pub build_tool_version: String,
    pub project: ProjectInfo,
    #[serde(default)]
    pub compile: Vec<Artifact>,
    #[serde(default)]
    pub runtime: Vec<Artifact>,
    #[serde(default)]
    pub provided: Vec<Artifact>,
    #[serde(default)]
    pub test: Vec<Artifact>,
    #[serde(default)]
    pub development: Vec<Artifact>,
    #[serde(default)]
    pub license_records: Vec<LicenseRecord>,
}

/// Everything the tracker report needs besides the component graphs.
#[derive(Debug, Clone, Default)]
pub struct TrackerReportInputs {
    pub build_tool: String,
    pub build_tool_version: String,
    pub project_artifact: String,
    pub project_packaging: String,
    /// Additional test-suite scope names reported into the test scope.
    pub test_suites: Vec<String>,
    /// JS module dependencies merged into compile/development.
    pub npm_modules: Option<ModuleDependencies>,
    /// Synthetic development entries, e.g. the build tool itself.
    pub development_extras: Vec<Artifact>,
    pub license_records: Vec<LicenseRecord>,
}

pub fn create_tracker_report(
    provider: &dyn ComponentGraphProvider,
    inputs: TrackerReportInputs
) -> TrackerReport {
    let mut compile = collect_scope(provider, "compile");
    let runtime = collect_scope(provider, "runtime");
    let provided = collect_scope(provider, "provided");
    let mut test = collect_scope(provider, "test");
    for suite in &inputs.test_suites {
        test.extend(collect_scope(provider, suite));
    }

    let mut development = collect_scope(provider, "development");
    development.extend(inputs.development_extras);

    if let Some(npm_modules) = inputs.npm_modules {
        compile.extend(npm_modules.compile);
        development.extend(npm_modules.development);
    }

    TrackerReport {
        build_tool: inputs.build_tool,
        build_tool_version: inputs.build_tool_version,
        project: ProjectInfo {
            artifact: inputs.project_artifact,
            packaging: inputs.project_packaging,
        },
        compile,
        runtime,
        provided,
        test,
        development,
        license_records: inputs.license_records,
    }
}

fn collect_scope(provider: &dyn ComponentGraphProvider, scope: &str) -> Vec<Artifact> {
    match provider.resolve(scope) {
        Some(root) => collect_artifacts(&root),
        None => Vec::new(),
    }
}
