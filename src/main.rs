use std::collections::HashMap;
use std::fs;
use std::path::{ Path, PathBuf };

use anyhow::Context;
use clap::{ ArgAction, Parser };
use colored::Colorize;

mod coordinate;
mod custom;
mod licenses;
mod npm;
mod overrides;
mod pom;
mod record;
mod report;
mod spdx;
mod tree;
mod yarn;

use coordinate::ModuleId;
use licenses::Licenses;
use overrides::OverrideTable;
use pom::{ PomParser, PomResolver };
use report::{ ArtifactFileResolver, LicenseReportBuilder };
use tree::{
    create_tracker_report,
    Artifact,
    ArtifactKind,
    ComponentGraphProvider,
    ResolvedComponent,
    TrackerReportInputs,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a project root directory containing lockfiles
    #[arg(index = 1, value_name = "PROJECT_PATH")]
    project_path: String,

    /// Directory of <artifact>-<version>.pom metadata documents to resolve
    #[arg(long, value_name = "DIR")]
    pom_dir: Option<String>,

    /// Previously generated sibling-module reports to merge instead of re-resolving
    #[arg(long = "module-report", value_name = "FILE")]
    module_reports: Vec<String>,

    /// Output file for the license report
    #[arg(short, long, value_name = "FILE", default_value = "license-report.json")]
    output: String,

    /// Also write a tracker report with per-scope artifact trails
    #[arg(long, value_name = "FILE")]
    tracker_output: Option<String>,

    /// Show every resolved package, not just the summary
    #[arg(long, short, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder
        ::from_env(
            env_logger::Env
                ::default()
                .default_filter_or(if args.verbose { "debug" } else { "info" })
        )
        .format_timestamp(None)
        .init();

    if let Err(err) = run(&args) {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let project_dir = Path::new(&args.project_path);
    anyhow::ensure!(project_dir.is_dir(), "{} is not a directory", project_dir.display());

    let licenses = Licenses::builtin()?;
    let overrides = OverrideTable::load(project_dir, &licenses)?;

    let pom_dir = args.pom_dir.as_ref().map(PathBuf::from);
    let resolver = DirPomResolver { dir: pom_dir.clone() };
    let pom_parser = PomParser::new(DirPomResolver { dir: pom_dir.clone() });

    let dependencies = match &pom_dir {
        Some(dir) => discover_pom_coordinates(dir, &pom_parser)?,
        None => Vec::new(),
    };
    if let Some(dir) = &pom_dir {
        println!("Found {} metadata documents in {}", dependencies.len(), dir.display());
    }

    let package_json = project_dir.join(npm::PACKAGE_JSON);
    let package_lock = project_dir.join(npm::PACKAGE_LOCK_JSON);
    let yarn_lock = project_dir.join("yarn.lock");

    let package_lock_input = if package_lock.is_file() {
        Some(package_lock.as_path())
    } else {
        None
    };
    let yarn_input = if package_json.is_file() && yarn_lock.is_file() {
        Some((package_json.as_path(), yarn_lock.as_path()))
    } else {
        None
    };

    let module_reports: Vec<PathBuf> = args.module_reports.iter().map(PathBuf::from).collect();

    let builder = LicenseReportBuilder::new(&licenses, &overrides, &resolver, &pom_parser);
    let records = builder.build(&dependencies, &module_reports, package_lock_input, yarn_input)?;

    let output = Path::new(&args.output);
    record::write_records(output, &records)?;
    println!(
        "License report with {} packages written to {}",
        records.len().to_string().bold(),
        output.display()
    );

    if let Some(tracker_output) = &args.tracker_output {
        let npm_modules = if package_json.is_file() && yarn_lock.is_file() {
            Some(yarn::parse_npm_module(&package_json, &yarn_lock)?)
        } else if package_json.is_file() && package_lock.is_file() {
            Some(npm::parse_npm_module(&package_json, &package_lock)?)
        } else {
            None
        };

        let project_name = project_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());

        let tracker_report = create_tracker_report(&NoComponentGraphs, TrackerReportInputs {
            build_tool: env!("CARGO_PKG_NAME").to_string(),
            build_tool_version: env!("CARGO_PKG_VERSION").to_string(),
            project_artifact: format!("local:{}:0", project_name),
            project_packaging: "jar".to_string(),
            test_suites: Vec::new(),
            npm_modules,
            development_extras: vec![
                // the resolving tool itself counts as a development dependency
                Artifact::new(
                    format!("local:{}:{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
                    ArtifactKind::Sdk,
                    Vec::new()
                )
            ],
            license_records: records.clone(),
        });

        let tracker_path = Path::new(tracker_output);
        let content = serde_json::to_string_pretty(&tracker_report)?;
        fs
            ::write(tracker_path, content)
            .with_context(|| format!("failed to write {}", tracker_path.display()))?;
        println!("Tracker report written to {}", tracker_path.display());
    }

    print_summary(&records, args.verbose);
    Ok(())
}

/// The CLI runs without a build-tool integration supplying resolved component
/// graphs; scopes that depend on one resolve to nothing here.
struct NoComponentGraphs;

impl ComponentGraphProvider for NoComponentGraphs {
    fn resolve(&self, _scope: &str) -> Option<ResolvedComponent> {
        None
    }
}

/// Resolves `<artifact>-<version>.pom` files inside a fixed directory, both
/// for report inputs and for parent metadata lookups.
struct DirPomResolver {
    dir: Option<PathBuf>,
}

impl PomResolver for DirPomResolver {
    fn resolve(&self, identifier: &ModuleId) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let file = dir.join(format!("{}-{}.pom", identifier.name, identifier.version));
        if file.is_file() {
            Some(file)
        } else {
            None
        }
    }
}

impl ArtifactFileResolver for DirPomResolver {
    fn resolve(&self, identifier: &ModuleId, _kind: &str) -> Option<PathBuf> {
        PomResolver::resolve(self, identifier)
    }
}

/// Read every .pom document in the directory and derive its coordinate,
/// falling back to the parent reference for the group and to the metadata
/// chain for the version.
fn discover_pom_coordinates(
    dir: &Path,
    parser: &PomParser<DirPomResolver>
) -> anyhow::Result<Vec<ModuleId>> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "pom"))
        .collect();
    files.sort();

    let mut coordinates = Vec::new();
    for file in files {
        let placeholder = ModuleId::new("", "", "");
        let pom = match parser.parse(&placeholder, &file) {
            Ok(pom) => pom,
            Err(err) => {
                eprintln!("Skipping {}: {}", file.display(), err);
                continue;
            }
        };

        let group = if !pom.group_id().is_empty() {
            pom.group_id().to_string()
        } else if let Some(parent) = pom.parents().first() {
            parent.group.clone()
        } else {
            eprintln!("Skipping {}: no group id", file.display());
            continue;
        };
        let version = parser.find_version(&pom)?;
        if pom.artifact_id().is_empty() || version.is_empty() {
            eprintln!("Skipping {}: incomplete coordinates", file.display());
            continue;
        }

        coordinates.push(ModuleId::new(group, pom.artifact_id(), version));
    }

    Ok(coordinates)
}

fn print_summary(records: &[record::LicenseRecord], verbose: bool) {
    if verbose {
        println!("\n=== RESOLVED PACKAGES ===\n");
        for record in records {
            let licenses = if record.licenses.is_empty() {
                "UNKNOWN".red().bold().to_string()
            } else {
                record.licenses
                    .iter()
                    .map(|entry| entry.license.clone())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            println!("{} ({}): {}", record.project.bold(), record.dependency, licenses);
        }
    }

    println!("\n=== LICENSE USAGE STATISTICS ===");

    let mut license_counts: HashMap<String, (usize, String)> = HashMap::new();
    let mut unknown_count = 0;
    for record in records {
        if record.licenses.is_empty() {
            unknown_count += 1;
            continue;
        }
        for entry in &record.licenses {
            let counter = license_counts
                .entry(entry.license.clone())
                .or_insert((0, entry.license_url.clone()));
            counter.0 += 1;
        }
    }

    // most common licenses first
    let mut license_vec: Vec<(&String, &(usize, String))> = license_counts.iter().collect();
    license_vec.sort_by(|a, b| b.1.0.cmp(&a.1.0).then_with(|| a.0.cmp(b.0)));

    for (license, (count, license_url)) in license_vec {
        let license_display = if license_url.is_empty() {
            license.to_string()
        } else {
            format!("{} ({})", license, license_url)
        };
        println!("{}: {} packages", license_display, count);
    }

    if unknown_count > 0 {
        println!("Packages without license information: {}", unknown_count.to_string().yellow());
    }
}
