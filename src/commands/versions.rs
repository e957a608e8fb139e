use anyhow::{Context, Result};
use glob::Pattern;
use tracing::{info, warn};

use crate::cli::VersionsArgs;
use crate::commands::watch::list_matching_files;
use crate::model::VersionsReport;
use crate::util::{file_name_string, now_utc_string, write_json_pretty};
use crate::version::VersionResolver;

const VERSIONS_REPORT_VERSION: u32 = 1;

/// Reports which export of each call is newest without importing anything.
pub fn run(args: VersionsArgs) -> Result<()> {
    let pattern = Pattern::new(&args.file_pattern)
        .with_context(|| format!("invalid file pattern {}", args.file_pattern))?;
    let resolver = VersionResolver::new()?;

    let filenames = list_matching_files(&args.watch_folder, &pattern)?
        .iter()
        .map(|path| file_name_string(path))
        .collect::<Result<Vec<_>>>()?;

    let report = build_report(&resolver, &args.watch_folder.display().to_string(), &filenames);

    for filename in &report.unparseable {
        warn!(filename = %filename, "filename does not carry a call version");
    }
    for filename in &report.skip {
        info!(filename = %filename, "superseded by a newer export");
    }
    info!(
        source_directory = %report.source_directory,
        files = report.file_count,
        calls = report.call_count,
        latest = report.latest.len(),
        skip = report.skip.len(),
        unparseable = report.unparseable.len(),
        "resolved call export versions"
    );

    if let Some(report_path) = &args.report_path {
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote versions report");
    }

    Ok(())
}

fn build_report(
    resolver: &VersionResolver,
    source_directory: &str,
    filenames: &[String],
) -> VersionsReport {
    let unparseable = filenames
        .iter()
        .filter(|filename| resolver.parse(filename).is_none())
        .cloned()
        .collect::<Vec<_>>();

    VersionsReport {
        report_version: VERSIONS_REPORT_VERSION,
        generated_at: now_utc_string(),
        source_directory: source_directory.to_string(),
        file_count: filenames.len(),
        call_count: resolver.group_by_call_number(filenames).len(),
        latest: resolver.latest_files(filenames),
        skip: resolver.files_to_skip(filenames),
        unparseable,
    }
}
