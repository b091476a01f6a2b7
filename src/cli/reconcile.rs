use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::error;
use serde::Serialize;

use crate::cli::report::format_outcome;
use crate::cli::{parse_date_arg, start_of_year, ReconcileArgs};
use crate::db::SqliteSource;
use crate::error::{ConferenciaError, Result};
use crate::export::export_all;
use crate::models::DateRange;
use crate::pipeline::{self, RunOutcome, RunParams};
use crate::settings::{load_settings, shellexpand_path};
use crate::sheet::SheetFormat;
use crate::source::{CachedSource, DataSource};

#[derive(Serialize)]
struct FileOutcome<'a> {
    file: &'a str,
    #[serde(flatten)]
    outcome: &'a RunOutcome,
}

pub fn run(args: ReconcileArgs) -> Result<()> {
    let settings = load_settings();

    let today = chrono::Local::now().date_naive();
    let start = parse_date_arg(args.from_date.as_deref(), start_of_year(today))?;
    let end = parse_date_arg(args.to_date.as_deref(), today)?;
    let params = RunParams {
        range: DateRange::new(start, end)?,
        organization_id: if args.all_orgs {
            None
        } else {
            args.org.or(settings.default_org_id)
        },
    };

    let database = args
        .database
        .as_deref()
        .map(shellexpand_path)
        .or(settings.database.clone())
        .map(PathBuf::from);
    let query = match &args.query_file {
        Some(file) => Some(std::fs::read_to_string(shellexpand_path(file))?),
        None => settings.query.clone(),
    };
    // One fetch serves every spreadsheet checked in this invocation.
    let source = CachedSource::new(
        SqliteSource::new(database, query),
        Duration::from_secs(settings.cache_ttl_secs),
    );

    let export_dir = match (&args.export_dir, args.export) {
        (Some(dir), _) => Some(PathBuf::from(shellexpand_path(dir))),
        (None, true) => Some(PathBuf::from(&settings.export_dir)),
        (None, false) => None,
    };

    let mut outcomes = Vec::new();
    let mut failed = 0usize;
    for (i, file) in args.files.iter().enumerate() {
        match check_file(&source, Path::new(file), &params) {
            Ok(outcome) => outcomes.push((i, file.as_str(), outcome)),
            Err(e) => {
                error!("{file}: {e}");
                eprintln!("Error in {file}: {e}");
                failed += 1;
            }
        }
    }

    if args.json {
        let rows: Vec<FileOutcome> = outcomes
            .iter()
            .map(|(_, file, outcome)| FileOutcome { file: *file, outcome })
            .collect();
        let json = serde_json::to_string_pretty(&rows).map_err(|e| ConferenciaError::Other(e.to_string()))?;
        println!("{json}");
    } else {
        for (_, file, outcome) in &outcomes {
            println!("{}\n", format_outcome(file, outcome));
        }
    }

    if let Some(dir) = export_dir {
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let stamps = export_stamps(&args.files, &date);
        for (i, _, outcome) in &outcomes {
            for path in export_all(&outcome.result, &dir, &stamps[*i])? {
                if !args.json {
                    println!("Wrote {}", path.display());
                }
            }
        }
    }

    if failed > 0 {
        return Err(ConferenciaError::Other(format!(
            "{failed} of {} spreadsheet(s) could not be checked",
            args.files.len()
        )));
    }
    Ok(())
}

/// One export stamp per input file. Sheets sharing a file stem get a counter
/// so their exports never overwrite each other.
fn export_stamps(files: &[String], date: &str) -> Vec<String> {
    let stems: Vec<String> = files
        .iter()
        .map(|f| {
            Path::new(f)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "sheet".to_string())
        })
        .collect();
    let mut taken = HashSet::new();
    stems
        .iter()
        .map(|stem| {
            let shared = stems.iter().filter(|s| *s == stem).count() > 1;
            let mut n = 1;
            let mut base = if shared { format!("{stem}-{n}") } else { stem.clone() };
            while !taken.insert(base.clone()) {
                n += 1;
                base = format!("{stem}-{n}");
            }
            format!("{base}-{date}")
        })
        .collect()
}

fn check_file<S: DataSource>(source: &S, path: &Path, params: &RunParams) -> Result<RunOutcome> {
    let bytes = std::fs::read(path)?;
    pipeline::run(source, &bytes, SheetFormat::from_path(path), params)
}
