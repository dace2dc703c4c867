use std::fmt;

use indicatif::ProgressBar;
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::db::{self, PersistReport};
use crate::error::PipelineError;
use crate::fetcher::{fetch_records, PageSource};
use crate::model::{Category, LoadMode};
use crate::normalize::normalize;
use crate::settings::Settings;

/// Per-run state. A run only moves forward; a failed run is restarted from `Idle` by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Normalizing,
    Persisting,
    Committed,
    RolledBack,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetch",
            Stage::Normalizing => "normalize",
            Stage::Persisting => "persist",
            Stage::Committed => "committed",
            Stage::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: LoadMode,
    pub table: String,
    pub pages_requested: usize,
    pub pages_failed: usize,
    pub fetched: usize,
    pub report: PersistReport,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records from {} pages ({} failed); {} inserted, {} updated in '{}'",
            self.mode,
            self.fetched,
            self.pages_requested,
            self.pages_failed,
            self.report.inserted,
            self.report.updated,
            self.table
        )
    }
}

struct Run {
    mode: LoadMode,
    stage: Stage,
}

impl Run {
    fn enter(&mut self, next: Stage) {
        info!(mode = %self.mode, from = %self.stage, to = %next, "stage");
        self.stage = next;
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        error!(mode = %self.mode, stage = %err.stage(), error = %err, "run failed");
        self.stage = Stage::RolledBack;
        err
    }
}

/// Fetch, normalize and persist once. Per-page fetch failures are absorbed;
/// conversion and write failures abort the run with nothing committed.
pub fn run<S: PageSource + ?Sized>(
    settings: &Settings,
    mode: LoadMode,
    source: &S,
    conn: &Connection,
    progress: &ProgressBar,
) -> Result<RunSummary, PipelineError> {
    let mut state = Run {
        mode,
        stage: Stage::Idle,
    };
    let table_name = settings.store.table.as_str();

    state.enter(Stage::Fetching);
    let pages = mode.pages();
    progress.set_length((Category::ALL.len() * pages.clone().count()) as u64);
    let fetched = fetch_records(source, &Category::ALL, pages, progress);
    progress.finish_and_clear();

    state.enter(Stage::Normalizing);
    let table = normalize(&fetched.records, mode).map_err(|e| state.fail(e.into()))?;
    if table.is_empty() {
        warn!(%mode, "no records fetched");
    } else {
        info!(rows = table.len(), columns = table.columns().len(), "normalized");
    }

    state.enter(Stage::Persisting);
    let report = db::persist(conn, table_name, &table).map_err(|e| state.fail(e.into()))?;
    state.enter(Stage::Committed);

    Ok(RunSummary {
        mode,
        table: table_name.to_string(),
        pages_requested: fetched.pages_requested,
        pages_failed: fetched.pages_failed,
        fetched: fetched.records.len(),
        report,
    })
}
