//! Avatar sheet pipeline
//!
//! Runs the stages in order: load the known teams, download current avatars,
//! fill the gaps from the previous sheet, stitch, and save.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::avatar::{AvatarError, AvatarSource};
use crate::config::InputPaths;
use crate::fetch::{download_avatars, AvatarPages, FetchError};
use crate::legacy::{load_legacy_avatars, LegacyError};
use crate::models::{PendingSet, Team};
use crate::output::{save_spritesheet, OutputError, OutputPaths};
use crate::spritesheet::{compose_spritesheet, Spritesheet};

/// Error that aborts a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("Failed to read teams file '{}': {source}", path.display())]
    TeamsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse teams file '{}': {source}", path.display())]
    TeamsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Legacy(#[from] LegacyError),
    #[error(transparent)]
    Avatar(#[from] AvatarError),
    #[error("Failed to save avatar sheet: {0}")]
    Output(#[from] OutputError),
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Teams listed in the teams file
    pub teams: usize,
    /// Avatars taken from the events API
    pub downloaded: usize,
    /// Avatars cut from the previous sheet
    pub reused: usize,
    /// Teams left without any avatar
    pub missing: usize,
    /// Cells per row/column of the new sheet
    pub sheet_size: u32,
    /// Whether the sheet and manifest were written
    pub written: bool,
    pub duration: Duration,
}

/// Load `teams.json`.
pub fn load_teams(path: &std::path::Path) -> Result<Vec<Team>, PipelineError> {
    let content =
        fs::read_to_string(path).map_err(|source| PipelineError::TeamsIo { path: path.to_path_buf(), source })?;
    serde_json::from_str(&content).map_err(|source| PipelineError::TeamsParse { path: path.to_path_buf(), source })
}

/// One avatar sheet run.
pub struct SheetPipeline {
    year: i32,
    inputs: InputPaths,
    outputs: OutputPaths,
}

impl SheetPipeline {
    /// Create a pipeline for `year` reading `inputs` and writing `outputs`.
    pub fn new(year: i32, inputs: InputPaths, outputs: OutputPaths) -> Self {
        Self { year, inputs, outputs }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Resolve every team's avatar and stitch the sheet, without saving.
    pub async fn build<P: AvatarPages + ?Sized>(
        &self,
        pages: &P,
    ) -> Result<(Spritesheet, RunSummary), PipelineError> {
        let start = Instant::now();
        let teams = load_teams(&self.inputs.teams)?;
        let mut pending = PendingSet::from_teams(&teams);
        info!(teams = pending.len(), year = self.year, "loaded teams");

        let downloaded = download_avatars(pages, self.year, &mut pending).await?;
        info!(count = downloaded.len(), "downloaded avatars");

        let reused = if pending.is_empty() {
            Vec::new()
        } else {
            load_legacy_avatars(&self.inputs.legacy_manifest, &self.inputs.legacy_sheet, &mut pending)?
        };

        if !pending.is_empty() {
            info!(count = pending.len(), "teams without an avatar are left out of the sheet");
        }

        let mut summary = RunSummary {
            teams: teams.len(),
            downloaded: downloaded.len(),
            reused: reused.len(),
            missing: pending.len(),
            ..Default::default()
        };

        let avatars: Vec<AvatarSource> = downloaded
            .into_iter()
            .map(AvatarSource::from)
            .chain(reused.into_iter().map(AvatarSource::from))
            .collect();
        let sheet = compose_spritesheet(&avatars)?;

        summary.sheet_size = sheet.manifest.sheet_size;
        summary.duration = start.elapsed();
        Ok((sheet, summary))
    }

    /// Build the sheet and save it with its manifest.
    ///
    /// When no team ended up with an avatar nothing is written and existing
    /// outputs are left alone.
    pub async fn run<P: AvatarPages + ?Sized>(&self, pages: &P) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        let (sheet, mut summary) = self.build(pages).await?;

        if sheet.is_empty() {
            warn!("no avatars were resolved, leaving existing outputs untouched");
        } else {
            info!("Saving...");
            save_spritesheet(&sheet, &self.outputs)?;
            summary.written = true;
        }

        summary.duration = start.elapsed();
        Ok(summary)
    }
}
