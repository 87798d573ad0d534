use crate::planner::RenamePlan;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOperation {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub renamed: usize,
    pub unchanged: usize,
    /// Files left alone because the new name would be empty or unreadable.
    pub skipped: usize,
    pub operations: Vec<RenameOperation>,
}

/// A rename failed mid-batch. Earlier renames in `completed` stay in place.
#[derive(Debug, Error)]
#[error(
    "リネームに失敗しました: {} -> {} (適用済みの{}件は元に戻していません)",
    .failed.display(),
    .target.display(),
    .completed.len()
)]
pub struct ApplyError {
    pub completed: Vec<RenameOperation>,
    pub failed: PathBuf,
    pub target: PathBuf,
    #[source]
    pub source: io::Error,
}

pub fn apply_plan(plan: &RenamePlan) -> Result<ApplyResult, ApplyError> {
    let mut operations = Vec::<RenameOperation>::new();

    for candidate in plan.candidates.iter().filter(|c| c.changed()) {
        let dir = candidate
            .target_path
            .parent()
            .unwrap_or_else(|| Path::new(""));
        let target = unique_target_path(dir, &candidate.new_stem, &candidate.extension);
        if let Err(source) = fs::rename(&candidate.original_path, &target) {
            return Err(ApplyError {
                completed: operations,
                failed: candidate.original_path.clone(),
                target,
                source,
            });
        }

        debug!(
            "renamed {} -> {}",
            candidate.original_path.display(),
            target.display()
        );
        operations.push(RenameOperation {
            from: candidate.original_path.clone(),
            to: target,
        });
    }

    let skipped = plan.stats.skipped_empty + plan.stats.skipped_invalid;
    info!(
        "rename finished: {} renamed, {} unchanged, {} skipped",
        operations.len(),
        plan.stats.unchanged,
        skipped
    );
    Ok(ApplyResult {
        renamed: operations.len(),
        unchanged: plan.stats.unchanged,
        skipped,
        operations,
    })
}

/// `<stem><extension>` in `dir` when free, otherwise the first free
/// `<stem>_<n><extension>` with n from 1. `extension` carries its dot or is empty.
pub fn unique_target_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}{}", stem, extension));
    if !path_taken(&candidate) {
        return candidate;
    }

    let mut n = 1usize;
    loop {
        let next = dir.join(format!("{}_{}{}", stem, n, extension));
        if !path_taken(&next) {
            return next;
        }
        n += 1;
    }
}

// Dangling symlinks count as taken; `exists()` would follow them.
fn path_taken(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
