use crate::rename::{RenameError, RenameRule};
use crate::sanitize::is_usable_stem;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Rename,
    Unchanged,
    EmptyName,
    InvalidName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameCandidate {
    pub original_path: PathBuf,
    /// Target before collision handling; the final path is only known when applying.
    pub target_path: PathBuf,
    pub new_stem: String,
    /// Last extension with its dot, or empty.
    pub extension: String,
    pub counter: Option<u64>,
    pub status: CandidateStatus,
}

impl RenameCandidate {
    pub fn changed(&self) -> bool {
        self.status == CandidateStatus::Rename
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub total: usize,
    pub planned: usize,
    pub unchanged: usize,
    pub skipped_empty: usize,
    pub skipped_invalid: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub rule: RenameRule,
    pub candidates: Vec<RenameCandidate>,
    pub stats: RenameStats,
}

/// Resolves every file against `rule` without touching the filesystem.
///
/// The rule is validated first, so a bad parameter fails the whole batch before any
/// candidate exists. Sequence numbers are handed out only to files that will actually
/// be renamed.
pub fn generate_plan(files: &[PathBuf], rule: &RenameRule) -> Result<RenamePlan, RenameError> {
    let compiled = rule.compile()?;
    let mut counter = rule.start;
    let mut stats = RenameStats {
        total: files.len(),
        ..RenameStats::default()
    };
    let mut candidates = Vec::with_capacity(files.len());

    for path in files {
        let Some((parent, stem, extension)) = split_file_name(path) else {
            warn!("ファイル名を解釈できないためスキップします: {}", path.display());
            stats.skipped_invalid += 1;
            candidates.push(skipped(path, CandidateStatus::InvalidName));
            continue;
        };

        let new_stem = compiled.apply(stem, counter);
        if new_stem == stem {
            stats.unchanged += 1;
            candidates.push(skipped(path, CandidateStatus::Unchanged));
            continue;
        }
        if !is_usable_stem(&new_stem) {
            warn!(
                "リネーム後の名前が空になるためスキップします: {}",
                path.display()
            );
            stats.skipped_empty += 1;
            candidates.push(skipped(path, CandidateStatus::EmptyName));
            continue;
        }

        let assigned = compiled.uses_counter().then_some(counter);
        if assigned.is_some() {
            counter = counter.saturating_add(1);
        }

        stats.planned += 1;
        candidates.push(RenameCandidate {
            original_path: path.clone(),
            target_path: parent.join(format!("{}{}", new_stem, extension)),
            new_stem,
            extension,
            counter: assigned,
            status: CandidateStatus::Rename,
        });
    }

    Ok(RenamePlan {
        rule: rule.clone(),
        candidates,
        stats,
    })
}

fn skipped(path: &Path, status: CandidateStatus) -> RenameCandidate {
    RenameCandidate {
        original_path: path.to_path_buf(),
        target_path: path.to_path_buf(),
        new_stem: path
            .file_stem()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default(),
        extension: path
            .extension()
            .map(|v| format!(".{}", v.to_string_lossy()))
            .unwrap_or_default(),
        counter: None,
        status,
    }
}

// (parent, stem, ".ext" or "")
fn split_file_name(path: &Path) -> Option<(&Path, &str, String)> {
    let stem = path.file_stem()?.to_str()?;
    let extension = match path.extension() {
        Some(ext) => format!(".{}", ext.to_str()?),
        None => String::new(),
    };
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    Some((parent, stem, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rename::RenameMode;

    fn files(names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| PathBuf::from("/photos").join(name))
            .collect()
    }

    #[test]
    fn plan_keeps_extension_and_directory() {
        let rule = RenameRule::new(RenameMode::KeepFirstN, "5");
        let plan = generate_plan(&files(&["photo123.JPG"]), &rule).expect("valid rule");
        let candidate = &plan.candidates[0];
        assert!(candidate.changed());
        assert_eq!(candidate.target_path, PathBuf::from("/photos/photo.JPG"));
        assert_eq!(candidate.new_stem, "photo");
        assert_eq!(candidate.extension, ".JPG");
    }

    #[test]
    fn plan_uses_last_extension_only() {
        let rule = RenameRule::new(RenameMode::RemoveLiteral, "backup-");
        let plan = generate_plan(&files(&["backup-site.tar.gz"]), &rule).expect("valid rule");
        assert_eq!(
            plan.candidates[0].target_path,
            PathBuf::from("/photos/site.tar.gz")
        );
    }

    #[test]
    fn invalid_parameter_fails_before_planning() {
        let rule = RenameRule::new(RenameMode::KeepFromN, "x");
        let err = generate_plan(&files(&["a.txt"]), &rule).expect_err("must fail");
        assert!(matches!(err, RenameError::InvalidParameter(_)));
    }

    #[test]
    fn unchanged_names_are_not_planned() {
        let rule = RenameRule::new(RenameMode::RemoveLiteral, "_draft");
        let plan = generate_plan(&files(&["a_draft.txt", "b.txt"]), &rule).expect("valid rule");
        assert_eq!(plan.stats.planned, 1);
        assert_eq!(plan.stats.unchanged, 1);
        assert_eq!(plan.candidates[1].status, CandidateStatus::Unchanged);
        assert_eq!(plan.candidates[1].target_path, PathBuf::from("/photos/b.txt"));
    }

    #[test]
    fn sequence_counter_skips_unchanged_files() {
        let rule = RenameRule::new(RenameMode::SequentialPattern, "img-@@@").with_start(7);
        let plan = generate_plan(
            &files(&["a.png", "img-008.png", "c.png", "d.png"]),
            &rule,
        )
        .expect("valid rule");

        let targets: Vec<_> = plan
            .candidates
            .iter()
            .map(|c| c.target_path.file_name().and_then(|v| v.to_str()).map(String::from))
            .collect();
        assert_eq!(
            targets,
            vec![
                Some("img-007.png".to_string()),
                Some("img-008.png".to_string()),
                Some("img-008.png".to_string()),
                Some("img-009.png".to_string()),
            ]
        );
        assert_eq!(plan.candidates[0].counter, Some(7));
        assert_eq!(plan.candidates[2].counter, Some(8));
        assert_eq!(plan.candidates[3].counter, Some(9));
        assert_eq!(plan.stats.planned, 3);
        assert_eq!(plan.stats.unchanged, 1);
    }

    #[test]
    fn empty_result_is_skipped() {
        let rule = RenameRule::new(RenameMode::RemoveLiteral, "draft");
        let plan = generate_plan(&files(&["draft.txt"]), &rule).expect("valid rule");
        assert_eq!(plan.candidates[0].status, CandidateStatus::EmptyName);
        assert_eq!(plan.stats.skipped_empty, 1);
        assert_eq!(plan.stats.planned, 0);
    }

    #[test]
    fn literal_modes_do_not_assign_counters() {
        let rule = RenameRule::new(RenameMode::KeepThroughLiteral, "_");
        let plan = generate_plan(&files(&["a_b.txt"]), &rule).expect("valid rule");
        assert_eq!(plan.candidates[0].counter, None);
        assert_eq!(plan.candidates[0].new_stem, "a_");
    }

    #[test]
    fn dotted_stem_on_extensionless_file_keeps_empty_extension() {
        let rule = RenameRule::new(RenameMode::SequentialPattern, "img.@@");
        let plan = generate_plan(&files(&["foo"]), &rule).expect("valid rule");
        let candidate = &plan.candidates[0];
        assert_eq!(candidate.new_stem, "img.01");
        assert_eq!(candidate.extension, "");
        assert_eq!(candidate.target_path, PathBuf::from("/photos/img.01"));
    }
}
