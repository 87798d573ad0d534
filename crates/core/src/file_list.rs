use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "bmp", "ico", "tif", "tiff", "gif",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub modified: Option<DateTime<Local>>,
}

impl FileEntry {
    pub fn new(path: PathBuf) -> Self {
        let modified = file_modified_to_local(&path);
        Self { path, modified }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Modified,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub scanned_files: usize,
    pub added: usize,
    pub skipped_filtered: usize,
    pub skipped_hidden: usize,
    pub skipped_duplicate: usize,
}

/// Ordered, duplicate-free selection of files.
///
/// Order is whatever the user made it: insertion order until [`FileList::sort_by`],
/// [`FileList::invert`] or [`FileList::move_entry`] change it.
#[derive(Debug, Clone, Default)]
pub struct FileList {
    entries: Vec<FileEntry>,
    allowed_extensions: Option<Vec<String>>,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            entries: Vec::new(),
            allowed_extensions: Some(allowed),
        }
    }

    pub fn images() -> Self {
        Self::with_extensions(IMAGE_EXTENSIONS)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|entry| entry.path.clone()).collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        let path = normalize_path(path.to_path_buf());
        self.entries.iter().any(|entry| entry.path == path)
    }

    pub fn accepts(&self, path: &Path) -> bool {
        let Some(allowed) = self.allowed_extensions.as_ref() else {
            return true;
        };
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_ascii_lowercase();
                allowed.iter().any(|a| *a == ext)
            })
            .unwrap_or(false)
    }

    /// Returns `false` when the path is already listed or filtered out.
    /// Paths are stored absolute, with the parent directory resolved, so two spellings
    /// of the same file only appear once.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = normalize_path(path.into());
        if !self.accepts(&path) || self.contains(&path) {
            return false;
        }
        self.entries.push(FileEntry::new(path));
        true
    }

    pub fn add_all<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut added = 0;
        for path in paths {
            if self.add(path) {
                added += 1;
            }
        }
        added
    }

    /// Adds every accepted file below `root`, sorted by file name.
    pub fn add_folder(
        &mut self,
        root: &Path,
        recursive: bool,
        include_hidden: bool,
    ) -> Result<ScanStats> {
        let mut stats = ScanStats::default();
        for path in collect_files(root, recursive)? {
            stats.scanned_files += 1;
            self.admit(path, include_hidden, &mut stats);
        }
        Ok(stats)
    }

    /// Mixed input as handed over by a picker or a drop: files are added as-is,
    /// folders are scanned.
    pub fn add_inputs(
        &mut self,
        inputs: &[PathBuf],
        recursive: bool,
        include_hidden: bool,
    ) -> Result<ScanStats> {
        let mut stats = ScanStats::default();
        for input in inputs {
            if input.is_dir() {
                let folder = self.add_folder(input, recursive, include_hidden)?;
                stats.scanned_files += folder.scanned_files;
                stats.added += folder.added;
                stats.skipped_filtered += folder.skipped_filtered;
                stats.skipped_hidden += folder.skipped_hidden;
                stats.skipped_duplicate += folder.skipped_duplicate;
            } else if input.is_file() {
                stats.scanned_files += 1;
                self.admit(input.clone(), true, &mut stats);
            } else {
                bail!("ファイルまたはフォルダが存在しません: {}", input.display());
            }
        }
        Ok(stats)
    }

    pub fn remove(&mut self, index: usize) -> Option<FileEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        if from >= self.entries.len() || to >= self.entries.len() {
            return false;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn sort_by(&mut self, key: SortKey) {
        match key {
            SortKey::Name => self.entries.sort_by(|a, b| {
                a.file_name()
                    .to_lowercase()
                    .cmp(&b.file_name().to_lowercase())
                    .then_with(|| a.path.cmp(&b.path))
            }),
            SortKey::Modified => self.entries.sort_by(|a, b| {
                a.modified
                    .cmp(&b.modified)
                    .then_with(|| a.path.cmp(&b.path))
            }),
        }
    }

    pub fn invert(&mut self) {
        self.entries.reverse();
    }

    fn admit(&mut self, path: PathBuf, include_hidden: bool, stats: &mut ScanStats) {
        let path = normalize_path(path);
        if is_hidden(&path) && !include_hidden {
            stats.skipped_hidden += 1;
        } else if !self.accepts(&path) {
            stats.skipped_filtered += 1;
        } else if self.contains(&path) {
            stats.skipped_duplicate += 1;
        } else {
            self.entries.push(FileEntry::new(path));
            stats.added += 1;
        }
    }
}

fn collect_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();

    if recursive {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("フォルダ走査に失敗しました: {}", root.display()))?;
            if entry.file_type().is_file() {
                out.push(entry.path().to_path_buf());
            }
        }
    } else {
        for entry in fs::read_dir(root)
            .with_context(|| format!("フォルダを読めませんでした: {}", root.display()))?
        {
            let entry =
                entry.with_context(|| format!("エントリ読み取り失敗: {}", root.display()))?;
            let path = entry.path();
            if path.is_file() {
                out.push(path);
            }
        }
        out.sort();
    }

    Ok(out)
}

// The file name itself is kept so a symlinked file is renamed, not its target.
fn normalize_path(path: PathBuf) -> PathBuf {
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(dir) = fs::canonicalize(parent) {
            return dir.join(name);
        }
    }
    std::path::absolute(&path).unwrap_or(path)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn file_modified_to_local(path: &Path) -> Option<DateTime<Local>> {
    let time = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::from(time))
}
