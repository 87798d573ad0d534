mod apply;
mod config;
mod convert;
mod file_list;
mod planner;
mod rename;
mod sanitize;

pub use apply::{apply_plan, unique_target_path, ApplyError, ApplyResult, RenameOperation};
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use convert::{
    convert_file, convert_files, output_path_for, ConvertError, ConvertFailure, ConvertOptions,
    ConvertReport, ConvertedFile, TargetFormat, DEFAULT_JPEG_QUALITY,
};
pub use file_list::{FileEntry, FileList, ScanStats, SortKey, IMAGE_EXTENSIONS};
pub use planner::{generate_plan, CandidateStatus, RenameCandidate, RenamePlan, RenameStats};
pub use rename::{
    rename_stem, CompiledRule, RenameError, RenameMode, RenameRule, SequencePattern,
    DEFAULT_PLACEHOLDER,
};
