use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use organizer_core::{
    app_paths, apply_plan, convert_files, generate_plan, load_config, AppConfig, CandidateStatus,
    ConvertOptions, FileList, RenameMode, RenamePlan, RenameRule, ScanStats, SortKey,
    TargetFormat,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "organizer-cli")]
#[command(about = "ファイルの一括リネームと画像形式の一括変換を行います")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Rename(RenameArgs),
    Convert(ConvertArgs),
    List(ListArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
}

#[derive(Debug, Args)]
struct SelectionArgs {
    /// Files or folders
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    #[arg(long, default_value_t = false)]
    recursive: bool,
    #[arg(long, default_value_t = false)]
    include_hidden: bool,
    /// Only keep files with these extensions
    #[arg(long = "ext")]
    extensions: Vec<String>,
    #[arg(long, value_enum)]
    sort: Option<SortArg>,
    #[arg(long, default_value_t = false)]
    reverse: bool,
}

#[derive(Debug, Args)]
struct RenameArgs {
    #[command(flatten)]
    selection: SelectionArgs,
    #[arg(long, value_enum)]
    mode: ModeArg,
    /// Character count, literal text, or sequence pattern depending on --mode
    #[arg(long, allow_hyphen_values = true)]
    value: String,
    #[arg(long)]
    start: Option<u64>,
    #[arg(long)]
    placeholder: Option<char>,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    #[command(flatten)]
    selection: SelectionArgs,
    #[arg(long, value_enum)]
    to: Option<FormatArg>,
    #[arg(long, default_value_t = false)]
    delete_originals: bool,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[command(flatten)]
    selection: SelectionArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    KeepFirst,
    KeepFrom,
    KeepThrough,
    KeepFromText,
    Remove,
    Sequence,
}

impl From<ModeArg> for RenameMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::KeepFirst => RenameMode::KeepFirstN,
            ModeArg::KeepFrom => RenameMode::KeepFromN,
            ModeArg::KeepThrough => RenameMode::KeepThroughLiteral,
            ModeArg::KeepFromText => RenameMode::KeepFromLiteral,
            ModeArg::Remove => RenameMode::RemoveLiteral,
            ModeArg::Sequence => RenameMode::SequentialPattern,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Jpg,
    Jpeg,
    Webp,
    Bmp,
    Ico,
    Tiff,
}

impl From<FormatArg> for TargetFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Png => TargetFormat::Png,
            FormatArg::Jpg => TargetFormat::Jpg,
            FormatArg::Jpeg => TargetFormat::Jpeg,
            FormatArg::Webp => TargetFormat::Webp,
            FormatArg::Bmp => TargetFormat::Bmp,
            FormatArg::Ico => TargetFormat::Ico,
            FormatArg::Tiff => TargetFormat::Tiff,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Date,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Rename(args) => cmd_rename(args),
        Commands::Convert(args) => cmd_convert(args),
        Commands::List(args) => cmd_list(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let config = load_config()?;
    let list = select_files(&args.selection, FileList::new(), &config)?;

    let rule = RenameRule::new(args.mode.into(), args.value)
        .with_start(args.start.unwrap_or(config.sequence_start))
        .with_placeholder(args.placeholder.unwrap_or(config.placeholder));
    let plan = generate_plan(&list.paths(), &rule)?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Table => {
            print_plan(&plan);
        }
    }

    if !args.apply {
        eprintln!("dry-runモード: 実ファイルは変更していません。適用するには --apply を指定してください。");
        return Ok(());
    }

    match apply_plan(&plan) {
        Ok(result) => {
            for op in &result.operations {
                println!("{} -> {}", op.from.display(), op.to.display());
            }
            eprintln!(
                "適用完了: {}件 (変更なし {}件, スキップ {}件)",
                result.renamed, result.unchanged, result.skipped
            );
            Ok(())
        }
        Err(err) => {
            for op in &err.completed {
                println!("{} -> {}", op.from.display(), op.to.display());
            }
            Err(err.into())
        }
    }
}

fn cmd_convert(args: ConvertArgs) -> Result<()> {
    let config = load_config()?;
    let list = select_files(&args.selection, FileList::images(), &config)?;

    let defaults = config.convert_options();
    let options = ConvertOptions {
        format: args.to.map(Into::into).unwrap_or(defaults.format),
        keep_originals: defaults.keep_originals && !args.delete_originals,
        jpeg_quality: args.quality.unwrap_or(defaults.jpeg_quality),
    };

    let report = convert_files(&list.paths(), &options);
    for converted in &report.converted {
        println!(
            "{} -> {}{}",
            converted.source.display(),
            converted.output.display(),
            if converted.source_removed {
                " (元ファイル削除)"
            } else {
                ""
            }
        );
    }
    for failure in &report.failures {
        eprintln!("失敗: {}: {}", failure.path.display(), failure.message);
    }

    eprintln!(
        "変換完了: {}件 (スキップ {}件, 失敗 {}件)",
        report.success_count(),
        report.skipped.len(),
        report.failures.len()
    );
    Ok(())
}

fn cmd_list(args: ListArgs) -> Result<()> {
    let config = load_config()?;
    let list = select_files(&args.selection, FileList::new(), &config)?;
    for (index, entry) in list.entries().iter().enumerate() {
        let modified = entry
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>4}  {}  {}", index + 1, modified, entry.path.display());
    }
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn select_files(
    selection: &SelectionArgs,
    base: FileList,
    config: &AppConfig,
) -> Result<FileList> {
    let mut list = if selection.extensions.is_empty() {
        base
    } else {
        FileList::with_extensions(&selection.extensions)
    };

    let stats = list.add_inputs(
        &selection.inputs,
        selection.recursive || config.recursive_default,
        selection.include_hidden || config.include_hidden_default,
    )?;
    log_scan_stats(&stats);

    if let Some(sort) = selection.sort {
        list.sort_by(match sort {
            SortArg::Name => SortKey::Name,
            SortArg::Date => SortKey::Modified,
        });
    }
    if selection.reverse {
        list.invert();
    }

    if list.is_empty() {
        bail!("対象ファイルが選択されていません");
    }
    Ok(list)
}

fn log_scan_stats(stats: &ScanStats) {
    info!(
        "scan: scanned={} added={} filtered={} hidden={} duplicate={}",
        stats.scanned_files,
        stats.added,
        stats.skipped_filtered,
        stats.skipped_hidden,
        stats.skipped_duplicate
    );
}

fn print_plan(plan: &RenamePlan) {
    println!("元ファイル -> 新ファイル");
    for candidate in &plan.candidates {
        let note = match candidate.status {
            CandidateStatus::Rename => String::new(),
            CandidateStatus::Unchanged => " (変更なし)".to_string(),
            CandidateStatus::EmptyName => " (空の名前になるためスキップ)".to_string(),
            CandidateStatus::InvalidName => " (ファイル名を解釈できないためスキップ)".to_string(),
        };
        println!(
            "{} -> {}{}",
            candidate.original_path.display(),
            candidate.target_path.display(),
            note
        );
    }

    println!(
        "\n集計: total={} planned={} unchanged={} empty_skip={} invalid_skip={}",
        plan.stats.total,
        plan.stats.planned,
        plan.stats.unchanged,
        plan.stats.skipped_empty,
        plan.stats.skipped_invalid
    );
}
