// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_arguments)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app_config::Config;
use crate::language_utils::Direction;
use app_controller::{Controller, RunOptions};
use jobs::ExclusionLists;
use translation::exclusion::split_list;

mod app_config;
mod app_controller;
mod document;
mod errors;
mod extraction;
mod file_utils;
mod jobs;
mod language_utils;
mod providers;
mod translation;

/// CLI wrapper for Direction to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDirection {
    /// Korean to Chinese
    KoZh,
    /// Chinese to Korean
    ZhKo,
}

impl From<CliDirection> for Direction {
    fn from(cli_direction: CliDirection) -> Self {
        match cli_direction {
            CliDirection::KoZh => Direction::KoToZh,
            CliDirection::ZhKo => Direction::ZhToKo,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", env = "SHEET_TRANSLATOR_CONFIG")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Working directory for job results and extraction archives
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

/// Cells, sheets and text patterns to leave untranslated
#[derive(Args, Debug, Clone, Default)]
struct ExclusionArgs {
    /// Cell addresses or ranges, e.g. "A1,Sheet1!B2:C9,A:C"
    #[arg(long = "exclude-cells", value_name = "LIST")]
    cells: Vec<String>,

    /// Sheet names to skip entirely
    #[arg(long = "exclude-sheets", value_name = "LIST")]
    sheets: Vec<String>,

    /// Case-insensitive substrings; matching cells are skipped
    #[arg(long = "exclude-patterns", value_name = "LIST")]
    patterns: Vec<String>,
}

impl ExclusionArgs {
    fn to_lists(&self) -> ExclusionLists {
        let flatten = |values: &[String]| values.iter().flat_map(|v| split_list(v)).collect::<Vec<_>>();
        ExclusionLists {
            addresses: flatten(&self.cells),
            sheets: flatten(&self.sheets),
            patterns: flatten(&self.patterns),
        }
    }
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input .xlsx workbook or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output directory (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation direction
    #[arg(short, long, value_enum)]
    direction: Option<CliDirection>,

    /// Send Latin-only cells (codes, part numbers) through translation too
    #[arg(long, conflicts_with = "keep_latin")]
    translate_latin: bool,

    /// Leave Latin-only cells unchanged (default)
    #[arg(long)]
    keep_latin: bool,

    /// Write translations into a copy of each sheet instead of in place
    #[arg(long)]
    new_sheet: bool,

    #[command(flatten)]
    exclusions: ExclusionArgs,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Input .xlsx workbook
    #[arg(value_name = "INPUT_FILE")]
    input_file: PathBuf,

    /// Where to write the instruction text (defaults to `{stem}.prompt.txt`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Translation direction
    #[arg(short, long, value_enum)]
    direction: Option<CliDirection>,

    #[command(flatten)]
    exclusions: ExclusionArgs,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct ReconcileArgs {
    /// Token printed by `extract`
    #[arg(value_name = "TOKEN")]
    token: String,

    /// File holding the translated reply
    #[arg(value_name = "REPLY_FILE")]
    reply_file: PathBuf,

    /// Output workbook path
    #[arg(short, long)]
    output: PathBuf,

    /// Force overwrite of an existing output file
    #[arg(short, long)]
    force_overwrite: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct DictAddArgs {
    /// Source term
    source: String,

    /// Target term
    target: String,

    /// Category the entry is filed under
    #[arg(long, default_value = "custom")]
    category: String,

    /// Direction of the entry
    #[arg(short, long, value_enum, default_value = "ko-zh")]
    direction: CliDirection,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate workbooks through the dictionary and backend chain (default command)
    Translate(TranslateArgs),

    /// Extract cells for out-of-process translation and archive the workbook
    Extract(ExtractArgs),

    /// Apply a translated reply to an extracted workbook
    Reconcile(ReconcileArgs),

    /// Add an entry to the custom dictionary
    DictAdd(DictAddArgs),

    /// Generate shell completions for sheet-translator
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// sheet-translator - Korean/Chinese spreadsheet translation
///
/// Translates the text cells of .xlsx workbooks between Korean and Chinese,
/// preserving formatting, merged cells, images and every other part of the
/// document.
#[derive(Parser, Debug)]
#[command(name = "sheet-translator")]
#[command(version)]
#[command(about = "Korean/Chinese spreadsheet translation tool")]
#[command(long_about = "sheet-translator translates the text cells of .xlsx workbooks between Korean and Chinese.

EXAMPLES:
    sheet-translator translate order.xlsx                       # Korean to Chinese, in place
    sheet-translator translate -d zh-ko order.xlsx              # Chinese to Korean
    sheet-translator translate --new-sheet order.xlsx           # Translate into copied sheets
    sheet-translator translate --exclude-cells A1,B2:C5 order.xlsx
    sheet-translator translate /reports/                        # Process a whole directory
    sheet-translator extract order.xlsx                         # Prepare text for an external translator
    sheet-translator reconcile <TOKEN> reply.txt -o out.xlsx    # Apply the translated reply
    sheet-translator dict-add 발주서 订单书                       # Add a dictionary entry
    sheet-translator completions bash > sheet-translator.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Accept the logger's own ceiling; the effective level is set once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "sheet-translator", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
        Commands::Extract(args) => run_extract(args).await,
        Commands::Reconcile(args) => run_reconcile(args).await,
        Commands::DictAdd(args) => run_dict_add(args),
    }
}

/// Load (or create) the configuration and apply the shared overrides
fn load_config(common: &CommonArgs) -> Result<Config> {
    if let Some(level) = &common.log_level {
        log::set_max_level(level_filter(&level.clone().into()));
    }

    if !common.config_path.exists() {
        warn!(
            "Config file not found at '{}', creating default config.",
            common.config_path.display()
        );
    }
    let mut config = Config::load_or_create(&common.config_path)
        .with_context(|| format!("Failed to load config file: {}", common.config_path.display()))?;

    if let Some(work_dir) = &common.work_dir {
        config.work_dir = work_dir.clone();
    }
    if let Some(level) = &common.log_level {
        config.log_level = level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;

    if common.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }
    Ok(config)
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if let Some(direction) = args.direction {
        config.direction = direction.into();
    }
    if args.translate_latin {
        config.preserve_latin = false;
    } else if args.keep_latin {
        config.preserve_latin = true;
    }
    if args.new_sheet {
        config.add_new_sheet = true;
    }

    let mut options = RunOptions::from_config(&config);
    options.exclusions = args.exclusions.to_lists();

    let controller = Controller::with_config(config)?;
    info!(
        "Translating {} from {} to {}",
        args.input_path.display(),
        language_utils::get_language_name(options.direction.source_code()).unwrap_or_default(),
        language_utils::get_language_name(options.direction.target_code()).unwrap_or_default()
    );

    if args.input_path.is_file() {
        let output_dir = match &args.output_dir {
            Some(dir) => dir.clone(),
            None => args.input_path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        };
        controller
            .run(args.input_path.clone(), output_dir, &options, args.force_overwrite)
            .await?;
    } else if args.input_path.is_dir() {
        controller
            .run_folder(args.input_path.clone(), &options, args.force_overwrite)
            .await?;
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", args.input_path));
    }
    Ok(())
}

async fn run_extract(args: ExtractArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let direction = args.direction.map(Direction::from).unwrap_or(config.direction);
    let prompt_path = match &args.output {
        Some(path) => path.clone(),
        None => {
            let stem = args
                .input_file
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "workbook".to_string());
            args.input_file.with_file_name(format!("{}.prompt.txt", stem))
        }
    };

    let controller = Controller::with_config(config)?;
    let token = controller
        .extract(&args.input_file, &prompt_path, direction, &args.exclusions.to_lists())
        .await?;
    println!("{}", token);
    Ok(())
}

async fn run_reconcile(args: ReconcileArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let controller = Controller::with_config(config)?;
    controller
        .reconcile(&args.token, &args.reply_file, &args.output, args.force_overwrite)
        .await
}

fn run_dict_add(args: DictAddArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let path = config.custom_dictionary_path();
    translation::dictionary::add_custom_translation(
        &path,
        args.direction.into(),
        &args.category,
        &args.source,
        &args.target,
    )?;
    info!("Added '{}' -> '{}' to {}", args.source, args.target, path.display());
    Ok(())
}
