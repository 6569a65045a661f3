// ledgergrid CLI - ledger reconciliation services from the shell

mod exit_codes;
mod run;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use ledgergrid_config::Settings;
use ledgergrid_recon::{self as recon, PasteRequest, RunContext, SaveMode, UpdateOptions, Verdict};

use exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_RECONCILIATION, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "lgrid")]
#[command(about = "Reconcile ledger workbooks against their subject sheets")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, env = "LGRID_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare ledger balances with the subject sheets (read-only)
    #[command(after_help = "\
Examples:
  lgrid check 科餘.xlsx --latest 11312
  lgrid check 科餘.xlsx --latest 11312 --json")]
    Check {
        /// Workbook holding the ledger and subject sheets
        file: PathBuf,

        /// Period the subject sheets are current as of (YYYMM, ROC year)
        #[arg(long)]
        latest: String,

        /// Print the verdict as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Check, then append new ledger rows to the subject sheets
    #[command(after_help = "\
Examples:
  lgrid update 科餘.xlsx --make 11401 --latest 11312
  lgrid update 科餘.xlsx --make 11401 --latest 11312 --in-place")]
    Update {
        file: PathBuf,

        /// Period being produced
        #[arg(long)]
        make: String,

        /// Period the subject sheets are current as of
        #[arg(long)]
        latest: String,

        /// Overwrite the input instead of writing <name>_updated.xlsx
        #[arg(long)]
        in_place: bool,

        #[arg(long)]
        json: bool,
    },

    /// Delete settled detail rows from the sheets the last update touched
    #[command(after_help = "\
Examples:
  lgrid delete 科餘_updated.xlsx --make 11401 --latest 11312")]
    Delete {
        file: PathBuf,

        #[arg(long)]
        make: String,

        #[arg(long)]
        latest: String,

        #[arg(long)]
        json: bool,
    },

    /// Paste the monthly source reports into the master workbook
    #[command(after_help = "\
Examples:
  lgrid paste 科餘.xlsx --input-root D:/reports --make 11312 --vendor A01
  lgrid paste 科餘.xlsx --make 11312        (root and vendor from settings)")]
    Paste {
        /// Master workbook receiving the reports (saved in place)
        master: PathBuf,

        /// Folder holding the <MM>月 report folders [default: paste.input_root]
        #[arg(long)]
        input_root: Option<PathBuf>,

        #[arg(long)]
        make: String,

        /// Vendor prefix for report files [default: paste.vendor_id]
        #[arg(long)]
        vendor: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Run paste, update and delete in sequence; type `stop` to cancel
    #[command(after_help = "\
Examples:
  lgrid run 科餘.xlsx --make 11401 --latest 11312
  lgrid run 科餘.xlsx --make 11401 --latest 11312 --paste --update --vendor A01

Without --paste/--update/--delete the [modules] section of the settings
file decides which tasks run.")]
    Run(run::RunArgs),

    /// Show the settings file location and the effective settings
    Config,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Loaded settings plus where they came from, for hints.
pub struct Config {
    pub settings: Settings,
    pub path: String,
}

impl Config {
    fn load(explicit: Option<&Path>) -> Self {
        match explicit {
            Some(path) => Self {
                settings: Settings::load_from(path),
                path: path.display().to_string(),
            },
            None => Self {
                settings: Settings::load(),
                path: Settings::config_path_display(),
            },
        }
    }
}

fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());
    init_logging(&config.settings.log.level);
    log::debug!("settings: {}", config.path);

    let result = match cli.command {
        None => {
            // No subcommand = show usage
            eprintln!("Usage: lgrid <command> [options]");
            eprintln!("       lgrid --help for more information");
            Ok(())
        }
        Some(Commands::Check { file, latest, json }) => cmd_check(file, latest, json),
        Some(Commands::Update { file, make, latest, in_place, json }) => {
            cmd_update(file, make, latest, in_place, json, &config)
        }
        Some(Commands::Delete { file, make, latest, json }) => cmd_delete(file, make, latest, json),
        Some(Commands::Paste { master, input_root, make, vendor, json }) => {
            cmd_paste(master, input_root, make, vendor, json, &config)
        }
        Some(Commands::Run(args)) => run::cmd_run(args, &config),
        Some(Commands::Config) => cmd_config(&config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<recon::Error> for CliError {
    fn from(err: recon::Error) -> Self {
        let code = recon_exit_code(&err);
        match err {
            recon::Error::Reconciliation(verdict) => Self::new(code, describe_verdict(&verdict))
                .with_hint("fix the listed subject sheets, then rerun `lgrid check`"),
            recon::Error::Cancelled(msg) => Self::new(code, msg),
            other => Self::new(code, other.to_string()),
        }
    }
}

/// Verdict message followed by one line per non-empty detail list.
fn describe_verdict(verdict: &Verdict) -> String {
    let mut out = verdict.message.clone();
    let d = &verdict.details;
    for (label, items) in [
        ("inconsistent", &d.inconsistent),
        ("zero balance but kept", &d.zero_items_but_kept),
        ("invalid names", &d.invalid_items),
    ] {
        if !items.is_empty() {
            out.push_str(&format!("\n  {label}: {}", items.join(", ")));
        }
    }
    out
}

fn require_file(path: &Path) -> Result<(), CliError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::args(format!("file not found: {}", path.display())))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
    println!("{text}");
    Ok(())
}

// ============================================================================
// check
// ============================================================================

fn cmd_check(file: PathBuf, latest: String, json: bool) -> Result<(), CliError> {
    require_file(&file)?;
    let verdict = recon::check_file(&file, &latest, &RunContext::default())?;

    if json {
        print_json(&verdict)?;
    }
    if verdict.is_success() {
        if !json {
            println!("{}", verdict.message);
        }
        Ok(())
    } else if json {
        Err(CliError::new(EXIT_RECONCILIATION, verdict.message))
    } else {
        Err(CliError::new(EXIT_RECONCILIATION, describe_verdict(&verdict)))
    }
}

// ============================================================================
// update
// ============================================================================

fn cmd_update(
    file: PathBuf,
    make: String,
    latest: String,
    in_place: bool,
    json: bool,
    config: &Config,
) -> Result<(), CliError> {
    require_file(&file)?;
    let save_mode = if in_place || config.settings.files.overwrite {
        SaveMode::InPlace
    } else {
        SaveMode::Suffixed
    };

    let report = recon::update_file(&file, &make, &latest, UpdateOptions { save_mode }, &RunContext::default())?;

    if json {
        return print_json(&report);
    }
    let outcome = &report.outcome;
    println!(
        "copied {} rows into {} sheets",
        outcome.rows_copied,
        outcome.touched_sheets.len()
    );
    if !outcome.created_sheets.is_empty() {
        println!("created: {}", outcome.created_sheets.join(", "));
    }
    println!("saved:   {}", report.saved_to.display());
    Ok(())
}

// ============================================================================
// delete
// ============================================================================

fn cmd_delete(file: PathBuf, make: String, latest: String, json: bool) -> Result<(), CliError> {
    require_file(&file)?;
    let summary = recon::delete_file(&file, &make, &latest, &RunContext::default())?;

    if json {
        return print_json(&summary);
    }
    println!("{}", summary.message);
    if !summary.skipped_sheets.is_empty() {
        println!("skipped: {}", summary.skipped_sheets.join(", "));
    }
    Ok(())
}

// ============================================================================
// paste
// ============================================================================

/// Fill paste inputs missing from the command line from settings.
pub fn paste_inputs(
    input_root: Option<PathBuf>,
    vendor: Option<String>,
    config: &Config,
) -> Result<(PathBuf, String), CliError> {
    let input_root = input_root
        .or_else(|| config.settings.paste.input_root.clone())
        .ok_or_else(|| {
            CliError::args("no report folder given")
                .with_hint(format!("pass --input-root or set paste.input_root in {}", config.path))
        })?;
    let vendor = vendor
        .unwrap_or_else(|| config.settings.paste.vendor_id.clone())
        .trim()
        .to_string();
    if vendor.is_empty() {
        return Err(CliError::args("no vendor id given")
            .with_hint(format!("pass --vendor or set paste.vendor_id in {}", config.path)));
    }
    Ok((input_root, vendor))
}

fn cmd_paste(
    master: PathBuf,
    input_root: Option<PathBuf>,
    make: String,
    vendor: Option<String>,
    json: bool,
    config: &Config,
) -> Result<(), CliError> {
    let (input_root, vendor) = paste_inputs(input_root, vendor, config)?;
    require_file(&master)?;

    let req = PasteRequest { input_root, make, vendor, master };
    let summary = recon::paste_file(&req, &RunContext::default())?;

    if json {
        return print_json(&summary);
    }
    println!("{}", summary.message);
    if !summary.tasks_skipped.is_empty() {
        println!("skipped: {}", summary.tasks_skipped.join(", "));
    }
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config(config: &Config) -> Result<(), CliError> {
    eprintln!("settings: {}", config.path);
    print_json(&config.settings)
}
