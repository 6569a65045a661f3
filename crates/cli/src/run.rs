//! `lgrid run` — the selected services in sequence on a worker thread.
//!
//! Every task works on the same workbook. When update writes an
//! `_updated` copy, later tasks follow it to that copy. Typing `stop` on
//! stdin cancels at the next service checkpoint; the first failure stops
//! the run.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;

use clap::Args;

use ledgergrid_recon::{self as recon, period, CancelToken, LogSink, PasteRequest, RunContext, SaveMode, UpdateOptions};

use crate::exit_codes::EXIT_ERROR;
use crate::{paste_inputs, require_file, CliError, Config};

#[derive(Args)]
pub struct RunArgs {
    /// Workbook every selected task operates on
    pub file: PathBuf,

    #[arg(long)]
    pub make: String,

    #[arg(long)]
    pub latest: String,

    /// Paste the monthly source reports into the workbook
    #[arg(long)]
    pub paste: bool,

    /// Check and propagate new ledger rows
    #[arg(long)]
    pub update: bool,

    /// Delete settled detail rows
    #[arg(long)]
    pub delete: bool,

    /// Report folder for --paste [default: paste.input_root]
    #[arg(long)]
    pub input_root: Option<PathBuf>,

    /// Vendor prefix for --paste [default: paste.vendor_id]
    #[arg(long)]
    pub vendor: Option<String>,

    /// Update overwrites the workbook instead of writing <name>_updated.xlsx
    #[arg(long)]
    pub in_place: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Paste { input_root: PathBuf, vendor: String },
    Update(SaveMode),
    Delete,
}

impl Task {
    pub fn label(&self) -> &'static str {
        match self {
            Task::Paste { .. } => "report paste",
            Task::Update(_) => "subject update",
            Task::Delete => "subject delete",
        }
    }
}

#[derive(Debug)]
pub struct Plan {
    pub file: PathBuf,
    pub make: String,
    pub latest: String,
    pub tasks: Vec<Task>,
}

/// Validate the arguments once, up front, and order the tasks
/// paste, update, delete.
pub fn plan(args: RunArgs, config: &Config) -> Result<Plan, CliError> {
    let explicit = args.paste || args.update || args.delete;
    let modules = &config.settings.modules;
    let (paste, update, delete) = if explicit {
        (args.paste, args.update, args.delete)
    } else {
        (modules.paste, modules.update, modules.delete)
    };
    if !(paste || update || delete) {
        return Err(CliError::args("no task selected")
            .with_hint(format!("pass --paste, --update or --delete, or enable [modules] in {}", config.path)));
    }

    period::parse(&args.make, period::MAKE_LABEL)?;
    if update || delete {
        period::parse(&args.latest, period::LATEST_LABEL)?;
    }

    let mut tasks = Vec::new();
    if paste {
        let (input_root, vendor) = paste_inputs(args.input_root, args.vendor, config)?;
        tasks.push(Task::Paste { input_root, vendor });
    }
    if update {
        let mode = if args.in_place || config.settings.files.overwrite {
            SaveMode::InPlace
        } else {
            SaveMode::Suffixed
        };
        tasks.push(Task::Update(mode));
    }
    if delete {
        tasks.push(Task::Delete);
    }

    Ok(Plan { file: args.file, make: args.make, latest: args.latest, tasks })
}

pub fn cmd_run(args: RunArgs, config: &Config) -> Result<(), CliError> {
    let plan = plan(args, config)?;
    require_file(&plan.file)?;

    let ctx = RunContext::new(LogSink::default(), CancelToken::new());
    watch_for_stop(ctx.cancel.clone());
    log::info!("type `stop` and press Enter to cancel");

    let worker = thread::Builder::new()
        .name("lgrid-run".to_string())
        .spawn(move || execute(&plan, &ctx))
        .map_err(|e| CliError::new(EXIT_ERROR, format!("cannot start worker: {e}")))?;
    worker
        .join()
        .map_err(|_| CliError::new(EXIT_ERROR, "worker thread panicked"))?
}

/// Cancel `token` when the operator types `stop`.
fn watch_for_stop(token: CancelToken) {
    let spawned = thread::Builder::new().name("lgrid-stop".to_string()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("stop") {
                log::warn!("stop requested, cancelling at the next checkpoint");
                token.cancel();
                break;
            }
        }
    });
    if let Err(e) = spawned {
        log::warn!("cannot watch stdin for stop: {e}");
    }
}

pub fn execute(plan: &Plan, ctx: &RunContext) -> Result<(), CliError> {
    let total = plan.tasks.len();
    let mut current = plan.file.clone();

    for (i, task) in plan.tasks.iter().enumerate() {
        let step = ctx
            .check("run")
            .and_then(|()| {
                log::info!("[{}/{}] {}", i + 1, total, task.label());
                run_task(task, plan, &mut current, ctx)
            });
        match step {
            Ok(message) => log::info!("{} done: {}", task.label(), message),
            Err(e) => {
                let remaining = total - i - 1;
                if remaining > 0 {
                    log::warn!("{} failed, {} later task(s) not run", task.label(), remaining);
                }
                return Err(e.into());
            }
        }
    }

    log::info!("all {} task(s) finished", total);
    Ok(())
}

fn run_task(task: &Task, plan: &Plan, current: &mut PathBuf, ctx: &RunContext) -> recon::Result<String> {
    match task {
        Task::Paste { input_root, vendor } => {
            let req = PasteRequest {
                input_root: input_root.clone(),
                make: plan.make.clone(),
                vendor: vendor.clone(),
                master: current.clone(),
            };
            Ok(recon::paste_file(&req, ctx)?.message)
        }
        Task::Update(save_mode) => {
            let options = UpdateOptions { save_mode: *save_mode };
            let report = recon::update_file(current, &plan.make, &plan.latest, options, ctx)?;
            *current = report.saved_to.clone();
            Ok(format!(
                "copied {} rows, saved {}",
                report.outcome.rows_copied,
                report.saved_to.display()
            ))
        }
        Task::Delete => Ok(recon::delete_file(current, &plan.make, &plan.latest, ctx)?.message),
    }
}
