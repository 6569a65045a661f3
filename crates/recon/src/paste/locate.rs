use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use glob::Pattern;
use regex::Regex;

use ledgergrid_io::xlsx;

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::period::{self, MAKE_LABEL};

/// Excel's lock-file prefix
const LOCK_PREFIX: &str = "~$";

/// How many offending ledger dates an error lists.
const MAX_REPORTED_DATES: usize = 5;

fn glob_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}*",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(prefix)
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| Error::Validation(format!("invalid search pattern '{pattern}': {e}")))?;
    Ok(paths
        .flatten()
        .filter(|p| p.is_file())
        .filter(|p| !file_name(p).starts_with(LOCK_PREFIX))
        .collect())
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Find the one source file for `module` in the make period's month folder.
///
/// Candidates are `<module>.*` and `<module>_*`; when there are none,
/// `<vendor>_<module>*` is tried.
pub fn find_module_file(input_root: &Path, make: &str, vendor: &str, module: &str) -> Result<PathBuf> {
    if input_root.as_os_str().is_empty() || !input_root.is_dir() {
        return Err(Error::NotFound(format!(
            "input folder does not exist: {}",
            input_root.display()
        )));
    }
    let folder = input_root.join(period::month_folder(make));
    if !folder.is_dir() {
        return Err(Error::NotFound(format!("month folder not found: {}", folder.display())));
    }

    let own_prefix = format!("{module}_");
    let mut found: Vec<PathBuf> = glob_files(&folder, module)?
        .into_iter()
        .filter(|p| {
            let stem = file_stem(p);
            stem == module || stem.starts_with(&own_prefix)
        })
        .collect();
    if found.is_empty() && !vendor.is_empty() {
        found = glob_files(&folder, &format!("{vendor}_{module}"))?;
    }
    found.sort();

    match found.len() {
        0 => Err(Error::NotFound(format!(
            "no source file for [{module}] in {}",
            folder.display()
        ))),
        1 => Ok(found.remove(0)),
        _ => Err(Error::Ambiguous(format!(
            "[{module}] matches more than one file in {}; keep exactly one:\n{}",
            folder.display(),
            found.iter().map(|p| format!("  {}", file_name(p))).collect::<Vec<_>>().join("\n")
        ))),
    }
}

fn ledger_date_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9]{3})-([0-9]{1,2})-([0-9]{1,2})").ok()).as_ref()
}

/// Whether an ROC `yyy-m-d` token lies after the given ROC year and month.
fn is_after(token: &str, year: i32, month: u32) -> bool {
    let Some(caps) = ledger_date_regex().and_then(|re| re.captures(token)) else {
        return false;
    };
    let (Ok(y), Ok(m)) = (caps[1].parse::<i32>(), caps[2].parse::<u32>()) else {
        return false;
    };
    y > year || (y == year && m > month)
}

/// Reject a ledger report whose column A has dates after the make period.
pub fn check_ledger_date_limit(path: &Path, make: &str, ctx: &RunContext) -> Result<()> {
    let (year, month) = period::roc_parts(period::parse(make, MAKE_LABEL)?);
    ctx.log(format!("checking ledger dates in {}", file_name(path)));

    let grid = xlsx::read_first_sheet_grid(path).map_err(|e| {
        Error::Content(format!("cannot read ledger dates from {}: {e}", file_name(path)))
    })?;

    let future: Vec<String> = grid
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, row)| {
            let token = row.first().map(|v| v.trimmed()).unwrap_or_default();
            is_after(&token, year, month).then(|| format!("row {}: {token}", i + 1))
        })
        .collect();

    if future.is_empty() {
        ctx.log("ledger dates are within the make period");
        return Ok(());
    }
    let mut listing = future.iter().take(MAX_REPORTED_DATES).cloned().collect::<Vec<_>>().join("\n");
    if future.len() > MAX_REPORTED_DATES {
        listing.push_str("\n...");
    }
    Err(Error::Content(format!(
        "{} has {} dates after make period {make}:\n{listing}",
        file_name(path),
        future.len()
    )))
}
