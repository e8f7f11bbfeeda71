//! Purpose: `fiscaldata` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits records on stdout.
//! Invariants: Commands emit JSON on stdout when piped or given `--json`; tables on a TTY.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All table access goes through `api::DataClient`.
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use fiscaldata::api::{
    Column, DataClient, Error, ErrorKind, Fields, Record, SortKey, to_exit_code,
};
use fiscaldata::notice::{Notice, date_warning_notice, notice_json};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod data_paths;
mod record_json;
mod shell;

use data_paths::{default_data_file, display_path};
use record_json::{record_json, records_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Internal)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Validation)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let data_file = cli.file.unwrap_or_else(default_data_file);
    let color_mode = cli.color;

    command_dispatch::dispatch_command(cli.command, data_file, color_mode)
        .map_err(add_file_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "fiscaldata",
    version,
    about = "Browse and edit the data centre availability CSV dataset",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Every command reads the whole CSV file; every change writes it back.

Mental model:
  - `list`, `show`, `sort` read records
  - `insert`, `update`, `delete` change one record and save the file
  - `shell` runs the numbered menu interactively
"#,
    after_help = r#"EXAMPLES
  $ fiscaldata list --limit 5
  $ fiscaldata show 12
  $ fiscaldata insert --set "Fiscal Year=2018-2019" --set "Value=1000"
  $ fiscaldata update 12 --set "Value=950"
  $ fiscaldata sort --by "Value:desc" --by Month

LEARN MORE
  $ fiscaldata <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Backing CSV file (default: $FISCALDATA_FILE or ./DataCentreAvailability.csv)",
        value_hint = ValueHint::FilePath
    )]
    file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Display loaded records",
        after_help = r#"EXAMPLES
  $ fiscaldata list
  $ fiscaldata list --limit 10 --json"#
    )]
    List {
        #[arg(long, help = "Show at most this many records")]
        limit: Option<usize>,
        #[arg(long, help = "Emit JSON instead of a table")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Display one record by _id",
        long_about = r#"Display one record by _id.

Exits with code 3 when no record has that id."#
    )]
    Show {
        #[arg(help = "Record _id")]
        id: String,
        #[arg(long, help = "Emit JSON instead of text")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Create a record and save the file",
        long_about = r#"Create a record and save the file.

Columns not given are left empty. `_id` is assigned as one more than the
largest existing id unless given explicitly."#,
        after_help = r#"EXAMPLES
  $ fiscaldata insert --set "Fiscal Year=2018-2019" --set "Month=April" --set "Value=12"
  $ fiscaldata insert --set "_id=500" --set "Branch=Data Centre Services""#
    )]
    Insert {
        #[arg(
            long = "set",
            value_name = "COLUMN=VALUE",
            required = true,
            help = "Column value to set (repeatable)"
        )]
        set: Vec<String>,
        #[arg(long, help = "Emit JSON instead of text")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Edit fields of a record and save the file",
        long_about = r#"Edit fields of a record and save the file.

Unknown column names are ignored. Exits with code 3 when no record has the id."#
    )]
    Update {
        #[arg(help = "Record _id")]
        id: String,
        #[arg(
            long = "set",
            value_name = "COLUMN=VALUE",
            required = true,
            help = "Column value to set (repeatable)"
        )]
        set: Vec<String>,
        #[arg(long, help = "Emit JSON instead of text")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Delete a record and save the file",
        long_about = r#"Delete a record and save the file.

Exits with code 3 when no record has the id."#
    )]
    Delete {
        #[arg(help = "Record _id")]
        id: String,
        #[arg(long, help = "Emit JSON instead of text")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Display records ordered by one or more columns",
        long_about = r#"Display records ordered by one or more columns.

Each --by takes a column name with an optional :asc or :desc suffix. Earlier
keys take precedence; rows tied on every key keep their file order. The file
itself is not reordered."#,
        after_help = r#"EXAMPLES
  $ fiscaldata sort --by "Value:desc"
  $ fiscaldata sort --by "Fiscal Year" --by "Fiscal Period:desc" --limit 20"#
    )]
    Sort {
        #[arg(
            long = "by",
            value_name = "COLUMN[:asc|:desc]",
            required = true,
            help = "Sort key, highest precedence first (repeatable)"
        )]
        by: Vec<String>,
        #[arg(long, help = "Show at most this many records")]
        limit: Option<usize>,
        #[arg(long, help = "Emit JSON instead of a table")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Write the dataset to another CSV file"
    )]
    Export {
        #[arg(help = "Destination CSV path", value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(long, help = "Emit JSON instead of text")]
        json: bool,
    },
    #[command(
        about = "Run the numbered interactive menu",
        long_about = r#"Run the numbered interactive menu on stdin/stdout.

Options: display, reload, create, edit, delete, sort, exit."#
    )]
    Shell,
    #[command(about = "Print version info")]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ fiscaldata completion bash > ~/.local/share/bash-completion/completions/fiscaldata
  $ fiscaldata completion zsh > ~/.zfunc/_fiscaldata"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

/// Parses repeated `Column=value` arguments. Only the first `=` splits.
fn parse_assignments(items: &[String]) -> Result<Fields, Error> {
    let mut fields = Fields::new();
    for item in items {
        let Some((name, value)) = item.split_once('=') else {
            return Err(Error::new(ErrorKind::Validation)
                .with_message(format!("expected COLUMN=VALUE, got {item:?}"))
                .with_hint("Quote the pair, e.g. --set \"Fiscal Year=2018-2019\"."));
        };
        fields.insert(name.trim().to_string(), value.to_string());
    }
    Ok(fields)
}

fn open_client(data_file: PathBuf) -> Result<DataClient, Error> {
    DataClient::open(data_file)
}

fn wants_json(json: bool) -> bool {
    json || !io::stdout().is_terminal()
}

fn missing_record_error(id: &str) -> Error {
    let err = Error::new(ErrorKind::NotFound).with_message("no record with this _id");
    match id.trim().parse::<i64>() {
        Ok(id) => err.with_id(id),
        Err(_) => err,
    }
}

fn emit_records(records: &[&Record], total: usize, json: bool) {
    if wants_json(json) {
        emit_json(records_json(records.iter().copied(), total));
        return;
    }
    println!("{}", records_table(records));
    if records.len() < total {
        println!("({} of {total} records)", records.len());
    }
}

fn emit_record(record: &Record, json: bool) {
    if wants_json(json) {
        emit_json(record_json(record));
    } else {
        println!("{record}");
    }
}

fn emit_warnings(client: &mut DataClient, cmd: &str, color_mode: ColorMode) {
    let file = display_path(client.path());
    let time = notice_time_now().unwrap_or_default();
    for warning in client.take_warnings() {
        emit_notice(
            &date_warning_notice(&warning, cmd, &file, time.clone()),
            color_mode,
        );
    }
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("fiscaldata {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "fiscaldata",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn add_file_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::FileAccess => err.with_hint(
            "Check the path and permissions, or point --file (or FISCALDATA_FILE) at the dataset.",
        ),
        ErrorKind::Busy => {
            err.with_hint("Another process is saving the dataset. Retry with backoff.")
        }
        ErrorKind::Malformed => {
            err.with_hint("Fix the reported line in the CSV file; nothing was loaded.")
        }
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Rerun with RUST_LOG=debug to see where it happened.",
    )
}

/// Records aligned under the CSV header, one line each. Line breaks inside a
/// cell are shown escaped; the last column is not padded.
fn records_table(records: &[&Record]) -> String {
    let header = Column::ALL.map(|column| column.name().to_string());
    let rows = records
        .iter()
        .map(|record| {
            record
                .to_row()
                .map(|cell| cell.replace('\n', "\\n").replace('\r', "\\r"))
        })
        .collect::<Vec<_>>();

    let mut widths = vec![0usize; header.len()];
    for row in std::iter::once(&header).chain(&rows) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    std::iter::once(&header)
        .chain(&rows)
        .map(|row| table_line(row, &widths))
        .collect::<Vec<_>>()
        .join("\n")
}

fn table_line(cells: &[String], widths: &[usize]) -> String {
    let last = cells.len().saturating_sub(1);
    cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (cell, &width))| {
            if idx == last {
                cell.clone()
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}

// Pretty on a terminal, one line per value when piped.
fn emit_json(value: Value) {
    let encoded = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    match encoded {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln_json(&encode_failure(&err)),
    }
}

fn eprintln_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(json) => eprintln!("{json}"),
        Err(err) => eprintln!("{}", encode_failure(&err)),
    }
}

fn encode_failure(err: &serde_json::Error) -> Value {
    json!({
        "error": {
            "kind": "Internal",
            "message": format!("json encode failed: {err}"),
        }
    })
}

const RED: &str = "31";
const YELLOW: &str = "33";

fn paint(label: &str, code: &str, enabled: bool) -> String {
    if enabled {
        format!("\u{1b}[{code}m{label}\u{1b}[0m")
    } else {
        label.to_string()
    }
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
    } else {
        eprintln_json(&error_json(err));
    }
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    time::OffsetDateTime::now_utc().format(&Rfc3339).ok()
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = paint("notice:", YELLOW, color_mode.use_color(is_tty));
        eprintln!("{label} {} (file: {})", notice.message, notice.file);
    } else {
        eprintln_json(&notice_json(notice));
    }
}

fn error_message(err: &Error) -> String {
    let fallback = match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Validation => "invalid input",
        ErrorKind::NotFound => "not found",
        ErrorKind::FileAccess => "file access failed",
        ErrorKind::Busy => "dataset file is busy",
        ErrorKind::Malformed => "malformed record",
    };
    err.message().unwrap_or(fallback).to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    std::iter::successors(err.source(), |&source| source.source())
        .map(ToString::to_string)
        .collect()
}

/// Hint, path, line, id and column, in that order, for whichever are set.
fn error_context(err: &Error) -> Vec<(&'static str, Value)> {
    let mut context = Vec::new();
    if let Some(hint) = err.hint() {
        context.push(("hint", json!(hint)));
    }
    if let Some(path) = err.path() {
        context.push(("path", json!(path.display().to_string())));
    }
    if let Some(line) = err.line() {
        context.push(("line", json!(line)));
    }
    if let Some(id) = err.id() {
        context.push(("id", json!(id)));
    }
    if let Some(column) = err.column() {
        context.push(("column", json!(column)));
    }
    context
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    for (key, value) in error_context(err) {
        inner.insert(key.to_string(), value);
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }
    json!({ "error": inner })
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        paint("error:", RED, use_color),
        error_message(err)
    )];
    for (key, value) in error_context(err) {
        let shown = match value {
            Value::String(text) => text,
            other => other.to_string(),
        };
        lines.push(format!("{} {shown}", paint(&format!("{key}:"), YELLOW, use_color)));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("{} {cause}", paint("caused by:", YELLOW, use_color)));
    }
    lines.join("\n")
}

// First non-empty line of clap's rendering, without its `error:` label.
fn clap_error_summary(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("error:").unwrap_or(line).trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

/// Points at the subcommand's own help when clap's usage line names one.
fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let cli = Cli::command();
    let subcommand = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .and_then(|usage| {
            usage
                .split_whitespace()
                .find_map(|token| cli.find_subcommand(token))
        });
    match subcommand {
        Some(sub) => format!("Try `fiscaldata {} --help`.", sub.get_name()),
        None => "Try `fiscaldata --help`.".to_string(),
    }
}
