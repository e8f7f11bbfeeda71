//! Purpose: Hold top-level CLI command dispatch for `fiscaldata`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Read commands never write the backing file.
//! Invariants: An absent id is reported as `NotFound` (exit code 3) only here.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    data_file: PathBuf,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "fiscaldata", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::List { limit, json } => {
            let mut client = open_client(data_file)?;
            emit_warnings(&mut client, "list", color_mode);
            let total = client.records().len();
            let view = client
                .records()
                .iter()
                .take(limit.unwrap_or(total))
                .collect::<Vec<_>>();
            emit_records(&view, total, json);
            Ok(RunOutcome::ok())
        }
        Command::Show { id, json } => {
            let mut client = open_client(data_file)?;
            emit_warnings(&mut client, "show", color_mode);
            let record = client
                .get_by_id(&id)?
                .ok_or_else(|| missing_record_error(&id))?;
            emit_record(record, json);
            Ok(RunOutcome::ok())
        }
        Command::Insert { set, json } => {
            let fields = parse_assignments(&set)?;
            let mut client = open_client(data_file)?;
            emit_warnings(&mut client, "load", color_mode);
            let record = client.insert(&fields)?.clone();
            emit_warnings(&mut client, "insert", color_mode);
            if wants_json(json) {
                emit_json(json!({ "inserted": record_json(&record) }));
            } else {
                println!("Inserted record {}.", record.id);
            }
            Ok(RunOutcome::ok())
        }
        Command::Update { id, set, json } => {
            let updates = parse_assignments(&set)?;
            let mut client = open_client(data_file)?;
            emit_warnings(&mut client, "load", color_mode);
            if !client.update(&id, &updates)? {
                return Err(missing_record_error(&id));
            }
            emit_warnings(&mut client, "update", color_mode);
            // `_id` itself may have been edited.
            let lookup = updates
                .iter()
                .find(|(name, _)| Column::from_name(name) == Some(Column::Id))
                .map(|(_, value)| value.clone())
                .unwrap_or(id);
            let record = client
                .get_by_id(&lookup)?
                .ok_or_else(|| missing_record_error(&lookup))?;
            if wants_json(json) {
                emit_json(json!({ "updated": record_json(record) }));
            } else {
                println!("Updated record {}.", record.id);
            }
            Ok(RunOutcome::ok())
        }
        Command::Delete { id, json } => {
            let mut client = open_client(data_file)?;
            emit_warnings(&mut client, "load", color_mode);
            if !client.delete(&id)? {
                return Err(missing_record_error(&id));
            }
            if wants_json(json) {
                let deleted = id.trim().parse::<i64>().ok();
                emit_json(json!({ "deleted": { "id": deleted } }));
            } else {
                println!("Deleted record {}.", id.trim());
            }
            Ok(RunOutcome::ok())
        }
        Command::Sort { by, limit, json } => {
            let mut client = open_client(data_file)?;
            emit_warnings(&mut client, "sort", color_mode);
            let keys = by
                .iter()
                .map(|key| SortKey::parse(key))
                .collect::<Result<Vec<_>, Error>>()?;
            let mut view = client.sort_by_keys(&keys);
            let total = view.len();
            view.truncate(limit.unwrap_or(total));
            emit_records(&view, total, json);
            Ok(RunOutcome::ok())
        }
        Command::Export { path, json } => {
            let mut client = open_client(data_file)?;
            emit_warnings(&mut client, "export", color_mode);
            client.export(&path)?;
            let count = client.records().len();
            if wants_json(json) {
                emit_json(
                    json!({
                        "exported": {
                            "path": path.display().to_string(),
                            "count": count,
                        }
                    }),
                );
            } else {
                println!("Exported {count} records to {}.", path.display());
            }
            Ok(RunOutcome::ok())
        }
        Command::Shell => {
            let mut client = DataClient::new(data_file);
            let stdin = io::stdin();
            let stdout = io::stdout();
            shell::run_shell(&mut client, stdin.lock(), stdout.lock())?;
            Ok(RunOutcome::ok())
        }
    }
}
