//! Purpose: Run the numbered interactive menu over a line-oriented reader/writer pair.
//! Exports: `run_shell`.
//! Role: Interactive front end for `DataClient` (display, reload, create, edit, delete, sort).
//! Invariants: Operation errors are reported and the menu continues; only I/O errors end it.
//! Invariants: EOF on input exits cleanly, the same as choosing exit.
//! Invariants: Date warnings are printed after the action that produced them.

use std::io::{BufRead, Write};

use fiscaldata::api::{Column, DataClient, Error, ErrorKind, Fields, HEADER};

const MENU: &str = "\
1) Display records
2) Reload from file
3) Create record
4) Edit record
5) Delete record
6) Sort records
7) Exit";

pub(crate) fn run_shell<R: BufRead, W: Write>(
    client: &mut DataClient,
    mut input: R,
    mut output: W,
) -> Result<(), Error> {
    attempt(&mut output, client.load().map(|records| records.len()))?;
    flush_warnings(client, &mut output)?;

    loop {
        write_line(&mut output, MENU)?;
        let Some(choice) = prompt(&mut input, &mut output, "Select an option: ")? else {
            return Ok(());
        };
        let flow = match choice.trim() {
            "1" => display(client, &mut output)?,
            "2" => {
                if let Some(count) =
                    attempt(&mut output, client.reload().map(|records| records.len()))?
                {
                    write_line(&mut output, &format!("Reloaded {count} records."))?;
                }
                Flow::Continue
            }
            "3" => create(client, &mut input, &mut output)?,
            "4" => edit(client, &mut input, &mut output)?,
            "5" => delete(client, &mut input, &mut output)?,
            "6" => sort(client, &mut input, &mut output)?,
            "7" => Flow::Closed,
            "" => Flow::Continue,
            other => {
                write_line(&mut output, &format!("Unknown option {other:?}."))?;
                Flow::Continue
            }
        };
        flush_warnings(client, &mut output)?;
        if flow == Flow::Closed {
            return Ok(());
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Flow {
    Continue,
    Closed,
}

// Unwraps a prompt answer; EOF in the middle of an action ends the session.
macro_rules! answer {
    ($line:expr) => {
        match $line {
            Some(line) => line,
            None => return Ok(Flow::Closed),
        }
    };
}

fn display<W: Write>(client: &DataClient, output: &mut W) -> Result<Flow, Error> {
    if client.records().is_empty() {
        write_line(output, "No records.")?;
        return Ok(Flow::Continue);
    }
    for record in client.records() {
        write_line(output, &record.to_string())?;
    }
    Ok(Flow::Continue)
}

fn create<R: BufRead, W: Write>(
    client: &mut DataClient,
    input: &mut R,
    output: &mut W,
) -> Result<Flow, Error> {
    let mut fields = Fields::new();
    // No default to offer once the largest id is i64::MAX.
    let next = client.next_id().ok();
    for name in HEADER {
        let label = match next {
            Some(next) if name == Column::Id.name() => format!("{name} (blank for {next}): "),
            _ => format!("{name}: "),
        };
        let value = answer!(prompt(input, output, &label)?);
        if name == Column::Id.name() && value.trim().is_empty() {
            continue;
        }
        fields.insert(name.to_string(), value);
    }
    if let Some(id) = attempt(output, client.insert(&fields).map(|record| record.id))? {
        write_line(output, &format!("Created record {id}."))?;
    }
    Ok(Flow::Continue)
}

fn edit<R: BufRead, W: Write>(
    client: &mut DataClient,
    input: &mut R,
    output: &mut W,
) -> Result<Flow, Error> {
    let id = answer!(prompt(input, output, "Record id: ")?);
    match attempt(output, client.get_by_id(&id).map(|found| found.is_some()))? {
        Some(true) => {}
        Some(false) => {
            write_line(output, &format!("No record with id {}.", id.trim()))?;
            return Ok(Flow::Continue);
        }
        None => return Ok(Flow::Continue),
    }

    write_line(output, "Enter Column=value lines; a blank line finishes.")?;
    let mut updates = Fields::new();
    loop {
        let line = answer!(prompt(input, output, "> ")?);
        if line.trim().is_empty() {
            break;
        }
        match line.split_once('=') {
            Some((name, value)) => {
                updates.insert(name.trim().to_string(), value.to_string());
            }
            None => write_line(output, "Expected Column=value.")?,
        }
    }
    match attempt(output, client.update(&id, &updates))? {
        Some(true) => write_line(output, &format!("Updated record {}.", id.trim()))?,
        Some(false) => write_line(output, &format!("No record with id {}.", id.trim()))?,
        None => {}
    }
    Ok(Flow::Continue)
}

fn delete<R: BufRead, W: Write>(
    client: &mut DataClient,
    input: &mut R,
    output: &mut W,
) -> Result<Flow, Error> {
    let id = answer!(prompt(input, output, "Record id: ")?);
    match attempt(output, client.delete(&id))? {
        Some(true) => write_line(output, &format!("Deleted record {}.", id.trim()))?,
        Some(false) => write_line(output, &format!("No record with id {}.", id.trim()))?,
        None => {}
    }
    Ok(Flow::Continue)
}

fn sort<R: BufRead, W: Write>(
    client: &mut DataClient,
    input: &mut R,
    output: &mut W,
) -> Result<Flow, Error> {
    let columns = split_list(&answer!(prompt(input, output, "Columns (comma separated): ")?));
    let orders = split_list(&answer!(prompt(
        input,
        output,
        "Orders, asc or desc (comma separated): "
    )?));
    let lines = client.sort(&columns, &orders).map(|view| {
        view.iter()
            .map(|record| record.to_string())
            .collect::<Vec<_>>()
    });
    if let Some(lines) = attempt(output, lines)? {
        for line in lines {
            write_line(output, &line)?;
        }
    }
    Ok(Flow::Continue)
}

fn split_list(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> Result<Option<String>, Error> {
    output
        .write_all(label.as_bytes())
        .and_then(|()| output.flush())
        .map_err(console_error)?;
    let mut line = String::new();
    let read = input.read_line(&mut line).map_err(console_error)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Reports an operation error to the user instead of ending the session.
/// The outer `Result` carries console failures only.
fn attempt<T, W: Write>(output: &mut W, result: Result<T, Error>) -> Result<Option<T>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            let message = err.message().unwrap_or("operation failed");
            write_line(output, &format!("error: {message}"))?;
            if let Some(hint) = err.hint() {
                write_line(output, &format!("hint: {hint}"))?;
            }
            Ok(None)
        }
    }
}

fn flush_warnings<W: Write>(client: &mut DataClient, output: &mut W) -> Result<(), Error> {
    for warning in client.take_warnings() {
        write_line(output, &format!("warning: {}", warning.message()))?;
    }
    Ok(())
}

fn write_line<W: Write>(output: &mut W, line: &str) -> Result<(), Error> {
    writeln!(output, "{line}").map_err(console_error)
}

fn console_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message("shell console i/o failed")
        .with_source(err)
}
