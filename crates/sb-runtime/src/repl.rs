use std::io::{BufRead, Write};

use sb_core::BoxError;

use crate::bridge::dynamic_to_json;
use crate::machine::Machine;

pub const REPL_PROMPT: &str = ">>> ";
pub const REPL_CONTINUE_PROMPT: &str = "... ";
const REPL_COMMANDS: &str = "commands: :help :vars :quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplAction {
    Continue,
    Quit,
    NotHandled,
}

fn map_repl_io(error: std::io::Error) -> BoxError {
    BoxError::new("REPL_IO", format!("repl io failed: {}", error))
}

/// Writes `prefix` and reads one line; `None` at end of input.
pub fn prompt_input_from(
    prefix: &str,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<Option<String>, BoxError> {
    write!(writer, "{}", prefix).map_err(map_repl_io)?;
    writer.flush().map_err(map_repl_io)?;
    let mut input = String::new();
    if reader.read_line(&mut input).map_err(map_repl_io)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

fn handle_repl_command(
    raw: &str,
    machine: &Machine,
    writer: &mut dyn Write,
) -> Result<ReplAction, BoxError> {
    match raw.trim() {
        ":help" => {
            writeln!(writer, "{}", REPL_COMMANDS).map_err(map_repl_io)?;
            writeln!(writer, "end a line with \\ to continue it").map_err(map_repl_io)?;
            Ok(ReplAction::Continue)
        }
        ":vars" => {
            for (name, value) in machine.bindings() {
                writeln!(writer, "{} = {}", name, value.to_json(machine.struct_tag()))
                    .map_err(map_repl_io)?;
            }
            Ok(ReplAction::Continue)
        }
        ":quit" | ":exit" => Ok(ReplAction::Quit),
        _ => Ok(ReplAction::NotHandled),
    }
}

/// Reads snippets until end of input or `:quit`, evaluating each against the
/// machine's scope. Script errors are reported and the loop goes on.
pub fn run_repl_with_io(
    machine: &mut Machine,
    banner: &str,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<(), BoxError> {
    machine.prepare()?;
    if !banner.is_empty() {
        writeln!(writer, "{}", banner).map_err(map_repl_io)?;
    }
    writeln!(writer, "{}", REPL_COMMANDS).map_err(map_repl_io)?;

    let mut pending = String::new();
    loop {
        let prefix = if pending.is_empty() {
            REPL_PROMPT
        } else {
            REPL_CONTINUE_PROMPT
        };
        let Some(raw) = prompt_input_from(prefix, reader, writer)? else {
            writeln!(writer).map_err(map_repl_io)?;
            break;
        };

        if pending.is_empty() {
            match handle_repl_command(&raw, machine, writer)? {
                ReplAction::Continue => continue,
                ReplAction::Quit => break,
                ReplAction::NotHandled => {}
            }
        }
        if let Some(head) = raw.strip_suffix('\\') {
            pending.push_str(head);
            pending.push('\n');
            continue;
        }
        pending.push_str(&raw);
        let snippet = std::mem::take(&mut pending);
        if snippet.trim().is_empty() {
            continue;
        }

        match machine.eval(&snippet) {
            Ok(value) if value.is_unit() => {}
            Ok(value) => {
                let text = if value.is_string() {
                    format!("{:?}", value.to_string())
                } else if value.is_array() || value.is_map() {
                    dynamic_to_json(value).to_string()
                } else {
                    value.to_string()
                };
                writeln!(writer, "{}", text).map_err(map_repl_io)?;
            }
            Err(error) => {
                tracing::debug!(box_name = machine.name(), code = %error.code, "repl snippet failed");
                writeln!(writer, "error: {}", error).map_err(map_repl_io)?;
            }
        }
    }
    Ok(())
}
