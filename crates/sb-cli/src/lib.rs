use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sb_api::{Bindings, ModuleSetName, ScriptBox};
use sb_core::BoxError;
use sb_runtime::Limits;
use tracing_subscriber::EnvFilter;

mod cli_args;
mod error_map;
mod source_loader;

pub(crate) use cli_args::{BoxArgs, Cli, Mode, ReplArgs, RunArgs};
pub(crate) use error_map::{emit_error, map_cli_output, map_cli_source_path, map_cli_source_read};
pub(crate) use source_loader::{load_module_dir, parse_var, read_script_file};
#[cfg(test)]
pub(crate) use source_loader::resolve_source_path;

/// Environment variable holding the log filter, e.g. `SCRIPTBOX_LOG=debug`.
pub const LOG_ENV: &str = "SCRIPTBOX_LOG";

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    init_tracing(cli.log_json);
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    if installed.is_err() {
        tracing::trace!("tracing subscriber already installed");
    }
}

fn run(cli: Cli) -> Result<i32, BoxError> {
    match cli.command {
        Mode::Run(args) => run_script(args),
        Mode::Repl(args) => run_repl(args),
    }
}

pub(crate) fn build_box(args: &BoxArgs) -> Result<ScriptBox, BoxError> {
    let sandbox = ScriptBox::new(args.name.clone());
    sandbox.set_module_set(ModuleSetName::new(args.module_set.clone()));
    if !args.modules.is_empty() {
        sandbox.add_named_modules(args.modules.iter().cloned());
    }
    if let Some(tag) = &args.struct_tag {
        sandbox.set_struct_tag(tag);
    }
    if let Some(operations) = args.max_operations {
        sandbox.set_limits(Limits::default().with_max_operations(operations));
    }
    if let Some(dir) = &args.module_dir {
        sandbox.set_fs(Arc::new(load_module_dir(dir)?));
    }
    for raw in &args.vars {
        let (key, value) = parse_var(raw)?;
        sandbox.add_key_value(key, value);
    }
    Ok(sandbox)
}

fn run_script(args: RunArgs) -> Result<i32, BoxError> {
    if args.inspect && args.timeout_ms.is_some() {
        return Err(BoxError::new(
            "CLI_ARGS",
            "--inspect cannot be combined with --timeout-ms",
        ));
    }
    let script = read_script_file(&args.script)?;
    let sandbox = build_box(&args.sandbox)?;
    let bindings = match args.timeout_ms {
        Some(ms) => sandbox.run_timeout(&script, Duration::from_millis(ms))?,
        None if args.inspect => sandbox.run_inspect(&script)?,
        None => sandbox.run(&script)?,
    };
    let tag = args.sandbox.struct_tag.as_deref().unwrap_or(sb_api::DEFAULT_STRUCT_TAG);
    emit_bindings(&bindings, tag)?;
    Ok(0)
}

fn run_repl(args: ReplArgs) -> Result<i32, BoxError> {
    let sandbox = build_box(&args.sandbox)?;
    sandbox.repl()?;
    Ok(0)
}

pub(crate) fn bindings_json(bindings: &Bindings, tag: &str) -> Result<String, BoxError> {
    let object: serde_json::Map<String, serde_json::Value> = bindings
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json(tag)))
        .collect();
    serde_json::to_string(&object).map_err(map_cli_output)
}

fn emit_bindings(bindings: &Bindings, tag: &str) -> Result<(), BoxError> {
    let payload = bindings_json(bindings, tag)?;
    println!("RESULT:OK");
    println!("BINDINGS_JSON:{}", payload);
    Ok(())
}

#[cfg(test)]
mod tests;
