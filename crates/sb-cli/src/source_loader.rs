use std::fs;
use std::path::PathBuf;

use sb_core::{BoxError, SbValue};
use sb_runtime::MemoryFs;

use crate::{map_cli_source_path, map_cli_source_read};

pub(crate) fn resolve_source_path(raw: &str, expect_dir: bool) -> Result<PathBuf, BoxError> {
    let path = PathBuf::from(raw);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(map_cli_source_path)?
            .join(path)
    };

    if !absolute.exists() {
        return Err(BoxError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("path does not exist: {}", absolute.display()),
        ));
    }
    if expect_dir && !absolute.is_dir() {
        return Err(BoxError::new(
            "CLI_SOURCE_NOT_DIR",
            format!("module-dir is not a directory: {}", absolute.display()),
        ));
    }
    if !expect_dir && !absolute.is_file() {
        return Err(BoxError::new(
            "CLI_SOURCE_NOT_FILE",
            format!("script is not a file: {}", absolute.display()),
        ));
    }
    Ok(absolute)
}

pub(crate) fn read_script_file(raw: &str) -> Result<String, BoxError> {
    let path = resolve_source_path(raw, false)?;
    fs::read_to_string(path).map_err(map_cli_source_read)
}

pub(crate) fn load_module_dir(raw: &str) -> Result<MemoryFs, BoxError> {
    let root = resolve_source_path(raw, true)?;
    MemoryFs::from_dir(&root)
}

/// Parses `key=value`. The value is read as JSON and falls back to a plain
/// string, so `--var name=Kai` and `--var n=3` both work.
pub(crate) fn parse_var(raw: &str) -> Result<(String, SbValue), BoxError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(BoxError::new(
            "CLI_VAR_INVALID",
            format!("expected key=value, got {:?}", raw),
        ));
    };
    let key = key.trim();
    let valid_key = key
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && key.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid_key {
        return Err(BoxError::new(
            "CLI_VAR_INVALID",
            format!("invalid variable name: {:?}", key),
        ));
    }
    let value = serde_json::from_str::<serde_json::Value>(value)
        .map(SbValue::from)
        .unwrap_or_else(|_| SbValue::String(value.to_string()));
    Ok((key.to_string(), value))
}
