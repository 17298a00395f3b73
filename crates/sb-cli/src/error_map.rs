use sb_core::BoxError;
use std::fmt::Display;

fn map_error(code: &'static str, error: impl Display) -> BoxError {
    BoxError::new(code, error.to_string())
}

/// The `RESULT:ERROR` block; the message line is a JSON string literal.
fn error_report(error: &BoxError) -> String {
    let message = serde_json::Value::String(error.message.clone());
    format!(
        "RESULT:ERROR\nERROR_CODE:{}\nERROR_MSG_JSON:{}",
        error.code, message
    )
}

pub(crate) fn emit_error(error: BoxError) -> i32 {
    println!("{}", error_report(&error));
    1
}

pub(crate) fn map_cli_source_path(error: std::io::Error) -> BoxError {
    map_error("CLI_SOURCE_PATH", error)
}

pub(crate) fn map_cli_source_read(error: std::io::Error) -> BoxError {
    map_error("CLI_SOURCE_READ", error)
}

pub(crate) fn map_cli_output(error: serde_json::Error) -> BoxError {
    map_error("CLI_OUTPUT", error)
}

#[cfg(test)]
mod error_map_tests {
    use super::*;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(BoxError::new("ERR", "failed"));
        assert_eq!(code, 1);
    }

    #[test]
    fn error_report_escapes_the_message() {
        let report = error_report(&BoxError::new(
            "ENGINE_EVAL_ERROR",
            "bad \"quote\"\nat line 2",
        ));
        let lines = report.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "RESULT:ERROR");
        assert_eq!(lines[1], "ERROR_CODE:ENGINE_EVAL_ERROR");
        let payload = lines[2].strip_prefix("ERROR_MSG_JSON:").expect("message line");
        let message: String = serde_json::from_str(payload).expect("json string");
        assert_eq!(message, "bad \"quote\"\nat line 2");
    }

    #[test]
    fn mapping_helpers_keep_error_codes() {
        assert_eq!(
            map_cli_source_path(std::io::Error::other("path")).code,
            "CLI_SOURCE_PATH"
        );
        assert_eq!(
            map_cli_source_read(std::io::Error::other("read")).code,
            "CLI_SOURCE_READ"
        );
        let json_error = serde_json::from_str::<serde_json::Value>("{").expect_err("bad json");
        assert_eq!(map_cli_output(json_error).code, "CLI_OUTPUT");
    }
}
