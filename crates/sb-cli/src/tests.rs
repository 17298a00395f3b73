use super::*;
use sb_core::SbValue;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("scriptbox-rs-{}-{}", name, nanos))
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn box_args(extra: &[&str]) -> BoxArgs {
    let mut argv = vec!["scriptbox", "repl"];
    argv.extend_from_slice(extra);
    match Cli::try_parse_from(argv).expect("args should parse").command {
        Mode::Repl(args) => args.sandbox,
        Mode::Run(_) => panic!("expected repl mode"),
    }
}

#[test]
fn resolve_source_path_checks_existence_and_kind() {
    let missing = temp_path("missing");
    let error = resolve_source_path(missing.to_string_lossy().as_ref(), false)
        .expect_err("missing path should fail");
    assert_eq!(error.code, "CLI_SOURCE_NOT_FOUND");

    let file = temp_path("plain-file.rhai");
    write_file(&file, "let x = 1;");
    let error = resolve_source_path(file.to_string_lossy().as_ref(), true)
        .expect_err("file is not a dir");
    assert_eq!(error.code, "CLI_SOURCE_NOT_DIR");

    let dir = temp_path("plain-dir");
    fs::create_dir_all(&dir).expect("dir");
    let error = resolve_source_path(dir.to_string_lossy().as_ref(), false)
        .expect_err("dir is not a file");
    assert_eq!(error.code, "CLI_SOURCE_NOT_FILE");

    let resolved = resolve_source_path(file.to_string_lossy().as_ref(), false)
        .expect("file should resolve");
    assert!(resolved.is_absolute());
}

#[test]
fn parse_var_reads_json_and_falls_back_to_string() {
    let (key, value) = parse_var("count=3").expect("int var");
    assert_eq!(key, "count");
    assert_eq!(value, SbValue::Int(3));

    let (_, value) = parse_var("name=Kai").expect("plain string");
    assert_eq!(value, SbValue::String("Kai".to_string()));

    let (_, value) = parse_var("list=[1,2]").expect("json array");
    assert_eq!(value, SbValue::Array(vec![SbValue::Int(1), SbValue::Int(2)]));

    let (_, value) = parse_var("empty=").expect("empty value");
    assert_eq!(value, SbValue::String(String::new()));

    assert_eq!(parse_var("novalue").expect_err("no =").code, "CLI_VAR_INVALID");
    assert_eq!(parse_var("1x=2").expect_err("bad key").code, "CLI_VAR_INVALID");
    assert_eq!(parse_var("=2").expect_err("empty key").code, "CLI_VAR_INVALID");
}

#[test]
fn build_box_applies_vars_and_module_set() {
    let args = box_args(&[
        "--name",
        "cli-test",
        "--module-set",
        "safe",
        "--var",
        "base=40",
        "--var",
        "who=Leilani",
    ]);
    let sandbox = build_box(&args).expect("box should build");
    assert_eq!(sandbox.name(), "cli-test");
    let out = sandbox
        .run("let total = base + 2; let greeting = `hi ${who}`; let p = math::pow(2.0, 3.0);")
        .expect("script should run");
    assert_eq!(out.get("total"), Some(&SbValue::Int(42)));
    assert_eq!(
        out.get("greeting"),
        Some(&SbValue::String("hi Leilani".to_string()))
    );
    assert_eq!(out.get("p"), Some(&SbValue::Float(8.0)));
}

#[test]
fn build_box_loads_module_dir() {
    let dir = temp_path("module-dir");
    write_file(&dir.join("helper.rhai"), "export const answer = 42;");
    let dir_arg = dir.to_string_lossy().to_string();
    let args = box_args(&["--module-dir", &dir_arg]);
    let sandbox = build_box(&args).expect("box should build");
    let out = sandbox
        .run("import \"helper\" as h; let v = h::answer;")
        .expect("import should resolve");
    assert_eq!(out.get("v"), Some(&SbValue::Int(42)));
}

#[test]
fn build_box_rejects_bad_var_and_missing_dir() {
    let error = build_box(&box_args(&["--var", "oops"])).expect_err("bad var");
    assert_eq!(error.code, "CLI_VAR_INVALID");

    let missing = temp_path("no-modules").to_string_lossy().to_string();
    let error = build_box(&box_args(&["--module-dir", &missing])).expect_err("missing dir");
    assert_eq!(error.code, "CLI_SOURCE_NOT_FOUND");
}

#[test]
fn unknown_module_set_surfaces_on_run() {
    let sandbox = build_box(&box_args(&["--module-set", "everything"])).expect("build is lazy");
    let error = sandbox.run("let x = 1;").expect_err("unknown set should fail");
    assert_eq!(error.code, "BOX_MODULE_SET_UNKNOWN");
}

#[test]
fn bindings_json_uses_struct_tag() {
    let mut bindings = Bindings::new();
    bindings.insert("n".to_string(), SbValue::Int(7));
    bindings.insert(
        "person".to_string(),
        SbValue::Record(
            sb_core::Record::new("Person").tagged_field("Nick", "Kai", &[("json", "nick")]),
        ),
    );
    let payload = bindings_json(&bindings, "json").expect("json should encode");
    let parsed: serde_json::Value = serde_json::from_str(&payload).expect("valid json");
    assert_eq!(parsed, serde_json::json!({"n": 7, "person": {"nick": "Kai"}}));
}

#[test]
fn run_cli_reports_exit_codes() {
    let script = temp_path("ok.rhai");
    write_file(&script, "let x = 1 + 1;");
    let script_arg = script.to_string_lossy().to_string();
    assert_eq!(run_cli_from_args(["scriptbox", "run", script_arg.as_str()]), 0);

    let broken = temp_path("broken.rhai");
    write_file(&broken, "let x = ;");
    let broken_arg = broken.to_string_lossy().to_string();
    assert_eq!(run_cli_from_args(["scriptbox", "run", broken_arg.as_str()]), 1);

    assert_eq!(
        run_cli_from_args([
            "scriptbox",
            "run",
            script_arg.as_str(),
            "--inspect",
            "--timeout-ms",
            "10",
        ]),
        1
    );
    assert_ne!(run_cli_from_args(["scriptbox", "bogus"]), 0);
}
