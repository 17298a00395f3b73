use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "scriptbox")]
#[command(about = "Run Rhai scripts inside a configured sandbox")]
pub(crate) struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long = "log-json", global = true)]
    pub(crate) log_json: bool,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Run a script file and print its bindings.
    Run(RunArgs),
    /// Start an interactive session.
    Repl(ReplArgs),
}

#[derive(Debug, Args)]
pub(crate) struct BoxArgs {
    #[arg(long = "name", default_value = "scriptbox")]
    pub(crate) name: String,
    /// One of: none, safe, network, full.
    #[arg(long = "module-set", default_value = "")]
    pub(crate) module_set: String,
    #[arg(long = "module")]
    pub(crate) modules: Vec<String>,
    /// Directory of `.rhai` module scripts for `import`.
    #[arg(long = "module-dir")]
    pub(crate) module_dir: Option<String>,
    /// Global variable as `key=json`; values that are not JSON become strings.
    #[arg(long = "var")]
    pub(crate) vars: Vec<String>,
    #[arg(long = "struct-tag")]
    pub(crate) struct_tag: Option<String>,
    #[arg(long = "max-operations")]
    pub(crate) max_operations: Option<u64>,
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    pub(crate) script: String,
    #[command(flatten)]
    pub(crate) sandbox: BoxArgs,
    #[arg(long = "timeout-ms")]
    pub(crate) timeout_ms: Option<u64>,
    /// Open an interactive session after the run.
    #[arg(long = "inspect")]
    pub(crate) inspect: bool,
}

#[derive(Debug, Args)]
pub(crate) struct ReplArgs {
    #[command(flatten)]
    pub(crate) sandbox: BoxArgs,
}
