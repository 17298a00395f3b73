//! Rhai-backed interpreter sessions: host bindings, module loading, shared
//! memory and the execution machine behind `ScriptBox`.

mod bridge;
mod deadline;
mod fs;
mod function;
mod http_context;
mod limits;
mod loader;
mod machine;
mod memory;
pub mod modules;
mod namespace;
mod repl;
mod resolver;

pub use bridge::{
    dynamic_to_json, dynamic_to_sbvalue, json_to_dynamic, rhai_function_symbol, sbvalue_to_dynamic,
};
pub use deadline::{Deadline, DEADLINE_TOKEN};
pub use fs::{
    script_module_name, validate_script_module_name, DirFs, MemoryFs, ModuleFs, SCRIPT_SUFFIX,
};
pub use function::{
    arg_error, expect_arity, float_arg, int_arg, register_host_function, set_module_function,
    string_arg, HostFunction, HostResult, MAX_HOST_ARITY,
};
pub use http_context::{HttpRequest, HttpResponse, RESPONSE_TYPE_NAME};
pub use limits::Limits;
pub use loader::{
    wrap_module_data, wrap_struct_data, Member, ModuleLoader, ModuleLoaderList, ModuleLoaderMap,
    ModuleMembers,
};
pub use machine::{default_print_sink, Global, Machine, PrintSink};
pub use memory::{MemoryKey, SharedMemory, MEMORY_TYPE_NAME};
pub use repl::{prompt_input_from, run_repl_with_io, REPL_CONTINUE_PROMPT, REPL_PROMPT};

pub use rhai::{Dynamic, EvalAltResult};
