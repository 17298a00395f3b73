//! `ScriptBox`: a configurable, sandboxed Rhai session for embedding.
//!
//! A box is configured through its builder methods, frozen into an
//! interpreter session on the first run, and may then run any number of
//! scripts against that session until [`ScriptBox::reset`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use sb_core::BoxError;
use sb_runtime::{Global, Limits, Machine, ModuleFs, ModuleLoaderMap, PrintSink};

mod builder;
mod exec;
mod local;
mod module_set;

pub use local::{is_local_module, local_module_names};
pub use module_set::ModuleSetName;

pub use sb_core::{Bindings, Record, SbValue, DEFAULT_STRUCT_TAG, TIMEOUT_ERROR_CODE};
pub use sb_runtime::{
    default_print_sink, DirFs, Dynamic, HostFunction, HostResult, HttpRequest, HttpResponse,
    MemoryFs, Member, MemoryKey, ModuleLoader, ModuleMembers, SharedMemory,
};

/// Builder state, applied to the interpreter when the box first runs.
#[derive(Default)]
pub(crate) struct BoxConfig {
    pub(crate) struct_tag: String,
    pub(crate) print_sink: Option<PrintSink>,
    pub(crate) globals: BTreeMap<String, Global>,
    pub(crate) module_set: ModuleSetName,
    pub(crate) builtin_modules: Vec<String>,
    pub(crate) loaders: ModuleLoaderMap,
    pub(crate) scripts: BTreeMap<String, String>,
    pub(crate) fs: Option<Arc<dyn ModuleFs>>,
    pub(crate) limits: Limits,
}

pub(crate) struct BoxState {
    pub(crate) name: String,
    pub(crate) has_run: bool,
    pub(crate) run_times: u64,
    pub(crate) freeze_error: Option<BoxError>,
    pub(crate) config: BoxConfig,
    pub(crate) machine: Machine,
}

/// A named interpreter host. All methods take `&self`; a box can be shared
/// between threads and runs at most one script at a time.
pub struct ScriptBox {
    state: RwLock<BoxState>,
}

impl ScriptBox {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            state: RwLock::new(BoxState {
                machine: Machine::new(name.clone()),
                name,
                has_run: false,
                run_times: 0,
                freeze_error: None,
                config: BoxConfig::default(),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    /// Scripts run by this box, across resets.
    pub fn run_times(&self) -> u64 {
        self.state.read().run_times
    }

    /// Whether the configuration has been frozen into the interpreter.
    pub fn has_run(&self) -> bool {
        self.state.read().has_run
    }

    /// Read access to the underlying interpreter session.
    pub fn machine(&self) -> MappedRwLockReadGuard<'_, Machine> {
        RwLockReadGuard::map(self.state.read(), |state| &state.machine)
    }
}

impl fmt::Display for ScriptBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        write!(f, "Box{{name:{},run:{}}}", state.name, state.run_times)
    }
}

impl fmt::Debug for ScriptBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ScriptBox")
            .field("name", &state.name)
            .field("has_run", &state.has_run)
            .field("run_times", &state.run_times)
            .field("module_set", &state.config.module_set)
            .finish()
    }
}
