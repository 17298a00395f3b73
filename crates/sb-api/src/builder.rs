//! Configuration mutators. Every method here panics once the box has run:
//! mutating a frozen box is a usage bug, not a runtime condition.

use std::sync::Arc;

use rhai::Dynamic;
use sb_core::SbValue;
use sb_runtime::{
    script_module_name, wrap_module_data, wrap_struct_data, Global, HostFunction, HttpRequest,
    HttpResponse, Limits, Member, ModuleFs, ModuleLoader, ModuleMembers, PrintSink, SharedMemory,
};
use serde::Serialize;

use crate::{BoxConfig, ModuleSetName, ScriptBox};

fn function_members<K: Into<String>>(
    functions: impl IntoIterator<Item = (K, HostFunction)>,
) -> ModuleMembers {
    functions
        .into_iter()
        .map(|(name, function)| (name.into(), Member::Function(function)))
        .collect()
}

impl ScriptBox {
    fn configure(&self, operation: &str, apply: impl FnOnce(&mut BoxConfig)) {
        let mut state = self.state.write();
        if state.has_run {
            panic!("{}: cannot {} after running", state.name, operation);
        }
        apply(&mut state.config);
    }

    /// Selects which struct tag picks record field names. Empty restores the default.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn set_struct_tag(&self, tag: &str) {
        self.configure("set struct tag", |config| {
            config.struct_tag = tag.to_string();
        });
    }

    /// Replaces the default stderr printer for `print`.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn set_print_sink(&self, sink: PrintSink) {
        self.configure("set print sink", |config| {
            config.print_sink = Some(sink);
        });
    }

    /// Serves module scripts from `fs` instead of those added with
    /// [`ScriptBox::add_module_script`].
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn set_fs(&self, fs: Arc<dyn ModuleFs>) {
        self.configure("set module filesystem", |config| {
            config.fs = Some(fs);
        });
    }

    /// Selects a predefined module set. Unknown names fail the first run.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn set_module_set(&self, set: impl Into<ModuleSetName>) {
        let set = set.into();
        self.configure("set module set", |config| {
            config.module_set = set;
        });
    }

    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn set_limits(&self, limits: Limits) {
        self.configure("set limits", |config| {
            config.limits = limits;
        });
    }

    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_key_value(&self, key: impl Into<String>, value: impl Into<SbValue>) {
        let (key, value) = (key.into(), value.into());
        self.configure("add key value", |config| {
            config.globals.insert(key, Global::Value(value));
        });
    }

    /// Adds an interpreter value as is, skipping host conversion.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_key_dynamic(&self, key: impl Into<String>, value: Dynamic) {
        let key = key.into();
        self.configure("add key dynamic", |config| {
            config.globals.insert(key, Global::Dynamic(value));
        });
    }

    /// Adds any serializable host value. A value that does not serialize to
    /// JSON fails the first run with `BOX_GLOBAL_UNSUPPORTED`.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_key_serialized<T: Serialize + ?Sized>(&self, key: impl Into<String>, value: &T) {
        let key = key.into();
        let global = match serde_json::to_value(value) {
            Ok(json) => Global::Value(SbValue::from(json)),
            Err(error) => Global::Unsupported(error.to_string()),
        };
        self.configure("add key serialized", |config| {
            config.globals.insert(key, global);
        });
    }

    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_key_values<K, V>(&self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<SbValue>,
    {
        let values: Vec<(String, SbValue)> = values
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.configure("add key values", |config| {
            for (key, value) in values {
                config.globals.insert(key, Global::Value(value));
            }
        });
    }

    /// Exposes `function` as the global function `name`.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_builtin(&self, name: impl Into<String>, function: HostFunction) {
        let name = name.into();
        self.configure("add builtin", |config| {
            config.globals.insert(name, Global::Function(function));
        });
    }

    /// Requests built-in modules by name on top of the module set.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_named_modules<S: Into<String>>(&self, names: impl IntoIterator<Item = S>) {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.configure("add named modules", |config| {
            config.builtin_modules.extend(names);
        });
    }

    /// Registers `loader` for preloading and for `import "name"`. A later
    /// loader with the same name replaces this one.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_module_loader(&self, name: impl Into<String>, loader: ModuleLoader) {
        let name = name.into();
        self.configure("add module loader", |config| {
            config.loaders.insert(name, loader);
        });
    }

    /// Exposes `members` as the namespace `name::member`.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_module_data(&self, name: &str, members: ModuleMembers) {
        let loader = ModuleLoader::from_members(wrap_module_data(name, members));
        self.configure("add module data", |config| {
            config.loaders.insert(name.to_string(), loader);
        });
    }

    /// Exposes `members` as the object `name.member`.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_struct_data(&self, name: &str, members: ModuleMembers) {
        let loader = ModuleLoader::from_members(wrap_struct_data(name, members));
        self.configure("add struct data", |config| {
            config.loaders.insert(name.to_string(), loader);
        });
    }

    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_module_functions<K: Into<String>>(
        &self,
        name: &str,
        functions: impl IntoIterator<Item = (K, HostFunction)>,
    ) {
        let loader =
            ModuleLoader::from_members(wrap_module_data(name, function_members(functions)));
        self.configure("add module functions", |config| {
            config.loaders.insert(name.to_string(), loader);
        });
    }

    /// Functions become methods of the object `name`, e.g. `name.func(1)`.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_struct_functions<K: Into<String>>(
        &self,
        name: &str,
        functions: impl IntoIterator<Item = (K, HostFunction)>,
    ) {
        let loader =
            ModuleLoader::from_members(wrap_struct_data(name, function_members(functions)));
        self.configure("add struct functions", |config| {
            config.loaders.insert(name.to_string(), loader);
        });
    }

    /// Adds a module script importable as `import "name"` or `import "name.rhai"`.
    /// Invalid names fail the first run.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_module_script(&self, name: &str, script: impl Into<String>) {
        let (name, script) = (script_module_name(name), script.into());
        self.configure("add module script", |config| {
            config.scripts.insert(name, script);
        });
    }

    /// Makes `memory` visible to scripts as the global `name`.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn attach_memory(&self, name: impl Into<String>, memory: &SharedMemory) {
        let (name, memory) = (name.into(), memory.clone());
        self.configure("attach memory", |config| {
            config.globals.insert(name, Global::Dynamic(Dynamic::from(memory)));
        });
    }

    /// Creates a new shared memory, attaches it as `name` and returns it.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn create_memory(&self, name: impl Into<String>) -> SharedMemory {
        let memory = SharedMemory::new();
        self.attach_memory(name, &memory);
        memory
    }

    /// Exposes an HTTP exchange to scripts: `request` holds the request (or
    /// `()` when there is none) and `response` is the returned handle, which
    /// scripts fill in through `status`, `body`, `add_header` and `set_json`.
    ///
    /// # Panics
    ///
    /// Panics if the box has already run.
    pub fn add_http_context(&self, request: Option<&HttpRequest>) -> HttpResponse {
        let request = request.map(HttpRequest::to_value).unwrap_or_default();
        let response = HttpResponse::new();
        let handle = response.clone();
        self.configure("add http context", |config| {
            config.globals.insert("request".to_string(), Global::Value(request));
            config
                .globals
                .insert("response".to_string(), Global::Dynamic(Dynamic::from(handle)));
        });
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn same_key_inserts_overwrite() {
        let sandbox = ScriptBox::new("test");
        sandbox.add_key_value("a", 1);
        sandbox.add_key_value("a", 20);
        sandbox.add_key_values([("a", 300), ("b", 1)]);
        let state = sandbox.state.read();
        assert_eq!(state.config.globals.len(), 2);
        assert!(matches!(
            state.config.globals.get("a"),
            Some(Global::Value(SbValue::Int(300)))
        ));
    }

    #[test]
    fn module_script_names_are_normalized() {
        let sandbox = ScriptBox::new("test");
        sandbox.add_module_script(" data ", "let a = 1;");
        sandbox.add_module_script("data.rhai", "let a = 2;");
        let state = sandbox.state.read();
        assert_eq!(
            state.config.scripts.keys().collect::<Vec<_>>(),
            vec!["data.rhai"]
        );
        assert_eq!(state.config.scripts["data.rhai"], "let a = 2;");
    }

    #[test]
    fn unserializable_values_are_kept_as_unsupported() {
        let sandbox = ScriptBox::new("test");
        let bad = BTreeMap::from([((1, 2), "pair")]);
        sandbox.add_key_serialized("bad", &bad);
        sandbox.add_key_serialized("good", &vec![1, 2, 3]);
        let state = sandbox.state.read();
        assert!(matches!(
            state.config.globals.get("bad"),
            Some(Global::Unsupported(_))
        ));
        assert!(matches!(
            state.config.globals.get("good"),
            Some(Global::Value(SbValue::Array(_)))
        ));
    }

    #[test]
    fn memory_is_attached_as_a_global() {
        let sandbox = ScriptBox::new("test");
        let memory = sandbox.create_memory("share");
        memory.set("k", Dynamic::from(1_i64));
        let state = sandbox.state.read();
        let Some(Global::Dynamic(value)) = state.config.globals.get("share") else {
            panic!("memory global missing");
        };
        let attached = value.clone().try_cast::<SharedMemory>().expect("memory");
        assert!(attached.same_as(&memory));
    }
}
