use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use sb_core::{Bindings, BoxError};
use sb_runtime::modules::make_builtin_loaders;
use sb_runtime::{run_repl_with_io, Machine, MemoryFs, ModuleFs, ModuleLoaderList, ModuleLoaderMap};

use crate::local::{is_local_module, local_loader};
use crate::{BoxState, ScriptBox};

impl BoxState {
    /// Freezes the configuration into the machine once. A failed freeze is
    /// remembered and returned again until the box is reset.
    fn prepare_env(&mut self) -> Result<(), BoxError> {
        if self.has_run {
            return match &self.freeze_error {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            };
        }
        self.has_run = true;
        if let Err(error) = self.freeze() {
            tracing::debug!(box_name = %self.name, code = %error.code, "freeze failed");
            self.freeze_error = Some(error.clone());
            return Err(error);
        }
        Ok(())
    }

    fn freeze(&mut self) -> Result<(), BoxError> {
        let (preload, lazyload) = self.extract_loaders()?;
        let script_fs: Option<Arc<dyn ModuleFs>> = match &self.config.fs {
            Some(fs) => Some(fs.clone()),
            None if self.config.scripts.is_empty() => None,
            None => Some(Arc::new(MemoryFs::from_scripts(
                self.config.scripts.clone(),
            )?)),
        };
        tracing::debug!(
            box_name = %self.name,
            module_set = %self.config.module_set,
            preload = preload.len(),
            lazyload = lazyload.len(),
            scripts = self.config.scripts.len(),
            "freezing configuration"
        );

        let machine = &mut self.machine;
        machine.set_struct_tag(&self.config.struct_tag);
        machine.set_print_sink(self.config.print_sink.clone());
        machine.set_globals(self.config.globals.clone());
        machine.set_preload_modules(preload);
        machine.set_lazyload_modules(lazyload);
        machine.set_script_fs(script_fs);
        machine.set_limits(self.config.limits.clone());
        machine.prepare()
    }

    /// Merges the module set, named built-ins, local loaders and custom
    /// loaders into a preload list and a lazy-load map sharing memoized loaders.
    fn extract_loaders(&self) -> Result<(ModuleLoaderList, ModuleLoaderMap), BoxError> {
        let mut names = self.config.module_set.resolve()?;
        names.extend(self.config.builtin_modules.iter().cloned());
        names.sort();
        names.dedup();
        let (local_names, builtin_names): (Vec<String>, Vec<String>) =
            names.into_iter().partition(|name| is_local_module(name));

        let (mut preload, mut lazyload) =
            make_builtin_loaders(&builtin_names, self.machine.deadline())?;

        let mut extra = ModuleLoaderMap::new();
        for name in local_names {
            let loader = local_loader(&name, &self.name)?;
            extra.insert(name, loader);
        }
        for (name, loader) in &self.config.loaders {
            extra.insert(name.clone(), loader.clone());
        }
        for (name, loader) in extra {
            let loader = loader.memoized();
            preload.push(loader.clone());
            lazyload.insert(name, loader);
        }
        Ok((preload, lazyload))
    }

    fn execute(
        &mut self,
        script: &str,
        timeout: Option<Duration>,
    ) -> Result<Bindings, BoxError> {
        self.prepare_env()?;
        self.run_times += 1;
        match timeout {
            Some(timeout) => self.machine.run_with_timeout(script, timeout),
            None => self.machine.run(script),
        }
    }

    fn inspect(
        &mut self,
        result: &Result<Bindings, BoxError>,
        reader: &mut dyn BufRead,
        writer: &mut dyn Write,
    ) {
        let banner = match result {
            Ok(bindings) => format!("inspect {}: run ok, {} new bindings", self.name, bindings.len()),
            Err(error) => format!("inspect {}: run failed: {}", self.name, error),
        };
        if let Err(error) = run_repl_with_io(&mut self.machine, &banner, reader, writer) {
            tracing::warn!(box_name = %self.name, %error, "inspect session ended with an error");
        }
    }
}

impl ScriptBox {
    /// Runs `script` and returns the top-level bindings it created.
    ///
    /// The first call freezes the configuration; a freeze error is returned
    /// by this and every later call until [`ScriptBox::reset`].
    pub fn run(&self, script: &str) -> Result<Bindings, BoxError> {
        self.state.write().execute(script, None)
    }

    /// Like [`ScriptBox::run`], but the script is terminated with an
    /// `ENGINE_TIMEOUT` error once `timeout` passes. The box stays usable.
    pub fn run_timeout(&self, script: &str, timeout: Duration) -> Result<Bindings, BoxError> {
        self.state.write().execute(script, Some(timeout))
    }

    /// Starts an interactive session on stdin/stdout.
    pub fn repl(&self) -> Result<(), BoxError> {
        let stdin = io::stdin();
        let mut reader = stdin.lock();
        let mut writer = io::stdout();
        self.repl_with_io(&mut reader, &mut writer)
    }

    pub fn repl_with_io(
        &self,
        reader: &mut dyn BufRead,
        writer: &mut dyn Write,
    ) -> Result<(), BoxError> {
        let mut state = self.state.write();
        state.prepare_env()?;
        let banner = format!("{} (rhai)", state.name);
        run_repl_with_io(&mut state.machine, &banner, reader, writer)
    }

    /// Runs `script`, then opens an interactive session on stdin/stdout over
    /// the resulting state. Returns the run's own result.
    pub fn run_inspect(&self, script: &str) -> Result<Bindings, BoxError> {
        self.run_inspect_if(script, |_| true)
    }

    pub fn run_inspect_with_io(
        &self,
        script: &str,
        reader: &mut dyn BufRead,
        writer: &mut dyn Write,
    ) -> Result<Bindings, BoxError> {
        self.run_inspect_if_with_io(script, |_| true, reader, writer)
    }

    /// Like [`ScriptBox::run_inspect`], but only opens the session when
    /// `predicate` accepts the run's result.
    pub fn run_inspect_if(
        &self,
        script: &str,
        predicate: impl FnOnce(&Result<Bindings, BoxError>) -> bool,
    ) -> Result<Bindings, BoxError> {
        let stdin = io::stdin();
        let mut reader = stdin.lock();
        let mut writer = io::stdout();
        self.run_inspect_if_with_io(script, predicate, &mut reader, &mut writer)
    }

    pub fn run_inspect_if_with_io(
        &self,
        script: &str,
        predicate: impl FnOnce(&Result<Bindings, BoxError>) -> bool,
        reader: &mut dyn BufRead,
        writer: &mut dyn Write,
    ) -> Result<Bindings, BoxError> {
        let mut state = self.state.write();
        state.prepare_env()?;
        let result = state.execute(script, None);
        if predicate(&result) {
            state.inspect(&result, reader, writer);
        }
        result
    }

    /// Replaces the interpreter session with a fresh one. The configuration
    /// is kept and applied again by the next run.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.machine = Machine::new(state.name.clone());
        state.has_run = false;
        state.freeze_error = None;
        tracing::debug!(box_name = %state.name, run_times = state.run_times, "box reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModuleSetName;
    use sb_core::SbValue;
    use sb_runtime::{Member, ModuleLoader};
    use std::collections::BTreeMap;

    fn quiet(name: &str) -> ScriptBox {
        let sandbox = ScriptBox::new(name);
        sandbox.set_print_sink(Arc::new(|_| {}));
        sandbox
    }

    #[test]
    fn loaders_follow_module_set_then_custom_order() {
        let sandbox = quiet("test");
        sandbox.set_module_set(ModuleSetName::FULL);
        sandbox.add_named_modules(["json", "math"]);
        sandbox.add_module_loader("runtime", ModuleLoader::from_members(BTreeMap::new()));
        sandbox.add_module_loader("alpha", ModuleLoader::from_members(BTreeMap::new()));
        let state = sandbox.state.read();
        let (preload, lazyload) = state.extract_loaders().expect("loaders");
        // 11 built-ins, then alpha and runtime
        assert_eq!(preload.len(), 13);
        assert_eq!(lazyload.len(), 13);
        assert!(lazyload.contains_key("alpha"));
        assert!(lazyload["runtime"].load().expect("custom").is_empty());
    }

    #[test]
    fn unknown_names_fail_extraction() {
        let sandbox = quiet("test");
        sandbox.add_named_modules(["dont_exist"]);
        let state = sandbox.state.read();
        assert_eq!(
            state.extract_loaders().expect_err("unknown").code,
            "BOX_MODULE_UNKNOWN"
        );
    }

    #[test]
    fn failed_freeze_is_sticky_until_reset() {
        let sandbox = quiet("test");
        sandbox.set_module_set("missing");
        let first = sandbox.run("let z = 123;").expect_err("first");
        let second = sandbox.run("let z = 123;").expect_err("second");
        assert_eq!(first, second);
        assert_eq!(first.code, "BOX_MODULE_SET_UNKNOWN");
        assert!(sandbox.has_run());
        assert_eq!(sandbox.run_times(), 0);

        sandbox.reset();
        assert!(!sandbox.has_run());
        sandbox.set_module_set(ModuleSetName::SAFE);
        let out = sandbox.run("let z = 123;").expect("after reset");
        assert_eq!(out.get("z"), Some(&SbValue::Int(123)));
    }

    #[test]
    fn module_data_is_reachable_by_namespace_and_import() {
        let sandbox = quiet("test");
        sandbox.add_module_data(
            "data",
            BTreeMap::from([
                ("a".to_string(), Member::from(100_i64)),
                ("b".to_string(), Member::from(200_i64)),
            ]),
        );
        let out = sandbox
            .run(r#"import "data" as d; let res = data::a + d::b;"#)
            .expect("run");
        assert_eq!(out.get("res"), Some(&SbValue::Int(300)));
    }
}
