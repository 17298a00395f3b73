use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rhai::{Dynamic, Engine, EvalAltResult, ParseError, Scope, AST};
use sb_core::{Bindings, BoxError, SbValue, DEFAULT_STRUCT_TAG};

use crate::bridge::{dynamic_to_sbvalue, sbvalue_to_dynamic};
use crate::deadline::{ArmedDeadline, Deadline, DEADLINE_TOKEN};
use crate::fs::ModuleFs;
use crate::function::{register_host_function, HostFunction};
use crate::http_context::register_response_type;
use crate::limits::Limits;
use crate::loader::{ModuleLoaderList, ModuleLoaderMap};
use crate::memory::register_memory_type;
use crate::namespace::install_preloaded;
use crate::resolver::BoxModuleResolver;

/// Receives every `print` from scripts.
pub type PrintSink = Arc<dyn Fn(&str) + Send + Sync>;

const AST_CACHE_CAPACITY: usize = 64;

/// Prints `[name](HH:MM:SS.mmm) text` to stderr.
pub fn default_print_sink(name: &str) -> PrintSink {
    let name = name.to_string();
    Arc::new(move |text| {
        eprintln!(
            "[{}]({}) {}",
            name,
            chrono::Local::now().format("%H:%M:%S%.3f"),
            text
        );
    })
}

/// A value bound into the interpreter before the first script runs.
#[derive(Clone, Debug)]
pub enum Global {
    Value(SbValue),
    Dynamic(Dynamic),
    Function(HostFunction),
    /// A host value that could not be represented; fails the session when prepared.
    Unsupported(String),
}

impl From<SbValue> for Global {
    fn from(value: SbValue) -> Self {
        Self::Value(value)
    }
}

impl From<Dynamic> for Global {
    fn from(value: Dynamic) -> Self {
        Self::Dynamic(value)
    }
}

impl From<HostFunction> for Global {
    fn from(function: HostFunction) -> Self {
        Self::Function(function)
    }
}

/// One interpreter session: configuration is staged with the `set_*` methods
/// and applied by [`Machine::prepare`], which the run methods call on demand.
pub struct Machine {
    name: String,
    struct_tag: String,
    print_sink: Option<PrintSink>,
    globals: BTreeMap<String, Global>,
    preload: ModuleLoaderList,
    lazyload: ModuleLoaderMap,
    script_fs: Option<Arc<dyn ModuleFs>>,
    limits: Limits,
    deadline: Deadline,
    engine: Option<Engine>,
    scope: Scope<'static>,
    asts: HashMap<String, AST>,
    /// Script functions defined by earlier runs; every new script runs on top of it.
    library: AST,
    run_times: u64,
}

impl Machine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            struct_tag: DEFAULT_STRUCT_TAG.to_string(),
            print_sink: None,
            globals: BTreeMap::new(),
            preload: ModuleLoaderList::new(),
            lazyload: ModuleLoaderMap::new(),
            script_fs: None,
            limits: Limits::default(),
            deadline: Deadline::new(),
            engine: None,
            scope: Scope::new(),
            asts: HashMap::new(),
            library: AST::empty(),
            run_times: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn struct_tag(&self) -> &str {
        &self.struct_tag
    }

    /// Deadline checked while scripts run; blocking host functions should honor it.
    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    pub fn run_times(&self) -> u64 {
        self.run_times
    }

    pub fn is_prepared(&self) -> bool {
        self.engine.is_some()
    }

    /// An empty tag keeps the current one.
    pub fn set_struct_tag(&mut self, tag: &str) {
        if !tag.is_empty() {
            self.struct_tag = tag.to_string();
        }
    }

    pub fn set_print_sink(&mut self, sink: Option<PrintSink>) {
        self.print_sink = sink;
    }

    pub fn set_globals(&mut self, globals: BTreeMap<String, Global>) {
        self.globals = globals;
    }

    pub fn set_preload_modules(&mut self, loaders: ModuleLoaderList) {
        self.preload = loaders;
    }

    pub fn set_lazyload_modules(&mut self, loaders: ModuleLoaderMap) {
        self.lazyload = loaders;
    }

    pub fn set_script_fs(&mut self, fs: Option<Arc<dyn ModuleFs>>) {
        self.script_fs = fs;
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    /// Builds the interpreter from the staged configuration. Does nothing once
    /// prepared; a failure leaves the machine unprepared.
    pub fn prepare(&mut self) -> Result<(), BoxError> {
        if self.engine.is_some() {
            return Ok(());
        }

        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        self.limits.apply(&mut engine);

        let sink = self
            .print_sink
            .clone()
            .unwrap_or_else(|| default_print_sink(&self.name));
        engine.on_print(move |text| sink(text));
        let box_name = self.name.clone();
        engine.on_debug(move |text, source, pos| {
            tracing::debug!(box_name = %box_name, source = source.unwrap_or(""), %pos, "{}", text);
        });
        let deadline = self.deadline.clone();
        engine.on_progress(move |_| deadline.expired().then(|| Dynamic::from(DEADLINE_TOKEN.to_string())));
        register_memory_type(&mut engine);
        register_response_type(&mut engine);

        let mut scope = Scope::new();
        for (name, global) in &self.globals {
            match global {
                Global::Value(value) => {
                    scope.push_dynamic(name.clone(), sbvalue_to_dynamic(value, &self.struct_tag));
                }
                Global::Dynamic(value) => {
                    scope.push_dynamic(name.clone(), value.clone());
                }
                Global::Function(function) => register_host_function(&mut engine, name, function),
                Global::Unsupported(reason) => {
                    return Err(BoxError::new(
                        "BOX_GLOBAL_UNSUPPORTED",
                        format!("global {:?} is not supported: {}", name, reason),
                    ));
                }
            }
        }

        for loader in &self.preload {
            let members = loader.load()?;
            install_preloaded(&mut engine, &mut scope, &members, &self.struct_tag)?;
        }

        engine.set_module_resolver(BoxModuleResolver::new(
            self.lazyload.clone(),
            self.script_fs.clone(),
            self.struct_tag.clone(),
        ));

        tracing::debug!(
            box_name = %self.name,
            globals = self.globals.len(),
            preload = self.preload.len(),
            lazyload = self.lazyload.len(),
            "machine prepared"
        );
        self.engine = Some(engine);
        self.scope = scope;
        Ok(())
    }

    /// Runs `script` to completion and returns the bindings it declared.
    pub fn run(&mut self, script: &str) -> Result<Bindings, BoxError> {
        self.prepare()?;
        self.execute(script)
    }

    /// Like [`Machine::run`], but terminates the script once `timeout` passes.
    pub fn run_with_timeout(&mut self, script: &str, timeout: Duration) -> Result<Bindings, BoxError> {
        self.prepare()?;
        let _armed = ArmedDeadline::arm(self.deadline.clone(), timeout);
        self.execute(script).map_err(|error| {
            if error.is_timeout() {
                tracing::warn!(box_name = %self.name, ?timeout, "script timed out");
                BoxError::timeout(format!("{}: script exceeded timeout of {:?}", self.name, timeout))
            } else {
                error
            }
        })
    }

    /// Evaluates one snippet against the session scope and returns its value.
    pub fn eval(&mut self, script: &str) -> Result<Dynamic, BoxError> {
        self.prepare()?;
        let ast = self.compile(script)?;
        let Some(engine) = self.engine.as_ref() else {
            return Err(not_ready(&self.name));
        };
        let value = engine
            .eval_ast_with_scope::<Dynamic>(&mut self.scope, &self.library.merge(&ast))
            .map_err(|error| map_eval_error(*error))?;
        self.library.combine(ast.clone_functions_only());
        Ok(value)
    }

    /// Every variable currently visible to scripts; later shadowing wins.
    pub fn bindings(&self) -> Bindings {
        self.bindings_from(0)
    }

    pub fn binding(&self, name: &str) -> Option<SbValue> {
        self.scope
            .get(name)
            .map(|value| dynamic_to_sbvalue(value.clone()))
    }

    fn execute(&mut self, script: &str) -> Result<Bindings, BoxError> {
        let ast = self.compile(script)?;
        let Some(engine) = self.engine.as_ref() else {
            return Err(not_ready(&self.name));
        };
        let before = self.scope.len();
        let snapshot = self
            .scope
            .iter_raw()
            .map(|(_, _, value)| dynamic_to_sbvalue(value.clone()))
            .collect::<Vec<_>>();
        tracing::debug!(box_name = %self.name, run = self.run_times + 1, "running script");
        let result = engine.run_ast_with_scope(&mut self.scope, &self.library.merge(&ast));
        self.run_times += 1;
        result.map_err(|error| map_eval_error(*error))?;
        self.library.combine(ast.clone_functions_only());

        let mut out = Bindings::new();
        for ((name, _, value), old) in self.scope.iter_raw().zip(&snapshot) {
            let value = dynamic_to_sbvalue(value.clone());
            if value != *old {
                out.insert(name.to_string(), value);
            }
        }
        out.extend(self.bindings_from(before));
        Ok(out)
    }

    fn compile(&mut self, script: &str) -> Result<AST, BoxError> {
        if let Some(ast) = self.asts.get(script) {
            return Ok(ast.clone());
        }
        let Some(engine) = self.engine.as_ref() else {
            return Err(not_ready(&self.name));
        };
        let mut ast = engine
            .compile_with_scope(&self.scope, script)
            .map_err(map_parse_error)?;
        ast.set_source(format!("{}.rhai", self.name));
        if self.asts.len() >= AST_CACHE_CAPACITY {
            self.asts.clear();
        }
        self.asts.insert(script.to_string(), ast.clone());
        Ok(ast)
    }

    fn bindings_from(&self, start: usize) -> Bindings {
        let mut out = Bindings::new();
        for (name, _, value) in self.scope.iter_raw().skip(start) {
            out.insert(name.to_string(), dynamic_to_sbvalue(value.clone()));
        }
        out
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.name)
            .field("struct_tag", &self.struct_tag)
            .field("prepared", &self.engine.is_some())
            .field("run_times", &self.run_times)
            .finish()
    }
}

fn not_ready(name: &str) -> BoxError {
    BoxError::new("ENGINE_NOT_READY", format!("{}: interpreter is not prepared", name))
}

fn is_terminated(error: &EvalAltResult) -> bool {
    match error {
        EvalAltResult::ErrorTerminated(..) => true,
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => is_terminated(inner),
        _ => false,
    }
}

pub(crate) fn map_eval_error(error: EvalAltResult) -> BoxError {
    if is_terminated(&error) {
        return BoxError::timeout(error.to_string());
    }
    BoxError::new("ENGINE_EVAL_ERROR", error.to_string())
}

fn map_parse_error(error: ParseError) -> BoxError {
    BoxError::new("ENGINE_PARSE_ERROR", error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{wrap_module_data, Member, ModuleLoader};
    use parking_lot::Mutex;

    fn machine() -> Machine {
        let mut machine = Machine::new("test");
        machine.set_print_sink(Some(Arc::new(|_| {})));
        machine
    }

    #[test]
    fn run_returns_only_new_bindings() {
        let mut machine = machine();
        machine.set_globals(BTreeMap::from([
            ("a".to_string(), Global::from(SbValue::Int(10))),
            ("b".to_string(), Global::from(SbValue::Int(20))),
        ]));
        let out = machine.run("let c = a + b;").expect("run");
        assert_eq!(out, Bindings::from([("c".to_string(), SbValue::Int(30))]));

        let out = machine.run("let d = c << 2;").expect("second run");
        assert_eq!(out.get("d"), Some(&SbValue::Int(120)));
        assert_eq!(machine.run_times(), 2);
        assert_eq!(machine.binding("c"), Some(SbValue::Int(30)));
        assert!(machine.bindings().contains_key("a"));
    }

    #[test]
    fn undefined_names_fail_at_compile_time() {
        let mut machine = machine();
        let error = machine.run("let x = missing + 1;").expect_err("strict");
        assert_eq!(error.code, "ENGINE_PARSE_ERROR");
        let error = machine.run("throw \"boom\";").expect_err("throw");
        assert_eq!(error.code, "ENGINE_EVAL_ERROR");
    }

    #[test]
    fn unsupported_globals_fail_prepare() {
        let mut machine = machine();
        machine.set_globals(BTreeMap::from([(
            "bad".to_string(),
            Global::Unsupported("cannot serialize".to_string()),
        )]));
        let error = machine.prepare().expect_err("unsupported");
        assert_eq!(error.code, "BOX_GLOBAL_UNSUPPORTED");
        assert!(!machine.is_prepared());
    }

    #[test]
    fn preload_values_shadow_globals() {
        let mut machine = machine();
        machine.set_globals(BTreeMap::from([(
            "num".to_string(),
            Global::from(SbValue::Int(1)),
        )]));
        machine.set_preload_modules(vec![ModuleLoader::from_members(BTreeMap::from([(
            "num".to_string(),
            Member::from(100_i64),
        )]))]);
        let out = machine.run("let r = num + 1;").expect("run");
        assert_eq!(out.get("r"), Some(&SbValue::Int(101)));
    }

    #[test]
    fn lazy_modules_are_importable() {
        let mut machine = machine();
        let data = ModuleLoader::from_members(wrap_module_data(
            "data",
            BTreeMap::from([("a".to_string(), Member::from(7_i64))]),
        ));
        machine.set_lazyload_modules(BTreeMap::from([("data".to_string(), data)]));
        let out = machine
            .run(r#"import "data" as d; let v = d::a * 2;"#)
            .expect("run");
        assert_eq!(out.get("v"), Some(&SbValue::Int(14)));
    }

    #[test]
    fn print_goes_to_the_sink() {
        let printed = Arc::new(Mutex::new(String::new()));
        let sink = printed.clone();
        let mut machine = Machine::new("printer");
        machine.set_print_sink(Some(Arc::new(move |text| sink.lock().push_str(text))));
        machine.run(r#"print("Aloha!"); print("Mahalo!");"#).expect("run");
        assert_eq!(printed.lock().as_str(), "Aloha!Mahalo!");
    }

    #[test]
    fn timeouts_terminate_and_leave_the_machine_usable() {
        let mut machine = machine();
        let error = machine
            .run_with_timeout("let x = 0; loop { x += 1; }", Duration::from_millis(50))
            .expect_err("timeout");
        assert!(error.is_timeout());
        assert!(!machine.deadline().is_armed());

        let out = machine
            .run_with_timeout("let y = 1;", Duration::from_secs(5))
            .expect("fast script");
        assert_eq!(out.get("y"), Some(&SbValue::Int(1)));
    }

    #[test]
    fn functions_and_reassignments_carry_across_runs() {
        let mut machine = machine();
        machine.run("let total = 1; fn bump(n) { n + 1 }").expect("define");
        machine.eval("fn twice(n) { bump(bump(n)) }").expect("eval define");
        let out = machine.run("total = twice(total);").expect("call");
        assert_eq!(out, Bindings::from([("total".to_string(), SbValue::Int(3))]));
        assert_eq!(machine.eval("bump(41)").expect("eval call").as_int(), Ok(42));
    }

    #[test]
    fn eval_returns_expression_values() {
        let mut machine = machine();
        machine.eval("let x = 6;").expect("let");
        let value = machine.eval("x * 7").expect("eval");
        assert_eq!(value.as_int(), Ok(42));
    }

    #[test]
    fn struct_tag_defaults_and_overrides() {
        let mut machine = machine();
        assert_eq!(machine.struct_tag(), DEFAULT_STRUCT_TAG);
        machine.set_struct_tag("");
        assert_eq!(machine.struct_tag(), DEFAULT_STRUCT_TAG);
        machine.set_struct_tag("json");
        assert_eq!(machine.struct_tag(), "json");
    }
}
