use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use rhai::{Dynamic, Module, Shared};

type SharedModule = Shared<Module>;
use sb_core::{BoxError, SbValue};

use crate::function::HostFunction;

/// Exported members of a module, keyed by member name.
pub type ModuleMembers = BTreeMap<String, Member>;

/// Loaders run ahead of the first script, in order.
pub type ModuleLoaderList = Vec<ModuleLoader>;

/// Loaders reachable through `import "name"`.
pub type ModuleLoaderMap = BTreeMap<String, ModuleLoader>;

#[derive(Clone, Debug)]
pub enum Member {
    /// Host value converted with the active struct tag.
    Value(SbValue),
    Dynamic(Dynamic),
    Function(HostFunction),
    /// Namespace reached as `name::member`.
    Module(ModuleMembers),
    /// Object map reached as `name.member`; function fields are callable as methods.
    Struct(ModuleMembers),
    /// Prebuilt interpreter module, exposed as a namespace.
    Namespace(SharedModule),
}

impl From<SbValue> for Member {
    fn from(value: SbValue) -> Self {
        Self::Value(value)
    }
}

impl From<Dynamic> for Member {
    fn from(value: Dynamic) -> Self {
        Self::Dynamic(value)
    }
}

impl From<HostFunction> for Member {
    fn from(function: HostFunction) -> Self {
        Self::Function(function)
    }
}

impl From<i64> for Member {
    fn from(value: i64) -> Self {
        Self::Value(SbValue::Int(value))
    }
}

impl From<f64> for Member {
    fn from(value: f64) -> Self {
        Self::Value(SbValue::Float(value))
    }
}

impl From<bool> for Member {
    fn from(value: bool) -> Self {
        Self::Value(SbValue::Bool(value))
    }
}

impl From<&str> for Member {
    fn from(value: &str) -> Self {
        Self::Value(SbValue::from(value))
    }
}

impl From<String> for Member {
    fn from(value: String) -> Self {
        Self::Value(SbValue::String(value))
    }
}

/// Exposes `members` as the namespace `name`.
pub fn wrap_module_data(name: &str, members: ModuleMembers) -> ModuleMembers {
    BTreeMap::from([(name.to_string(), Member::Module(members))])
}

/// Exposes `members` as the object `name`.
pub fn wrap_struct_data(name: &str, members: ModuleMembers) -> ModuleMembers {
    BTreeMap::from([(name.to_string(), Member::Struct(members))])
}

type LoaderFn = dyn Fn() -> Result<ModuleMembers, BoxError> + Send + Sync;

/// A deferred computation producing a module's exported members.
#[derive(Clone)]
pub struct ModuleLoader {
    inner: Arc<LoaderFn>,
}

impl ModuleLoader {
    pub fn new(
        loader: impl Fn() -> Result<ModuleMembers, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(loader),
        }
    }

    /// A loader that always yields the same members.
    pub fn from_members(members: ModuleMembers) -> Self {
        Self::new(move || Ok(members.clone()))
    }

    pub fn load(&self) -> Result<ModuleMembers, BoxError> {
        (self.inner)()
    }

    /// Wraps this loader so the underlying computation runs at most once.
    ///
    /// The first result, error included, is cached and every clone of the
    /// returned loader shares that cache. Calling `memoized` again produces an
    /// independent cache.
    pub fn memoized(&self) -> Self {
        let inner = self.inner.clone();
        let cell = Arc::new(OnceLock::<Result<ModuleMembers, BoxError>>::new());
        Self::new(move || {
            cell.get_or_init(|| {
                tracing::trace!("invoking module loader");
                inner()
            })
            .clone()
        })
    }
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModuleLoader")
    }
}
