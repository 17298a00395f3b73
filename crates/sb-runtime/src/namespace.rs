use rhai::{Dynamic, Engine, FnPtr, Map, Module, Scope};
use sb_core::BoxError;

use crate::bridge::{sbvalue_to_dynamic, struct_function_symbol};
use crate::function::{register_host_function, register_method_function, set_module_function};
use crate::loader::{Member, ModuleMembers};

/// Exposes preloaded members: values and structs become variables, functions
/// become global functions, and modules become static namespaces.
pub(crate) fn install_preloaded(
    engine: &mut Engine,
    scope: &mut Scope<'static>,
    members: &ModuleMembers,
    struct_tag: &str,
) -> Result<(), BoxError> {
    for (name, member) in members {
        match member {
            Member::Value(value) => {
                scope.push_dynamic(name.clone(), sbvalue_to_dynamic(value, struct_tag));
            }
            Member::Dynamic(value) => {
                scope.push_dynamic(name.clone(), value.clone());
            }
            Member::Function(function) => register_host_function(engine, name, function),
            Member::Module(inner) => {
                register_struct_functions(engine, name, inner);
                let module = build_namespace(inner, struct_tag)?;
                engine.register_static_module(name.as_str(), module.into());
            }
            Member::Struct(inner) => {
                register_struct_functions(engine, name, inner);
                scope.push_dynamic(name.clone(), struct_object(name, inner, struct_tag)?);
            }
            Member::Namespace(module) => {
                engine.register_static_module(name.as_str(), module.clone());
            }
        }
    }
    Ok(())
}

/// Registers the function fields of every struct reachable from `members`
/// under mangled global names, so object-map method calls can find them.
pub(crate) fn register_struct_functions(
    engine: &mut Engine,
    owner: &str,
    members: &ModuleMembers,
) {
    for (name, member) in members {
        match member {
            Member::Function(function) => {
                register_method_function(engine, &struct_function_symbol(owner, name), function);
            }
            Member::Struct(inner) | Member::Module(inner) => {
                register_struct_functions(engine, name, inner);
            }
            _ => {}
        }
    }
}

pub(crate) fn build_namespace(
    members: &ModuleMembers,
    struct_tag: &str,
) -> Result<Module, BoxError> {
    let mut module = Module::new();
    add_members(&mut module, members, struct_tag)?;
    module.build_index();
    Ok(module)
}

fn add_members(
    module: &mut Module,
    members: &ModuleMembers,
    struct_tag: &str,
) -> Result<(), BoxError> {
    for (name, member) in members {
        match member {
            Member::Value(value) => {
                module.set_var(name.as_str(), sbvalue_to_dynamic(value, struct_tag));
            }
            Member::Dynamic(value) => {
                module.set_var(name.as_str(), value.clone());
            }
            Member::Function(function) => set_module_function(module, name, function),
            Member::Module(inner) => {
                module.set_sub_module(name.as_str(), build_namespace(inner, struct_tag)?);
            }
            Member::Struct(inner) => {
                module.set_var(name.as_str(), struct_object(name, inner, struct_tag)?);
            }
            Member::Namespace(inner) => {
                module.set_sub_module(name.as_str(), inner.clone());
            }
        }
    }
    Ok(())
}

/// Builds the object map for the struct `owner`; function fields hold pointers
/// to the names registered by [`register_struct_functions`].
pub(crate) fn struct_object(
    owner: &str,
    members: &ModuleMembers,
    struct_tag: &str,
) -> Result<Dynamic, BoxError> {
    let mut map = Map::new();
    for (name, member) in members {
        let value = match member {
            Member::Value(value) => sbvalue_to_dynamic(value, struct_tag),
            Member::Dynamic(value) => value.clone(),
            Member::Function(_) => {
                let pointer = FnPtr::new(struct_function_symbol(owner, name)).map_err(|error| {
                    BoxError::new("BOX_MODULE_LOAD", format!("{}.{}: {}", owner, name, error))
                })?;
                Dynamic::from(pointer)
            }
            Member::Struct(inner) | Member::Module(inner) => struct_object(name, inner, struct_tag)?,
            Member::Namespace(_) => {
                return Err(BoxError::new(
                    "BOX_MODULE_LOAD",
                    format!("{}.{}: a namespace cannot be a struct field", owner, name),
                ))
            }
        };
        map.insert(name.as_str().into(), value);
    }
    Ok(Dynamic::from_map(map))
}

/// Builds the module returned for `import "<path>"`.
///
/// A member named like the import path that is itself a module, struct or
/// namespace is also flattened into the top level, so `import "data" as d`
/// reaches `d::a` for data registered as the module `data`.
pub(crate) fn build_import_module(
    path: &str,
    members: &ModuleMembers,
    struct_tag: &str,
) -> Result<Module, BoxError> {
    let mut module = Module::new();
    add_members(&mut module, members, struct_tag)?;
    match members.get(path) {
        Some(Member::Module(inner)) => add_members(&mut module, inner, struct_tag)?,
        Some(Member::Struct(inner)) => {
            for (name, value) in struct_object(path, inner, struct_tag)?.cast::<Map>() {
                module.set_var(name.as_str(), value);
            }
        }
        Some(Member::Namespace(inner)) => {
            module.combine((**inner).clone());
        }
        _ => {}
    }
    module.build_index();
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{int_arg, HostFunction};
    use crate::loader::{wrap_module_data, wrap_struct_data};
    use rhai::INT;
    use std::collections::BTreeMap;

    fn double() -> HostFunction {
        HostFunction::new(|args| Ok(Dynamic::from_int(int_arg(args, 0, "double")? * 2)))
    }

    fn data() -> ModuleMembers {
        BTreeMap::from([
            ("a".to_string(), Member::from(10_i64)),
            ("b".to_string(), Member::from(20_i64)),
            ("double".to_string(), Member::from(double())),
        ])
    }

    #[test]
    fn preloaded_modules_are_namespaces() {
        let mut engine = Engine::new();
        let mut scope = Scope::new();
        install_preloaded(&mut engine, &mut scope, &wrap_module_data("data", data()), "rhai")
            .expect("install");
        let value = engine
            .eval_with_scope::<INT>(&mut scope, "data::double(data::a + data::b)")
            .expect("eval");
        assert_eq!(value, 60);
    }

    #[test]
    fn preloaded_structs_are_objects_with_methods() {
        let mut engine = Engine::new();
        let mut scope = Scope::new();
        install_preloaded(&mut engine, &mut scope, &wrap_struct_data("calc", data()), "rhai")
            .expect("install");
        let value = engine
            .eval_with_scope::<INT>(&mut scope, "calc.double(calc.a) + calc.b")
            .expect("eval");
        assert_eq!(value, 40);
    }

    #[test]
    fn import_modules_flatten_same_named_entries() {
        let module = build_import_module("data", &wrap_module_data("data", data()), "rhai")
            .expect("build");
        assert!(module.contains_var("a"));
        assert!(module.contains_sub_module("data"));

        let other = build_import_module("more", &wrap_module_data("less", data()), "rhai")
            .expect("build");
        assert!(!other.contains_var("a"));
        assert!(other.contains_sub_module("less"));
    }
}
