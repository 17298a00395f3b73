use std::collections::BTreeMap;

use rhai::{Dynamic, EvalAltResult, FLOAT};

use crate::function::{arg_error, expect_arity, int_arg, HostFunction};
use crate::loader::{Member, ModuleMembers};

fn radix(name: &'static str, prefix: &'static str, render: fn(u64) -> String) -> HostFunction {
    HostFunction::new(move |args| {
        expect_arity(args, 1, 1, name)?;
        let value = int_arg(args, 0, name)?;
        let sign = if value < 0 { "-" } else { "" };
        Ok(Dynamic::from(format!(
            "{}{}{}",
            sign,
            prefix,
            render(value.unsigned_abs())
        )))
    })
}

fn sum() -> HostFunction {
    HostFunction::new(|args| {
        expect_arity(args, 1, 2, "sum")?;
        let items = args[0]
            .clone()
            .into_array()
            .map_err(|actual| arg_error("sum", format!("expected array, got {}", actual)))?;
        let start = args.get(1).cloned().unwrap_or(Dynamic::from_int(0));
        items.into_iter().try_fold(start, add)
    })
}

fn add(total: Dynamic, item: Dynamic) -> Result<Dynamic, Box<EvalAltResult>> {
    if let (Ok(a), Ok(b)) = (total.as_int(), item.as_int()) {
        return a
            .checked_add(b)
            .map(Dynamic::from_int)
            .ok_or_else(|| arg_error("sum", "integer overflow"));
    }
    let as_float = |value: &Dynamic| {
        value
            .as_float()
            .or_else(|_| value.as_int().map(|value| value as FLOAT))
    };
    match (as_float(&total), as_float(&item)) {
        (Ok(a), Ok(b)) => Ok(Dynamic::from_float(a + b)),
        _ => Err(arg_error(
            "sum",
            format!("cannot add {} to {}", item.type_name(), total.type_name()),
        )),
    }
}

/// Host-flavoured global helpers: `bin`, `oct`, `hex` and `sum`.
pub(crate) fn members() -> ModuleMembers {
    BTreeMap::from([
        (
            "bin".to_string(),
            Member::Function(radix("bin", "0b", |value| format!("{:b}", value))),
        ),
        (
            "oct".to_string(),
            Member::Function(radix("oct", "0o", |value| format!("{:o}", value))),
        ),
        (
            "hex".to_string(),
            Member::Function(radix("hex", "0x", |value| format!("{:x}", value))),
        ),
        ("sum".to_string(), Member::Function(sum())),
    ])
}
