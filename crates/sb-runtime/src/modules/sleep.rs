use std::collections::BTreeMap;
use std::time::Duration;

use rhai::Dynamic;

use crate::deadline::Deadline;
use crate::function::{arg_error, expect_arity, float_arg, HostFunction};
use crate::loader::{Member, ModuleMembers};

/// `sleep(seconds)`: blocks the run, waking early when the run deadline passes.
pub(crate) fn members(deadline: &Deadline) -> ModuleMembers {
    let deadline = deadline.clone();
    let sleep = HostFunction::new(move |args| {
        expect_arity(args, 1, 1, "sleep")?;
        let seconds = float_arg(args, 0, "sleep")?;
        let duration = Duration::try_from_secs_f64(seconds)
            .map_err(|_| arg_error("sleep", format!("invalid duration {}", seconds)))?;
        deadline.sleep(duration)?;
        Ok(Dynamic::UNIT)
    });
    BTreeMap::from([("sleep".to_string(), Member::Function(sleep))])
}
