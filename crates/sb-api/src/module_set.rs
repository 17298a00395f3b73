use std::borrow::Cow;
use std::fmt;

use sb_core::BoxError;

const SAFE_MODULES: &[&str] = &[
    "base64", "binary", "hashlib", "json", "math", "prelude", "random", "re", "sleep", "time",
];
const NETWORK_MODULES: &[&str] = &["http"];
const FULL_MODULES: &[&str] = &["runtime"];

/// Name of a predefined list of capability modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModuleSetName(Cow<'static, str>);

impl ModuleSetName {
    /// Same as [`ModuleSetName::NONE`].
    pub const EMPTY: Self = Self(Cow::Borrowed(""));
    pub const NONE: Self = Self(Cow::Borrowed("none"));
    /// Modules without network or host access.
    pub const SAFE: Self = Self(Cow::Borrowed("safe"));
    /// `safe` plus the HTTP client.
    pub const NETWORK: Self = Self(Cow::Borrowed("network"));
    /// `network` plus host runtime introspection.
    pub const FULL: Self = Self(Cow::Borrowed("full"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Module names in the set. Unknown names are an error; the empty name
    /// is the empty set.
    pub fn resolve(&self) -> Result<Vec<String>, BoxError> {
        let groups: &[&[&str]] = match self.as_str() {
            "" | "none" => &[],
            "safe" => &[SAFE_MODULES],
            "network" => &[SAFE_MODULES, NETWORK_MODULES],
            "full" => &[SAFE_MODULES, NETWORK_MODULES, FULL_MODULES],
            other => {
                return Err(BoxError::new(
                    "BOX_MODULE_SET_UNKNOWN",
                    format!("unknown module set: {:?}", other),
                ))
            }
        };
        Ok(groups
            .iter()
            .flat_map(|group| group.iter())
            .map(|name| name.to_string())
            .collect())
    }
}

impl From<&str> for ModuleSetName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ModuleSetName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ModuleSetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_runtime::modules::is_builtin_module;

    #[test]
    fn sets_nest() {
        let safe = ModuleSetName::SAFE.resolve().expect("safe");
        let network = ModuleSetName::NETWORK.resolve().expect("network");
        let full = ModuleSetName::FULL.resolve().expect("full");
        assert_eq!(safe.len(), 10);
        assert!(safe.iter().all(|name| network.contains(name)));
        assert!(network.iter().all(|name| full.contains(name)));
        assert!(network.contains(&"http".to_string()));
        assert!(!safe.contains(&"http".to_string()));
        assert!(full.contains(&"runtime".to_string()));
    }

    #[test]
    fn empty_and_none_resolve_to_nothing() {
        assert!(ModuleSetName::EMPTY.resolve().expect("empty").is_empty());
        assert!(ModuleSetName::NONE.resolve().expect("none").is_empty());
        assert!(ModuleSetName::default().resolve().expect("default").is_empty());
    }

    #[test]
    fn unknown_names_fail() {
        for name in ["missing", "Safe", " safe"] {
            let error = ModuleSetName::from(name).resolve().expect_err("unknown");
            assert_eq!(error.code, "BOX_MODULE_SET_UNKNOWN");
        }
    }

    #[test]
    fn resolved_lists_are_copies() {
        let mut first = ModuleSetName::SAFE.resolve().expect("safe");
        first.clear();
        assert_eq!(ModuleSetName::SAFE.resolve().expect("safe").len(), 10);
    }

    #[test]
    fn network_set_only_names_known_builtins() {
        for name in ModuleSetName::NETWORK.resolve().expect("network") {
            assert!(is_builtin_module(&name), "{}", name);
        }
    }
}
