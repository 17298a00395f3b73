use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use sb_core::BoxError;
use walkdir::WalkDir;

/// File suffix of module scripts.
pub const SCRIPT_SUFFIX: &str = ".rhai";

/// Source of module script text for `import` statements.
pub trait ModuleFs: Send + Sync + fmt::Debug {
    /// Returns the text stored under `name`, `Ok(None)` when it does not exist.
    fn read_script(&self, name: &str) -> Result<Option<String>, BoxError>;
}

/// Trims `name` and appends [`SCRIPT_SUFFIX`] when missing.
pub fn script_module_name(name: &str) -> String {
    let name = name.trim();
    if name.ends_with(SCRIPT_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, SCRIPT_SUFFIX)
    }
}

/// Rejects names that cannot address a module script.
pub fn validate_script_module_name(name: &str) -> Result<(), BoxError> {
    let stem = name.trim().trim_end_matches(SCRIPT_SUFFIX);
    let invalid = stem.is_empty()
        || stem
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(BoxError::new(
            "BOX_MODULE_SCRIPT_INVALID",
            format!("invalid module script name: {:?}", name),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scripts(scripts: BTreeMap<String, String>) -> Result<Self, BoxError> {
        let mut fs = Self::new();
        for (name, text) in scripts {
            fs.insert(&name, text)?;
        }
        Ok(fs)
    }

    /// Snapshots every `*.rhai` file below `root`, keyed by its relative path.
    pub fn from_dir(root: &Path) -> Result<Self, BoxError> {
        let mut fs = Self::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|error| {
                BoxError::new("BOX_MODULE_FS", format!("failed to scan {}: {}", root.display(), error))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("rhai") {
                continue;
            }
            let relative = path.strip_prefix(root).map_err(|error| {
                BoxError::new("BOX_MODULE_FS", error.to_string())
            })?;
            let name = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let text = std::fs::read_to_string(path).map_err(|error| {
                BoxError::new("BOX_MODULE_FS", format!("failed to read {}: {}", path.display(), error))
            })?;
            fs.files.insert(name, text);
        }
        Ok(fs)
    }

    pub fn insert(&mut self, name: &str, text: impl Into<String>) -> Result<(), BoxError> {
        validate_script_module_name(name)?;
        self.files.insert(script_module_name(name), text.into());
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }
}

impl ModuleFs for MemoryFs {
    fn read_script(&self, name: &str) -> Result<Option<String>, BoxError> {
        Ok(self.files.get(&script_module_name(name)).cloned())
    }
}

/// Reads module scripts from a directory on demand.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModuleFs for DirFs {
    fn read_script(&self, name: &str) -> Result<Option<String>, BoxError> {
        let name = script_module_name(name);
        let relative = Path::new(&name);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(BoxError::new(
                "BOX_MODULE_SCRIPT_INVALID",
                format!("module script escapes its root: {}", name),
            ));
        }
        let path = self.root.join(relative);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read_to_string(&path).map(Some).map_err(|error| {
            BoxError::new("BOX_MODULE_FS", format!("failed to read {}: {}", path.display(), error))
        })
    }
}
