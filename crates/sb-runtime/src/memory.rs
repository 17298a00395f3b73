use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, INT};

/// Type name scripts see for shared memory handles.
pub const MEMORY_TYPE_NAME: &str = "collective_memory";

/// Key of a shared memory entry. Scripts may index with strings, ints or bools;
/// `1` and `"1"` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryKey {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl MemoryKey {
    fn from_dynamic(key: &Dynamic) -> Result<Self, Box<EvalAltResult>> {
        if let Ok(flag) = key.as_bool() {
            return Ok(Self::Bool(flag));
        }
        if let Ok(value) = key.as_int() {
            return Ok(Self::Int(value as i64));
        }
        if let Some(text) = key.read_lock::<ImmutableString>() {
            return Ok(Self::Str(text.to_string()));
        }
        Err(format!(
            "{}: keys must be strings, ints or bools, got {}",
            MEMORY_TYPE_NAME,
            key.type_name()
        )
        .into())
    }

    fn to_dynamic(&self) -> Dynamic {
        match self {
            Self::Bool(flag) => Dynamic::from_bool(*flag),
            Self::Int(value) => Dynamic::from_int(*value as INT),
            Self::Str(text) => Dynamic::from(text.clone()),
        }
    }
}

impl From<&str> for MemoryKey {
    fn from(key: &str) -> Self {
        Self::Str(key.to_string())
    }
}

impl From<String> for MemoryKey {
    fn from(key: String) -> Self {
        Self::Str(key)
    }
}

impl From<i64> for MemoryKey {
    fn from(key: i64) -> Self {
        Self::Int(key)
    }
}

impl From<bool> for MemoryKey {
    fn from(key: bool) -> Self {
        Self::Bool(key)
    }
}

/// A key/value store shared by every session it is attached to.
///
/// Clones are handles onto the same storage. Individual reads and writes are
/// atomic per key; concurrent writers to one key race and the last write wins.
#[derive(Clone, Default)]
pub struct SharedMemory {
    entries: Arc<DashMap<MemoryKey, Dynamic>>,
}

impl SharedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: impl Into<MemoryKey>) -> Option<Dynamic> {
        self.entries
            .get(&key.into())
            .map(|entry| entry.value().clone())
    }

    pub fn set(&self, key: impl Into<MemoryKey>, value: Dynamic) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&self, key: impl Into<MemoryKey>) -> Option<Dynamic> {
        self.entries.remove(&key.into()).map(|(_, value)| value)
    }

    pub fn contains(&self, key: impl Into<MemoryKey>) -> bool {
        self.entries.contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted keys: bools, then ints, then strings.
    pub fn keys(&self) -> Vec<MemoryKey> {
        let mut keys = self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        keys.sort();
        keys
    }

    pub fn same_as(&self, other: &SharedMemory) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(len={})", MEMORY_TYPE_NAME, self.len())
    }
}

/// Teaches `engine` to index, assign and inspect shared memory handles.
pub(crate) fn register_memory_type(engine: &mut Engine) {
    engine
        .register_type_with_name::<SharedMemory>(MEMORY_TYPE_NAME)
        .register_indexer_get(|memory: &mut SharedMemory, key: Dynamic| {
            let key = MemoryKey::from_dynamic(&key)?;
            Ok::<_, Box<EvalAltResult>>(memory.get(key).unwrap_or(Dynamic::UNIT))
        })
        .register_indexer_set(|memory: &mut SharedMemory, key: Dynamic, value: Dynamic| {
            memory.set(MemoryKey::from_dynamic(&key)?, value);
            Ok::<_, Box<EvalAltResult>>(())
        })
        .register_fn(
            "get",
            |memory: &mut SharedMemory, key: Dynamic, fallback: Dynamic| {
                let key = MemoryKey::from_dynamic(&key)?;
                Ok::<_, Box<EvalAltResult>>(memory.get(key).unwrap_or(fallback))
            },
        )
        .register_fn("contains", |memory: &mut SharedMemory, key: Dynamic| {
            Ok::<_, Box<EvalAltResult>>(memory.contains(MemoryKey::from_dynamic(&key)?))
        })
        .register_fn("remove", |memory: &mut SharedMemory, key: Dynamic| {
            let key = MemoryKey::from_dynamic(&key)?;
            Ok::<_, Box<EvalAltResult>>(memory.remove(key).unwrap_or(Dynamic::UNIT))
        })
        .register_fn("len", |memory: &mut SharedMemory| memory.len() as INT)
        .register_fn("keys", |memory: &mut SharedMemory| {
            memory
                .keys()
                .iter()
                .map(MemoryKey::to_dynamic)
                .collect::<Array>()
        })
        .register_fn("to_string", |memory: &mut SharedMemory| format!("{:?}", memory));
}
