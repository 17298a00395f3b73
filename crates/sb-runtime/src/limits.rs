//! Interpreter resource limits.
//!
//! [`Limits`] bounds what a single session may consume. Every field uses `0`
//! for "unlimited"; call depth and expression depth keep finite defaults so a
//! runaway recursion fails with a script error instead of overflowing the host
//! stack.

use rhai::Engine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of evaluation steps per run.
    ///
    /// Default: **0** (unlimited).
    pub max_operations: u64,

    /// Maximum depth of nested function calls.
    ///
    /// Default: **64**.
    pub max_call_levels: usize,

    /// Maximum expression nesting at global level.
    ///
    /// Default: **64**.
    pub max_expr_depth: usize,

    /// Maximum expression nesting inside functions.
    ///
    /// Default: **32**.
    pub max_function_expr_depth: usize,

    /// Default: **0** (unlimited).
    pub max_string_size: usize,

    /// Default: **0** (unlimited).
    pub max_array_size: usize,

    /// Default: **0** (unlimited).
    pub max_map_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_operations: 0,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
            max_string_size: 0,
            max_array_size: 0,
            max_map_size: 0,
        }
    }
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_operations(mut self, operations: u64) -> Self {
        self.max_operations = operations;
        self
    }

    pub fn with_max_call_levels(mut self, levels: usize) -> Self {
        self.max_call_levels = levels;
        self
    }

    pub fn with_max_expr_depth(mut self, depth: usize, function_depth: usize) -> Self {
        self.max_expr_depth = depth;
        self.max_function_expr_depth = function_depth;
        self
    }

    pub fn with_max_string_size(mut self, size: usize) -> Self {
        self.max_string_size = size;
        self
    }

    pub fn with_max_array_size(mut self, size: usize) -> Self {
        self.max_array_size = size;
        self
    }

    pub fn with_max_map_size(mut self, size: usize) -> Self {
        self.max_map_size = size;
        self
    }

    pub(crate) fn apply(&self, engine: &mut Engine) {
        engine
            .set_max_operations(self.max_operations)
            .set_max_call_levels(self.max_call_levels)
            .set_max_expr_depths(self.max_expr_depth, self.max_function_expr_depth)
            .set_max_string_size(self.max_string_size)
            .set_max_array_size(self.max_array_size)
            .set_max_map_size(self.max_map_size);
    }
}
