/// Runtime knobs consumed by the engine core.
///
/// A limit of zero disables the corresponding check.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Worker threads used to drain source streams in parallel.
    pub max_threads: usize,
    /// Upper bound on the number of columns a block may hold during
    /// expression evaluation.
    pub max_columns_in_block: usize,
    /// Upper bound on the total byte size of a block during expression
    /// evaluation.
    pub max_block_size_bytes: usize,
    /// Upper bound on materialized (non-constant) columns held at once while
    /// evaluating an expression.
    pub max_temporary_non_const_columns: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_threads: 8,
            max_columns_in_block: 0,
            max_block_size_bytes: 0,
            max_temporary_non_const_columns: 0,
        }
    }
}
