pub mod arith;
pub mod list;

use std::fmt::Debug;
use std::sync::Arc;

use quern_error::{QuernError, Result};

use crate::arrays::array::Array;
use crate::arrays::block::{Block, Column};
use crate::arrays::datatype::DataType;
use crate::expr::action::Action;

/// A scalar function applied to block columns.
///
/// Implementations are shared behind `Arc` and may be called from several
/// evaluation threads at once; `execute` must be thread-safe.
pub trait ScalarFunction: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolve the output type from the argument types.
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType>;

    /// Extra actions that must have executed before this function can run,
    /// e.g. materializing a derived column the implementation reads by name.
    fn prerequisites(&self, _sample_block: &Block, _arguments: &[String]) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    /// Evaluate over `block`, filling the column at index `result`.
    ///
    /// The result column is pre-inserted with the resolved name and type but
    /// no data; argument columns are addressed by index.
    fn execute(&self, block: &mut Block, arguments: &[usize], result: usize) -> Result<()>;
}

pub(crate) fn check_num_args(
    func: &dyn ScalarFunction,
    inputs: &[DataType],
    expected: usize,
) -> Result<()> {
    if inputs.len() != expected {
        return Err(QuernError::type_error(format!(
            "'{}' expects {} arguments, got {}",
            func.name(),
            expected,
            inputs.len()
        )));
    }
    Ok(())
}

pub(crate) fn invalid_input_types(func: &dyn ScalarFunction, inputs: &[&DataType]) -> QuernError {
    let types = inputs
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    QuernError::type_error(format!("'{}' cannot accept arguments ({types})", func.name()))
}

/// Fetch an argument column as a full array, broadcasting constants.
pub(crate) fn materialize_argument(
    block: &Block,
    idx: usize,
    num_rows: usize,
) -> Result<Arc<Array>> {
    let col = block
        .column(idx)
        .ok_or_else(|| QuernError::logical(format!("argument column {idx} out of range")))?;
    let data = col
        .column
        .as_ref()
        .ok_or_else(|| QuernError::logical(format!("column '{}' has no data", col.name)))?;
    data.materialize(num_rows)
}

pub(crate) fn set_result(block: &mut Block, idx: usize, column: Column) -> Result<()> {
    let col = block
        .column_mut(idx)
        .ok_or_else(|| QuernError::logical(format!("result column {idx} out of range")))?;
    col.column = Some(column);
    Ok(())
}
