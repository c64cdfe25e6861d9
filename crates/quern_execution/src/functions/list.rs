use quern_error::Result;

use super::{
    check_num_args, invalid_input_types, materialize_argument, set_result, ScalarFunction,
};
use crate::arrays::array::Array;
use crate::arrays::block::{Block, Column};
use crate::arrays::datatype::DataType;

/// Per-row length of a list column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Length;

impl ScalarFunction for Length {
    fn name(&self) -> &'static str {
        "length"
    }

    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        check_num_args(self, inputs, 1)?;
        match &inputs[0] {
            DataType::List(_) => Ok(DataType::Int64),
            other => Err(invalid_input_types(self, &[other])),
        }
    }

    fn execute(&self, block: &mut Block, arguments: &[usize], result: usize) -> Result<()> {
        let num_rows = block.num_rows();
        let input = materialize_argument(block, arguments[0], num_rows)?;

        let out = match input.as_ref() {
            Array::List(list) => {
                Array::Int64(list.lengths().into_iter().map(|len| len as i64).collect())
            }
            other => return Err(invalid_input_types(self, &[&other.datatype()])),
        };

        set_result(block, result, Column::new(out))
    }
}
