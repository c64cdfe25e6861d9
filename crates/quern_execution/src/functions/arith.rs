use quern_error::Result;

use super::{
    check_num_args, invalid_input_types, materialize_argument, set_result, ScalarFunction,
};
use crate::arrays::array::Array;
use crate::arrays::block::{Block, Column};
use crate::arrays::datatype::DataType;

/// Macro for generating a binary arithmetic function over the numeric types.
macro_rules! generate_binary_arith {
    ($name:ident, $fn_name:expr, $op:tt) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl ScalarFunction for $name {
            fn name(&self) -> &'static str {
                $fn_name
            }

            fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
                check_num_args(self, inputs, 2)?;
                match (&inputs[0], &inputs[1]) {
                    (DataType::Int64, DataType::Int64) => Ok(DataType::Int64),
                    (DataType::Float64, DataType::Float64) => Ok(DataType::Float64),
                    (a, b) => Err(invalid_input_types(self, &[a, b])),
                }
            }

            fn execute(&self, block: &mut Block, arguments: &[usize], result: usize) -> Result<()> {
                let num_rows = block.num_rows();
                let left = materialize_argument(block, arguments[0], num_rows)?;
                let right = materialize_argument(block, arguments[1], num_rows)?;

                let out = match (left.as_ref(), right.as_ref()) {
                    (Array::Int64(a), Array::Int64(b)) => {
                        Array::Int64(a.iter().zip(b.iter()).map(|(a, b)| a $op b).collect())
                    }
                    (Array::Float64(a), Array::Float64(b)) => {
                        Array::Float64(a.iter().zip(b.iter()).map(|(a, b)| a $op b).collect())
                    }
                    (a, b) => {
                        return Err(invalid_input_types(self, &[&a.datatype(), &b.datatype()]))
                    }
                };

                set_result(block, result, Column::new(out))
            }
        }
    };
}

generate_binary_arith!(Plus, "plus", +);
generate_binary_arith!(Minus, "minus", -);
generate_binary_arith!(Multiply, "multiply", *);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::block::BlockColumn;

    fn block_with(values: Vec<(&str, Vec<i64>)>) -> Block {
        Block::try_new(
            values
                .into_iter()
                .map(|(name, vals)| {
                    BlockColumn::new(name, DataType::Int64, Some(Column::new(Array::Int64(vals))))
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn plus_int64() {
        let mut block = block_with(vec![("x", vec![1, 2]), ("y", vec![10, 20])]);
        block.insert(BlockColumn::new("s", DataType::Int64, None));

        Plus.execute(&mut block, &[0, 1], 2).unwrap();

        let got = block.columns()[2].column.as_ref().unwrap();
        assert_eq!(Column::new(Array::Int64(vec![11, 22])), *got);
    }

    #[test]
    fn minus_multiply_int64() {
        let mut block = block_with(vec![("x", vec![5, 7]), ("y", vec![2, 3])]);
        block.insert(BlockColumn::new("d", DataType::Int64, None));
        Minus.execute(&mut block, &[0, 1], 2).unwrap();
        block.insert(BlockColumn::new("p", DataType::Int64, None));
        Multiply.execute(&mut block, &[0, 1], 3).unwrap();

        assert_eq!(
            Column::new(Array::Int64(vec![3, 4])),
            *block.columns()[2].column.as_ref().unwrap()
        );
        assert_eq!(
            Column::new(Array::Int64(vec![10, 21])),
            *block.columns()[3].column.as_ref().unwrap()
        );
    }

    #[test]
    fn plus_broadcasts_constants() {
        let mut block = block_with(vec![("x", vec![1, 2, 3])]);
        block.insert(BlockColumn::new(
            "c",
            DataType::Int64,
            Some(Column::try_constant(Array::Int64(vec![100]), 3).unwrap()),
        ));
        block.insert(BlockColumn::new("s", DataType::Int64, None));

        Plus.execute(&mut block, &[0, 1], 2).unwrap();

        let got = block.columns()[2].column.as_ref().unwrap();
        assert_eq!(Column::new(Array::Int64(vec![101, 102, 103])), *got);
    }

    #[test]
    fn return_type_mismatch() {
        Plus.return_type(&[DataType::Int64, DataType::Utf8]).unwrap_err();
        Plus.return_type(&[DataType::Int64]).unwrap_err();
    }
}
