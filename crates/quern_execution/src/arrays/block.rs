use std::sync::Arc;

use quern_error::{QuernError, Result};

use crate::arrays::array::Array;
use crate::arrays::datatype::DataType;

/// Data held by one column of a block.
///
/// Constants store a single value and the number of rows they logically
/// stand for; they are broadcast on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Full(Arc<Array>),
    Constant { value: Arc<Array>, len: usize },
}

impl Column {
    pub fn new(data: impl Into<Arc<Array>>) -> Self {
        Column::Full(data.into())
    }

    /// Wrap a single-value array as a constant broadcast over `len` rows.
    pub fn try_constant(value: impl Into<Arc<Array>>, len: usize) -> Result<Self> {
        let value = value.into();
        if value.len() != 1 {
            return Err(QuernError::logical(format!(
                "constant column requires a single value, got {} values",
                value.len()
            )));
        }
        Ok(Column::Constant { value, len })
    }

    pub const fn is_constant(&self) -> bool {
        matches!(self, Column::Constant { .. })
    }

    /// Number of rows this column stands for.
    pub fn len(&self) -> usize {
        match self {
            Column::Full(data) => data.len(),
            Column::Constant { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn datatype(&self) -> DataType {
        match self {
            Column::Full(data) => data.datatype(),
            Column::Constant { value, .. } => value.datatype(),
        }
    }

    /// The stored value of a constant column.
    pub fn constant_value(&self) -> Option<&Arc<Array>> {
        match self {
            Column::Constant { value, .. } => Some(value),
            Column::Full(_) => None,
        }
    }

    /// Expand to a full array of `num_rows` values.
    pub fn materialize(&self, num_rows: usize) -> Result<Arc<Array>> {
        match self {
            Column::Full(data) => Ok(data.clone()),
            Column::Constant { value, .. } => Ok(Arc::new(value.repeat(&[num_rows])?)),
        }
    }

    pub fn byte_size(&self) -> usize {
        match self {
            Column::Full(data) => data.byte_size(),
            Column::Constant { value, .. } => value.byte_size(),
        }
    }
}

/// A named, typed column inside a block.
///
/// `column` is `None` in sample blocks, which carry only names and types for
/// plan-time shape inference.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockColumn {
    pub name: String,
    pub datatype: DataType,
    pub column: Option<Column>,
}

impl BlockColumn {
    pub fn new(name: impl Into<String>, datatype: DataType, column: Option<Column>) -> Self {
        BlockColumn {
            name: name.into(),
            datatype,
            column,
        }
    }

    /// A data-less copy, for building sample blocks.
    pub fn without_data(&self) -> BlockColumn {
        BlockColumn {
            name: self.name.clone(),
            datatype: self.datatype.clone(),
            column: None,
        }
    }
}

/// An ordered batch of named, typed columns.
///
/// All columns stand for the same number of rows. An empty block (no
/// columns) doubles as the end-of-stream marker between streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    columns: Vec<BlockColumn>,
}

impl Block {
    pub fn empty() -> Self {
        Block {
            columns: Vec::new(),
        }
    }

    /// Create a block, checking that all data-bearing columns agree on the
    /// row count and that data types match the declared column types.
    pub fn try_new(columns: Vec<BlockColumn>) -> Result<Self> {
        let mut num_rows = None;
        for col in &columns {
            let Some(column) = &col.column else {
                continue;
            };
            if column.datatype() != col.datatype {
                return Err(QuernError::logical(format!(
                    "column '{}' declared as {} but holds {} data",
                    col.name,
                    col.datatype,
                    column.datatype()
                )));
            }
            match num_rows {
                None => num_rows = Some(column.len()),
                Some(expected) => {
                    if column.len() != expected {
                        return Err(QuernError::logical(format!(
                            "column '{}' has {} rows, expected {}",
                            col.name,
                            column.len(),
                            expected
                        )));
                    }
                }
            }
        }

        Ok(Block { columns })
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows the block stands for. Zero for a block without data.
    pub fn num_rows(&self) -> usize {
        self.columns
            .iter()
            .find_map(|col| col.column.as_ref().map(|c| c.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[BlockColumn] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> Option<&BlockColumn> {
        self.columns.get(idx)
    }

    pub fn column_mut(&mut self, idx: usize) -> Option<&mut BlockColumn> {
        self.columns.get_mut(idx)
    }

    /// Index of the first column with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn by_name(&self, name: &str) -> Option<&BlockColumn> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn insert(&mut self, column: BlockColumn) {
        self.columns.push(column);
    }

    /// Remove the first column with the given name.
    pub fn remove(&mut self, name: &str) -> Result<BlockColumn> {
        match self.position(name) {
            Some(idx) => Ok(self.columns.remove(idx)),
            None => Err(QuernError::logical(format!(
                "cannot remove column '{}': not found, there are columns: {}",
                name,
                self.dump_names()
            ))),
        }
    }

    /// A copy with all column data stripped.
    pub fn without_data(&self) -> Block {
        Block {
            columns: self.columns.iter().map(|col| col.without_data()).collect(),
        }
    }

    pub fn byte_size(&self) -> usize {
        self.columns
            .iter()
            .filter_map(|col| col.column.as_ref())
            .map(|col| col.byte_size())
            .sum()
    }

    /// Comma-separated column names, for error messages.
    pub fn dump_names(&self) -> String {
        self.columns
            .iter()
            .map(|col| col.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
