use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use quern_error::{QuernError, Result};

use crate::arrays::array::Array;
use crate::arrays::block::{Block, BlockColumn, Column};
use crate::arrays::datatype::DataType;
use crate::functions::ScalarFunction;

pub type NameSet = BTreeSet<String>;

/// A column name paired with its output alias; an empty alias keeps the name.
pub type NameWithAlias = (String, String);

pub(crate) fn unknown_column(name: &str, block: &Block) -> QuernError {
    QuernError::logical(format!(
        "unknown column: '{}', there are columns: {}",
        name,
        block.dump_names()
    ))
}

/// One primitive transformation applied to a block.
#[derive(Debug, Clone)]
pub enum Action {
    /// Compute a new column by applying a scalar function to existing ones.
    ApplyFunction {
        function: Arc<dyn ScalarFunction>,
        argument_names: Vec<String>,
        /// Columns the function's prerequisite actions produce. Filled while
        /// the action is added to an expression.
        prerequisite_names: Vec<String>,
        result_name: String,
        /// Resolved when the action is added to an expression.
        result_type: Option<DataType>,
    },
    /// Insert a materialized constant column.
    AddColumn { column: BlockColumn },
    RemoveColumn { source_name: String },
    /// Duplicate a column under a new name; the data is shared, not copied.
    CopyColumn {
        source_name: String,
        result_name: String,
    },
    /// Replace the named list columns with their element columns, repeating
    /// every other column by the per-row list lengths. The lists must be
    /// parallel (equal lengths in every row).
    ArrayJoin { columns: NameSet },
    /// Reorder, rename and narrow to the given columns. Defines the output
    /// shape; duplicate result names are allowed.
    Project { projection: Vec<NameWithAlias> },
}

impl Action {
    /// If `result_name` is empty, `"function_name(arg, ...)"` is used once
    /// the action is added to an expression.
    pub fn apply_function(
        function: Arc<dyn ScalarFunction>,
        argument_names: Vec<String>,
        result_name: impl Into<String>,
    ) -> Action {
        Action::ApplyFunction {
            function,
            argument_names,
            prerequisite_names: Vec::new(),
            result_name: result_name.into(),
            result_type: None,
        }
    }

    pub fn add_column(column: BlockColumn) -> Result<Action> {
        match &column.column {
            Some(data) if data.is_constant() => Ok(Action::AddColumn { column }),
            _ => Err(QuernError::logical(format!(
                "column '{}' added to an expression must be a materialized constant",
                column.name
            ))),
        }
    }

    pub fn remove_column(source_name: impl Into<String>) -> Action {
        Action::RemoveColumn {
            source_name: source_name.into(),
        }
    }

    pub fn copy_column(source_name: impl Into<String>, result_name: impl Into<String>) -> Action {
        Action::CopyColumn {
            source_name: source_name.into(),
            result_name: result_name.into(),
        }
    }

    pub fn array_join(columns: impl IntoIterator<Item = String>) -> Result<Action> {
        let columns: NameSet = columns.into_iter().collect();
        if columns.is_empty() {
            return Err(QuernError::logical("no arrays to join"));
        }
        Ok(Action::ArrayJoin { columns })
    }

    pub fn project(projection: Vec<NameWithAlias>) -> Action {
        Action::Project { projection }
    }

    /// Project to the given columns, keeping their names.
    pub fn project_names(names: impl IntoIterator<Item = String>) -> Action {
        Action::Project {
            projection: names.into_iter().map(|name| (name, String::new())).collect(),
        }
    }

    /// Columns that must exist for this action to execute.
    ///
    /// For a function not yet added to an expression the list may be
    /// incomplete: prerequisites are resolved at add time.
    pub fn needed_columns(&self) -> Vec<String> {
        match self {
            Action::ApplyFunction {
                argument_names,
                prerequisite_names,
                ..
            } => argument_names
                .iter()
                .chain(prerequisite_names.iter())
                .cloned()
                .collect(),
            Action::AddColumn { .. } => Vec::new(),
            Action::RemoveColumn { source_name } => vec![source_name.clone()],
            Action::CopyColumn { source_name, .. } => vec![source_name.clone()],
            Action::ArrayJoin { columns } => columns.iter().cloned().collect(),
            Action::Project { projection } => {
                projection.iter().map(|(name, _)| name.clone()).collect()
            }
        }
    }

    /// Columns present in the block because of this action.
    pub fn output_names(&self) -> Vec<String> {
        match self {
            Action::ApplyFunction { result_name, .. } => vec![result_name.clone()],
            Action::AddColumn { column } => vec![column.name.clone()],
            Action::RemoveColumn { .. } => Vec::new(),
            Action::CopyColumn { result_name, .. } => vec![result_name.clone()],
            Action::ArrayJoin { columns } => columns.iter().cloned().collect(),
            Action::Project { projection } => projection
                .iter()
                .map(|(name, alias)| {
                    if alias.is_empty() {
                        name.clone()
                    } else {
                        alias.clone()
                    }
                })
                .collect(),
        }
    }

    /// Resolve the function's result type, default result name and
    /// prerequisite actions against the current sample block.
    ///
    /// A no-op for every other variant.
    pub(crate) fn resolve(&mut self, sample_block: &Block) -> Result<Vec<Action>> {
        let Action::ApplyFunction {
            function,
            argument_names,
            result_name,
            result_type,
            ..
        } = self
        else {
            return Ok(Vec::new());
        };

        let mut arg_types = Vec::with_capacity(argument_names.len());
        for name in argument_names.iter() {
            let col = sample_block
                .by_name(name)
                .ok_or_else(|| unknown_column(name, sample_block))?;
            arg_types.push(col.datatype.clone());
        }

        *result_type = Some(function.return_type(&arg_types)?);
        if result_name.is_empty() {
            *result_name = format!("{}({})", function.name(), argument_names.join(", "));
        }

        function.prerequisites(sample_block, argument_names)
    }

    /// Apply the action to a sample block, resolving names and types.
    ///
    /// Functions whose arguments are all constants are evaluated eagerly so
    /// the constant result is visible to later planning.
    pub(crate) fn prepare(&self, sample_block: &mut Block) -> Result<()> {
        match self {
            Action::ApplyFunction {
                function,
                argument_names,
                result_name,
                result_type,
                ..
            } => {
                let result_type = result_type
                    .clone()
                    .ok_or_else(|| QuernError::logical("function action was not resolved"))?;

                let mut arg_indices = Vec::with_capacity(argument_names.len());
                let mut all_const = true;
                for name in argument_names {
                    let idx = sample_block
                        .position(name)
                        .ok_or_else(|| unknown_column(name, sample_block))?;
                    arg_indices.push(idx);
                    all_const &= matches!(
                        &sample_block.columns()[idx].column,
                        Some(col) if col.is_constant()
                    );
                }

                sample_block.insert(BlockColumn::new(result_name.clone(), result_type, None));

                if all_const && !argument_names.is_empty() {
                    // Constant folding: evaluate on the sample and keep one
                    // value of the result as a constant over the sample's
                    // row count.
                    let num_rows = sample_block.num_rows();
                    let result_idx = sample_block.num_columns() - 1;
                    function.execute(sample_block, &arg_indices, result_idx)?;

                    let col = &mut sample_block
                        .column_mut(result_idx)
                        .ok_or_else(|| QuernError::logical("result column out of range"))?
                        .column;
                    match col.take() {
                        Some(Column::Full(data)) if !data.is_empty() => {
                            *col =
                                Some(Column::try_constant(Arc::new(data.slice(0, 1)), num_rows)?);
                        }
                        other => *col = other,
                    }
                }

                Ok(())
            }
            Action::AddColumn { column } => {
                if sample_block.has(&column.name) {
                    return Err(QuernError::logical(format!(
                        "column '{}' already exists",
                        column.name
                    )));
                }
                sample_block.insert(column.clone());
                Ok(())
            }
            Action::RemoveColumn { source_name } => {
                sample_block.remove(source_name)?;
                Ok(())
            }
            Action::CopyColumn {
                source_name,
                result_name,
            } => {
                if sample_block.has(result_name) {
                    return Err(QuernError::logical(format!(
                        "column '{result_name}' already exists"
                    )));
                }
                let mut copy = sample_block
                    .by_name(source_name)
                    .ok_or_else(|| unknown_column(source_name, sample_block))?
                    .clone();
                copy.name = result_name.clone();
                sample_block.insert(copy);
                Ok(())
            }
            Action::ArrayJoin { columns } => {
                for name in columns {
                    let idx = sample_block
                        .position(name)
                        .ok_or_else(|| unknown_column(name, sample_block))?;
                    let col = sample_block
                        .column_mut(idx)
                        .ok_or_else(|| QuernError::logical("column index out of range"))?;
                    let elem = match &col.datatype {
                        DataType::List(meta) => (*meta.datatype).clone(),
                        other => {
                            return Err(QuernError::logical(format!(
                                "array join of non-list column '{name}' of type {other}"
                            )))
                        }
                    };
                    col.datatype = elem;
                    col.column = None;
                }
                Ok(())
            }
            Action::Project { projection } => {
                *sample_block = project_block(sample_block, projection)?;
                Ok(())
            }
        }
    }

    /// Apply the action to a data-bearing block.
    pub(crate) fn execute(&self, block: &mut Block) -> Result<()> {
        match self {
            Action::ApplyFunction {
                function,
                argument_names,
                result_name,
                result_type,
                ..
            } => {
                let result_type = result_type
                    .clone()
                    .ok_or_else(|| QuernError::logical("function action was not resolved"))?;

                let mut arg_indices = Vec::with_capacity(argument_names.len());
                for name in argument_names {
                    let idx = block
                        .position(name)
                        .ok_or_else(|| unknown_column(name, block))?;
                    arg_indices.push(idx);
                }

                block.insert(BlockColumn::new(result_name.clone(), result_type, None));
                let result_idx = block.num_columns() - 1;
                function.execute(block, &arg_indices, result_idx)?;

                match block.column(result_idx) {
                    Some(col) if col.column.is_some() => Ok(()),
                    _ => Err(QuernError::logical(format!(
                        "function '{}' did not produce a result column",
                        function.name()
                    ))),
                }
            }
            Action::AddColumn { column } => {
                let stored = column
                    .column
                    .as_ref()
                    .and_then(|col| col.constant_value())
                    .ok_or_else(|| {
                        QuernError::logical(format!(
                            "add column action for '{}' holds no constant",
                            column.name
                        ))
                    })?;
                let len = if block.num_columns() == 0 {
                    1
                } else {
                    block.num_rows()
                };
                block.insert(BlockColumn::new(
                    column.name.clone(),
                    column.datatype.clone(),
                    Some(Column::try_constant(stored.clone(), len)?),
                ));
                Ok(())
            }
            Action::RemoveColumn { source_name } => {
                block.remove(source_name)?;
                Ok(())
            }
            Action::CopyColumn {
                source_name,
                result_name,
            } => {
                let mut copy = block
                    .by_name(source_name)
                    .ok_or_else(|| unknown_column(source_name, block))?
                    .clone();
                copy.name = result_name.clone();
                block.insert(copy);
                Ok(())
            }
            Action::ArrayJoin { columns } => execute_array_join(block, columns),
            Action::Project { projection } => {
                *block = project_block(block, projection)?;
                Ok(())
            }
        }
    }
}

fn project_block(block: &Block, projection: &[NameWithAlias]) -> Result<Block> {
    let mut columns = Vec::with_capacity(projection.len());
    for (name, alias) in projection {
        let mut col = block
            .by_name(name)
            .ok_or_else(|| unknown_column(name, block))?
            .clone();
        if !alias.is_empty() {
            col.name = alias.clone();
        }
        columns.push(col);
    }
    Block::try_new(columns)
}

fn execute_array_join(block: &mut Block, columns: &NameSet) -> Result<()> {
    let num_rows = block.num_rows();

    // All joined columns must be parallel lists; the per-row lengths become
    // the replication counts for everything else.
    let mut counts: Option<Vec<usize>> = None;
    for name in columns {
        let idx = block
            .position(name)
            .ok_or_else(|| unknown_column(name, block))?;
        let data = block.columns()[idx]
            .column
            .as_ref()
            .ok_or_else(|| QuernError::logical(format!("column '{name}' has no data")))?
            .materialize(num_rows)?;
        let Array::List(list) = data.as_ref() else {
            return Err(QuernError::logical(format!(
                "array join of non-list column '{name}'"
            )));
        };

        let lengths = list.lengths();
        match &counts {
            None => counts = Some(lengths),
            Some(expected) => {
                if *expected != lengths {
                    return Err(QuernError::logical(
                        "arrays to be joined have different per-row lengths",
                    ));
                }
            }
        }
    }
    let counts = counts.ok_or_else(|| QuernError::logical("no arrays to join"))?;

    let mut new_columns = Vec::with_capacity(block.num_columns());
    for col in block.columns() {
        let data = col
            .column
            .as_ref()
            .ok_or_else(|| QuernError::logical(format!("column '{}' has no data", col.name)))?
            .materialize(num_rows)?;

        if columns.contains(&col.name) {
            let Array::List(list) = data.as_ref() else {
                return Err(QuernError::logical(format!(
                    "array join of non-list column '{}'",
                    col.name
                )));
            };
            new_columns.push(BlockColumn::new(
                col.name.clone(),
                list.elem_type().clone(),
                Some(Column::new(list.child().clone())),
            ));
        } else {
            new_columns.push(BlockColumn::new(
                col.name.clone(),
                col.datatype.clone(),
                Some(Column::new(data.repeat(&counts)?)),
            ));
        }
    }

    *block = Block::try_new(new_columns)?;
    Ok(())
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ApplyFunction {
                function,
                argument_names,
                result_name,
                ..
            } => write!(
                f,
                "FUNCTION {} = {}({})",
                result_name,
                function.name(),
                argument_names.join(", ")
            ),
            Action::AddColumn { column } => write!(f, "ADD {} {}", column.name, column.datatype),
            Action::RemoveColumn { source_name } => write!(f, "REMOVE {source_name}"),
            Action::CopyColumn {
                source_name,
                result_name,
            } => write!(f, "COPY {source_name} -> {result_name}"),
            Action::ArrayJoin { columns } => {
                let names: Vec<&str> = columns.iter().map(|s| s.as_str()).collect();
                write!(f, "ARRAY JOIN {}", names.join(", "))
            }
            Action::Project { projection } => {
                let parts: Vec<String> = projection
                    .iter()
                    .map(|(name, alias)| {
                        if alias.is_empty() {
                            name.clone()
                        } else {
                            format!("{name} AS {alias}")
                        }
                    })
                    .collect();
                write!(f, "PROJECT {}", parts.join(", "))
            }
        }
    }
}
