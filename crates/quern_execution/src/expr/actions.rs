use quern_error::{QuernError, Result};

use crate::arrays::block::{Block, BlockColumn};
use crate::arrays::field::Field;
use crate::config::Settings;
use crate::expr::action::{unknown_column, Action, NameSet};

/// An ordered sequence of actions over a block, built incrementally.
///
/// A sample block tracks the names and types (and constant values) that
/// applying the current actions to the inputs would produce, so construction
/// can resolve types and dependencies without data.
///
/// Built and mutated by a single owner; after [`finalize`](Self::finalize)
/// it is read-only and can be shared freely across evaluation threads.
#[derive(Debug)]
pub struct ExpressionActions {
    /// Input columns; data is present only for constants.
    input_columns: Vec<BlockColumn>,
    actions: Vec<Action>,
    sample_block: Block,
    settings: Settings,
}

impl ExpressionActions {
    pub fn new(input_columns: Vec<Field>, settings: Settings) -> Self {
        let input_columns: Vec<BlockColumn> = input_columns
            .into_iter()
            .map(|field| BlockColumn::new(field.name, field.datatype, None))
            .collect();
        Self::with_input_columns(input_columns, settings)
    }

    /// Like [`new`](Self::new), but constant input columns may carry their
    /// values, making them visible to constant folding.
    pub fn with_input_columns(input_columns: Vec<BlockColumn>, settings: Settings) -> Self {
        let mut sample_block = Block::empty();
        for col in &input_columns {
            sample_block.insert(col.clone());
        }
        ExpressionActions {
            input_columns,
            actions: Vec::new(),
            sample_block,
            settings,
        }
    }

    /// Append an input column.
    ///
    /// Not allowed once a projection has been added: projections fix the set
    /// of names later passes rely on.
    pub fn add_input(&mut self, column: BlockColumn) -> Result<()> {
        if self
            .actions
            .iter()
            .any(|action| matches!(action, Action::Project { .. }))
        {
            return Err(QuernError::logical(
                "cannot add an input column after projection",
            ));
        }
        if self.sample_block.has(&column.name) {
            return Err(QuernError::logical(format!(
                "column '{}' already exists",
                column.name
            )));
        }
        self.sample_block.insert(column.clone());
        self.input_columns.push(column);
        Ok(())
    }

    /// Add an action, resolving and adding its prerequisites first.
    ///
    /// Returns the names of the columns the action and its prerequisites
    /// introduced.
    pub fn add(&mut self, action: Action) -> Result<Vec<String>> {
        let mut new_names = Vec::new();
        self.add_impl(action, &mut NameSet::new(), &mut new_names)?;
        Ok(new_names)
    }

    /// `current_names` holds the results whose prerequisites are being
    /// resolved further up the stack; meeting one of them again is a cycle.
    fn add_impl(
        &mut self,
        mut action: Action,
        current_names: &mut NameSet,
        new_names: &mut Vec<String>,
    ) -> Result<()> {
        let prerequisites = action.resolve(&self.sample_block)?;

        if let Action::ApplyFunction { result_name, .. } = &action {
            if self.sample_block.has(result_name) {
                // Already computed; reuse the existing column.
                return Ok(());
            }
            if !current_names.insert(result_name.clone()) {
                return Err(QuernError::logical(format!(
                    "cyclic function prerequisites while computing '{result_name}'"
                )));
            }
        }

        let mut prerequisite_names = Vec::new();
        for mut prerequisite in prerequisites {
            // Resolve before recursing so the produced name is known even
            // when the prerequisite turns out to already exist.
            prerequisite.resolve(&self.sample_block)?;
            prerequisite_names.extend(prerequisite.output_names());
            self.add_impl(prerequisite, current_names, new_names)?;
        }

        if let Action::ApplyFunction {
            prerequisite_names: names,
            ..
        } = &mut action
        {
            *names = prerequisite_names;
        }

        action.prepare(&mut self.sample_block)?;

        match &action {
            Action::ApplyFunction { result_name, .. } => {
                new_names.push(result_name.clone());
                current_names.remove(result_name);
            }
            Action::AddColumn { .. } | Action::CopyColumn { .. } => {
                new_names.extend(action.output_names());
            }
            _ => {}
        }

        self.actions.push(action);
        Ok(())
    }

    /// Insert, at position zero, a projection to exactly the input columns,
    /// stripping anything else the incoming blocks may carry.
    pub fn prepend_project_input(&mut self) {
        let names: Vec<String> = self
            .input_columns
            .iter()
            .map(|col| col.name.clone())
            .collect();
        self.actions.insert(0, Action::project_names(names));
    }

    /// Drop actions whose results never reach `output_columns`, prune unused
    /// inputs, and optimize.
    ///
    /// If no input would remain, the cheapest one is kept so the row count
    /// still flows through the expression. Idempotent.
    pub fn finalize(&mut self, output_columns: &[String]) -> Result<()> {
        let mut final_columns = NameSet::new();
        for name in output_columns {
            if !self.sample_block.has(name) {
                return Err(unknown_column(name, &self.sample_block));
            }
            final_columns.insert(name.clone());
        }

        // Walk backwards, tracking which columns are needed at each point.
        let mut needed = final_columns;
        let mut keep = vec![true; self.actions.len()];
        for (idx, action) in self.actions.iter().enumerate().rev() {
            match action {
                Action::Project { projection } => {
                    // The shape contract of the expression; always kept.
                    needed = projection.iter().map(|(name, _)| name.clone()).collect();
                }
                Action::ArrayJoin { columns } => {
                    // An array join rescales every column that crosses it, so
                    // it can only be dropped when nothing does.
                    if needed.is_empty() {
                        keep[idx] = false;
                    } else {
                        needed.extend(columns.iter().cloned());
                    }
                }
                Action::RemoveColumn { .. } => {
                    // Kept provisionally; the replay below drops it if its
                    // target was pruned away.
                }
                Action::ApplyFunction {
                    result_name,
                    argument_names,
                    prerequisite_names,
                    ..
                } => {
                    if needed.remove(result_name) {
                        needed.extend(argument_names.iter().cloned());
                        needed.extend(prerequisite_names.iter().cloned());
                    } else {
                        keep[idx] = false;
                    }
                }
                Action::AddColumn { column } => {
                    if !needed.remove(&column.name) {
                        keep[idx] = false;
                    }
                }
                Action::CopyColumn {
                    source_name,
                    result_name,
                } => {
                    if needed.remove(result_name) {
                        needed.insert(source_name.clone());
                    } else {
                        keep[idx] = false;
                    }
                }
            }
        }

        let original_inputs = self.input_columns.clone();
        self.input_columns.retain(|col| needed.contains(&col.name));
        if self.input_columns.is_empty() && !original_inputs.is_empty() {
            let fields: Vec<Field> = original_inputs
                .iter()
                .map(|col| Field::new(col.name.clone(), col.datatype.clone()))
                .collect();
            if let Some(name) = Self::smallest_column(&fields) {
                if let Some(col) = original_inputs.iter().find(|col| col.name == name) {
                    self.input_columns.push(col.clone());
                }
            }
        }

        // Replay the kept actions over the pruned inputs. This rebuilds the
        // sample block and drops removals whose target no longer exists.
        let mut sample_block = Block::empty();
        for col in &self.input_columns {
            sample_block.insert(col.clone());
        }
        let mut kept_actions = Vec::with_capacity(self.actions.len());
        for (action, keep) in std::mem::take(&mut self.actions).into_iter().zip(keep) {
            if !keep {
                continue;
            }
            if let Action::RemoveColumn { source_name } = &action {
                if !sample_block.has(source_name) {
                    continue;
                }
            }
            action.prepare(&mut sample_block)?;
            kept_actions.push(action);
        }
        self.actions = kept_actions;
        self.sample_block = sample_block;

        self.optimize();
        Ok(())
    }

    fn optimize(&mut self) {
        self.optimize_array_join();
    }

    /// Bubble every array join toward the end of the action list.
    ///
    /// An array join multiplies the row count by the per-row list lengths;
    /// any action independent of the joined columns produces the same result
    /// when run before the join, on fewer rows.
    fn optimize_array_join(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for idx in 0..self.actions.len().saturating_sub(1) {
                let Action::ArrayJoin { columns } = &self.actions[idx] else {
                    continue;
                };
                let next = &self.actions[idx + 1];
                if matches!(next, Action::Project { .. } | Action::ArrayJoin { .. }) {
                    continue;
                }
                let independent = next
                    .needed_columns()
                    .iter()
                    .all(|name| !columns.contains(name))
                    && next
                        .output_names()
                        .iter()
                        .all(|name| !columns.contains(name));
                if independent {
                    self.actions.swap(idx, idx + 1);
                    changed = true;
                }
            }
        }
    }

    /// Run the actions over a block. The block must contain all columns
    /// returned by [`required_columns`](Self::required_columns).
    pub fn execute(&self, block: &mut Block) -> Result<()> {
        for action in &self.actions {
            action.execute(block)?;
            self.check_limits(block)?;
        }
        Ok(())
    }

    fn check_limits(&self, block: &Block) -> Result<()> {
        let limits = &self.settings;
        if limits.max_columns_in_block != 0 && block.num_columns() > limits.max_columns_in_block {
            return Err(QuernError::limit(format!(
                "too many columns in block: {}, maximum: {}",
                block.num_columns(),
                limits.max_columns_in_block
            )));
        }
        if limits.max_block_size_bytes != 0 && block.byte_size() > limits.max_block_size_bytes {
            return Err(QuernError::limit(format!(
                "block of {} bytes exceeds maximum of {} bytes",
                block.byte_size(),
                limits.max_block_size_bytes
            )));
        }
        if limits.max_temporary_non_const_columns != 0 {
            let non_const = block
                .columns()
                .iter()
                .filter(|col| matches!(&col.column, Some(data) if !data.is_constant()))
                .count();
            if non_const > limits.max_temporary_non_const_columns {
                return Err(QuernError::limit(format!(
                    "too many temporary non-constant columns: {}, maximum: {}",
                    non_const, limits.max_temporary_non_const_columns
                )));
            }
        }
        Ok(())
    }

    /// Names of the input columns the expression reads.
    pub fn required_columns(&self) -> Vec<String> {
        self.input_columns
            .iter()
            .map(|col| col.name.clone())
            .collect()
    }

    pub fn required_columns_with_types(&self) -> Vec<Field> {
        self.input_columns
            .iter()
            .map(|col| Field::new(col.name.clone(), col.datatype.clone()))
            .collect()
    }

    /// Names and types (and constant values) of the result of applying all
    /// current actions to the inputs.
    pub fn sample_block(&self) -> &Block {
        &self.sample_block
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// The cheapest column to keep when none is otherwise needed.
    pub fn smallest_column(columns: &[Field]) -> Option<String> {
        columns
            .iter()
            .min_by(|a, b| {
                (a.datatype.value_width(), &a.name).cmp(&(b.datatype.value_width(), &b.name))
            })
            .map(|field| field.name.clone())
    }

    /// Human-readable summary of inputs, actions and outputs.
    pub fn dump_actions(&self) -> String {
        let mut out = String::from("input:\n");
        for col in &self.input_columns {
            out.push_str(&format!("  {} {}\n", col.name, col.datatype));
        }
        out.push_str("actions:\n");
        for action in &self.actions {
            out.push_str(&format!("  {action}\n"));
        }
        out.push_str("output:\n");
        for col in self.sample_block.columns() {
            out.push_str(&format!("  {} {}\n", col.name, col.datatype));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::arrays::array::{Array, ListArray};
    use crate::arrays::block::Column;
    use crate::arrays::datatype::DataType;
    use crate::functions::arith::{Multiply, Plus};
    use crate::functions::{materialize_argument, set_result, ScalarFunction};

    fn int_fields(names: &[&str]) -> Vec<Field> {
        names
            .iter()
            .map(|name| Field::new(*name, DataType::Int64))
            .collect()
    }

    fn int_column(name: &str, values: Vec<i64>) -> BlockColumn {
        BlockColumn::new(name, DataType::Int64, Some(Column::new(Array::Int64(values))))
    }

    fn list_column(name: &str, rows: &[&[i64]]) -> BlockColumn {
        let lists = ListArray::try_from_rows(
            DataType::Int64,
            rows.iter().map(|row| Array::Int64(row.to_vec())).collect(),
        )
        .unwrap();
        BlockColumn::new(
            name,
            DataType::list(DataType::Int64),
            Some(Column::new(Array::List(lists))),
        )
    }

    fn int_values(block: &Block, name: &str) -> Vec<i64> {
        let col = block.by_name(name).unwrap();
        let data = col
            .column
            .as_ref()
            .unwrap()
            .materialize(block.num_rows())
            .unwrap();
        match data.as_ref() {
            Array::Int64(values) => values.clone(),
            other => panic!("unexpected array: {other:?}"),
        }
    }

    /// x * x + y, where the square is computed by a prerequisite action the
    /// function reads back by name.
    #[derive(Debug)]
    struct PlusSquare;

    impl PlusSquare {
        fn prerequisite_name(arg: &str) -> String {
            format!("multiply({arg}, {arg})")
        }
    }

    impl ScalarFunction for PlusSquare {
        fn name(&self) -> &'static str {
            "plus_square"
        }

        fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
            assert_eq!(2, inputs.len());
            Ok(DataType::Int64)
        }

        fn prerequisites(&self, _sample_block: &Block, arguments: &[String]) -> Result<Vec<Action>> {
            Ok(vec![Action::apply_function(
                Arc::new(Multiply),
                vec![arguments[0].clone(), arguments[0].clone()],
                "",
            )])
        }

        fn execute(&self, block: &mut Block, arguments: &[usize], result: usize) -> Result<()> {
            let num_rows = block.num_rows();
            let arg_name = block.column(arguments[0]).unwrap().name.clone();
            let square_idx = block
                .position(&Self::prerequisite_name(&arg_name))
                .expect("prerequisite column");

            let square = materialize_argument(block, square_idx, num_rows)?;
            let y = materialize_argument(block, arguments[1], num_rows)?;
            let out = match (square.as_ref(), y.as_ref()) {
                (Array::Int64(a), Array::Int64(b)) => {
                    Array::Int64(a.iter().zip(b.iter()).map(|(a, b)| a + b).collect())
                }
                other => panic!("unexpected arrays: {other:?}"),
            };
            set_result(block, result, Column::new(out))
        }
    }

    /// A function that names itself as its own prerequisite.
    #[derive(Debug)]
    struct Cyclic;

    impl ScalarFunction for Cyclic {
        fn name(&self) -> &'static str {
            "cyclic"
        }

        fn return_type(&self, _inputs: &[DataType]) -> Result<DataType> {
            Ok(DataType::Int64)
        }

        fn prerequisites(&self, _sample_block: &Block, arguments: &[String]) -> Result<Vec<Action>> {
            Ok(vec![Action::apply_function(
                Arc::new(Cyclic),
                arguments.to_vec(),
                "",
            )])
        }

        fn execute(&self, _block: &mut Block, _arguments: &[usize], _result: usize) -> Result<()> {
            unreachable!("never evaluated")
        }
    }

    #[test]
    fn add_and_project() {
        let mut actions =
            ExpressionActions::new(int_fields(&["x", "y"]), Settings::default());
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["x".to_string(), "y".to_string()],
                "s",
            ))
            .unwrap();
        actions
            .add(Action::project(vec![("s".to_string(), "sum".to_string())]))
            .unwrap();

        let mut block = Block::try_new(vec![
            int_column("x", vec![1, 2]),
            int_column("y", vec![10, 20]),
        ])
        .unwrap();
        actions.execute(&mut block).unwrap();

        assert_eq!(1, block.num_columns());
        assert_eq!(vec![11, 22], int_values(&block, "sum"));
    }

    #[test]
    fn default_result_name() {
        let mut actions =
            ExpressionActions::new(int_fields(&["x", "y"]), Settings::default());
        let new_names = actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["x".to_string(), "y".to_string()],
                "",
            ))
            .unwrap();

        assert_eq!(vec!["plus(x, y)".to_string()], new_names);
        assert!(actions.sample_block().has("plus(x, y)"));
    }

    #[test]
    fn duplicate_function_reused() {
        let mut actions =
            ExpressionActions::new(int_fields(&["x", "y"]), Settings::default());
        let action =
            Action::apply_function(Arc::new(Plus), vec!["x".to_string(), "y".to_string()], "");

        let first = actions.add(action.clone()).unwrap();
        let second = actions.add(action).unwrap();

        assert_eq!(1, first.len());
        assert!(second.is_empty());
        assert_eq!(1, actions.actions().len());
    }

    #[test]
    fn add_input_after_project_forbidden() {
        let mut actions = ExpressionActions::new(int_fields(&["x"]), Settings::default());
        actions
            .add(Action::project_names(vec!["x".to_string()]))
            .unwrap();

        let err = actions
            .add_input(BlockColumn::new("y", DataType::Int64, None))
            .unwrap_err();
        assert!(matches!(err, QuernError::Logical(_)));
    }

    #[test]
    fn prerequisites_added_first() {
        let mut actions =
            ExpressionActions::new(int_fields(&["x", "y"]), Settings::default());
        let new_names = actions
            .add(Action::apply_function(
                Arc::new(PlusSquare),
                vec!["x".to_string(), "y".to_string()],
                "r",
            ))
            .unwrap();

        assert_eq!(
            vec!["multiply(x, x)".to_string(), "r".to_string()],
            new_names
        );
        assert_eq!(2, actions.actions().len());

        let mut block = Block::try_new(vec![
            int_column("x", vec![2, 3]),
            int_column("y", vec![1, 1]),
        ])
        .unwrap();
        actions.execute(&mut block).unwrap();
        assert_eq!(vec![5, 10], int_values(&block, "r"));
    }

    #[test]
    fn cyclic_prerequisites_rejected() {
        let mut actions = ExpressionActions::new(int_fields(&["x"]), Settings::default());
        let err = actions
            .add(Action::apply_function(
                Arc::new(Cyclic),
                vec!["x".to_string()],
                "",
            ))
            .unwrap_err();
        assert!(matches!(err, QuernError::Logical(_)));
    }

    #[test]
    fn finalize_prunes_dead_actions() {
        let mut actions =
            ExpressionActions::new(int_fields(&["a", "b"]), Settings::default());
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["a".to_string(), "b".to_string()],
                "x",
            ))
            .unwrap();
        actions
            .add(Action::apply_function(
                Arc::new(Multiply),
                vec!["a".to_string(), "b".to_string()],
                "y",
            ))
            .unwrap();
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["a".to_string(), "a".to_string()],
                "z",
            ))
            .unwrap();

        actions.finalize(&["x".to_string()]).unwrap();

        assert_eq!(1, actions.actions().len());
        assert!(actions.sample_block().has("x"));
        assert!(!actions.sample_block().has("y"));
        assert!(!actions.sample_block().has("z"));
        assert_eq!(vec!["a".to_string(), "b".to_string()], actions.required_columns());
    }

    #[test]
    fn finalize_unknown_output() {
        let mut actions = ExpressionActions::new(int_fields(&["a"]), Settings::default());
        let err = actions.finalize(&["missing".to_string()]).unwrap_err();
        assert!(matches!(err, QuernError::Logical(_)));
    }

    #[test]
    fn finalize_idempotent() {
        let mut actions =
            ExpressionActions::new(int_fields(&["a", "b"]), Settings::default());
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["a".to_string(), "b".to_string()],
                "x",
            ))
            .unwrap();
        actions
            .add(Action::apply_function(
                Arc::new(Multiply),
                vec!["a".to_string(), "b".to_string()],
                "y",
            ))
            .unwrap();

        actions.finalize(&["x".to_string()]).unwrap();
        let first = actions.dump_actions();
        let first_sample = actions.sample_block().clone();

        actions.finalize(&["x".to_string()]).unwrap();
        assert_eq!(first, actions.dump_actions());
        assert_eq!(first_sample, *actions.sample_block());
    }

    #[test]
    fn finalize_keeps_smallest_input() {
        let mut actions = ExpressionActions::new(
            vec![
                Field::new("a", DataType::Int64),
                Field::new("flag", DataType::Boolean),
            ],
            Settings::default(),
        );
        actions
            .add(Action::add_column(BlockColumn::new(
                "c",
                DataType::Int64,
                Some(Column::try_constant(Array::Int64(vec![5]), 1).unwrap()),
            ))
            .unwrap())
            .unwrap();

        actions.finalize(&["c".to_string()]).unwrap();

        // The expression needs no input, so the narrowest column is retained
        // to preserve the row count.
        assert_eq!(vec!["flag".to_string()], actions.required_columns());

        let mut block = Block::try_new(vec![BlockColumn::new(
            "flag",
            DataType::Boolean,
            Some(Column::new(Array::Boolean(vec![true, false]))),
        )])
        .unwrap();
        actions.execute(&mut block).unwrap();
        assert_eq!(2, block.num_rows());
        assert!(block.has("c"));
    }

    #[test]
    fn finalize_pushes_array_join_late() {
        let mut actions = ExpressionActions::new(
            vec![
                Field::new("id", DataType::Int64),
                Field::new("arr", DataType::list(DataType::Int64)),
            ],
            Settings::default(),
        );
        actions
            .add(Action::array_join(vec!["arr".to_string()]).unwrap())
            .unwrap();
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["id".to_string(), "id".to_string()],
                "s",
            ))
            .unwrap();

        actions
            .finalize(&["s".to_string(), "arr".to_string()])
            .unwrap();

        assert!(matches!(
            actions.actions()[0],
            Action::ApplyFunction { .. }
        ));
        assert!(matches!(actions.actions()[1], Action::ArrayJoin { .. }));

        let mut block = Block::try_new(vec![
            int_column("id", vec![1, 2]),
            list_column("arr", &[&[10, 20], &[30]]),
        ])
        .unwrap();
        actions.execute(&mut block).unwrap();

        assert_eq!(vec![2, 2, 4], int_values(&block, "s"));
        assert_eq!(vec![10, 20, 30], int_values(&block, "arr"));
        assert_eq!(vec![1, 1, 2], int_values(&block, "id"));
    }

    #[test]
    fn column_limit_enforced() {
        let settings = Settings {
            max_columns_in_block: 2,
            ..Settings::default()
        };
        let mut actions = ExpressionActions::new(int_fields(&["x", "y"]), settings);
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["x".to_string(), "y".to_string()],
                "s",
            ))
            .unwrap();

        let mut block = Block::try_new(vec![
            int_column("x", vec![1]),
            int_column("y", vec![2]),
        ])
        .unwrap();
        let err = actions.execute(&mut block).unwrap_err();
        assert!(matches!(err, QuernError::Limit(_)));
    }

    #[test]
    fn remove_column_runs_and_prunes() {
        let mut actions =
            ExpressionActions::new(int_fields(&["a", "b"]), Settings::default());
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["a".to_string(), "b".to_string()],
                "x",
            ))
            .unwrap();
        actions.add(Action::remove_column("b")).unwrap();
        actions
            .add(Action::apply_function(
                Arc::new(Multiply),
                vec!["a".to_string(), "a".to_string()],
                "y",
            ))
            .unwrap();
        actions.add(Action::remove_column("y")).unwrap();

        let mut block = Block::try_new(vec![
            int_column("a", vec![1]),
            int_column("b", vec![2]),
        ])
        .unwrap();
        actions.execute(&mut block).unwrap();
        assert!(!block.has("b"));
        assert!(!block.has("y"));
        assert_eq!(vec![3], int_values(&block, "x"));

        // Once `y` is pruned, removing it has no target and goes as well.
        actions.finalize(&["x".to_string()]).unwrap();
        assert_eq!(2, actions.actions().len());
        assert!(actions
            .actions()
            .iter()
            .all(|action| !matches!(action, Action::ApplyFunction { result_name, .. } if result_name == "y")));
    }

    #[test]
    fn byte_size_limit_enforced() {
        let settings = Settings {
            max_block_size_bytes: 32,
            ..Settings::default()
        };
        let mut actions = ExpressionActions::new(int_fields(&["x", "y"]), settings);
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["x".to_string(), "y".to_string()],
                "s",
            ))
            .unwrap();

        let mut block = Block::try_new(vec![
            int_column("x", vec![1, 2, 3]),
            int_column("y", vec![4, 5, 6]),
        ])
        .unwrap();
        let err = actions.execute(&mut block).unwrap_err();
        assert!(matches!(err, QuernError::Limit(_)));
    }

    #[test]
    fn non_const_column_limit_enforced() {
        let settings = Settings {
            max_temporary_non_const_columns: 2,
            ..Settings::default()
        };
        let mut actions = ExpressionActions::new(int_fields(&["x", "y"]), settings);
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["x".to_string(), "y".to_string()],
                "s",
            ))
            .unwrap();

        let mut block = Block::try_new(vec![
            int_column("x", vec![1]),
            int_column("y", vec![2]),
        ])
        .unwrap();
        let err = actions.execute(&mut block).unwrap_err();
        assert!(matches!(err, QuernError::Limit(_)));
    }

    #[test]
    fn constant_folding() {
        let mut actions = ExpressionActions::with_input_columns(
            vec![
                BlockColumn::new("x", DataType::Int64, None),
                BlockColumn::new(
                    "c",
                    DataType::Int64,
                    Some(Column::try_constant(Array::Int64(vec![5]), 1).unwrap()),
                ),
            ],
            Settings::default(),
        );
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["c".to_string(), "c".to_string()],
                "folded",
            ))
            .unwrap();

        let folded = actions.sample_block().by_name("folded").unwrap();
        let column = folded.column.as_ref().expect("constant result");
        assert!(column.is_constant());
        assert_eq!(
            Array::Int64(vec![10]),
            **column.constant_value().unwrap()
        );
    }

    #[test]
    fn constant_folding_preserves_row_count() {
        let mut actions = ExpressionActions::with_input_columns(
            vec![BlockColumn::new(
                "c",
                DataType::Int64,
                Some(Column::try_constant(Array::Int64(vec![5]), 3).unwrap()),
            )],
            Settings::default(),
        );
        actions
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["c".to_string(), "c".to_string()],
                "folded",
            ))
            .unwrap();

        let folded = actions.sample_block().by_name("folded").unwrap();
        let column = folded.column.as_ref().expect("constant result");
        assert!(column.is_constant());
        assert_eq!(3, column.len());
        assert_eq!(
            Array::Int64(vec![10]),
            **column.constant_value().unwrap()
        );
    }
}
