use quern_error::{QuernError, Result};

use crate::config::Settings;
use crate::expr::actions::ExpressionActions;

/// A sequence of expression stages where each stage's output block feeds the
/// next stage's input.
///
/// Lets parts of a query run separately with work in between, e.g. computing
/// the WHERE expression in one step, filtering on its value, then computing
/// the SELECT expression in the next step.
#[derive(Debug)]
pub struct ExpressionChain {
    pub settings: Settings,
    pub steps: Vec<Step>,
}

#[derive(Debug)]
pub struct Step {
    pub actions: ExpressionActions,
    /// Columns later stages or the caller read from this step's output.
    pub required_output: Vec<String>,
}

impl Step {
    pub fn new(actions: ExpressionActions) -> Self {
        Step {
            actions,
            required_output: Vec::new(),
        }
    }
}

impl ExpressionChain {
    pub fn new(settings: Settings) -> Self {
        ExpressionChain {
            settings,
            steps: Vec::new(),
        }
    }

    /// Append a step whose inputs are the previous step's outputs.
    pub fn add_step(&mut self) -> Result<()> {
        let Some(last) = self.steps.last() else {
            return Err(QuernError::logical(
                "cannot add a step to an empty expression chain",
            ));
        };

        let columns = last.actions.sample_block().columns().to_vec();
        self.steps.push(Step::new(ExpressionActions::with_input_columns(
            columns,
            self.settings.clone(),
        )));
        Ok(())
    }

    /// Finalize every step, back to front, propagating column liveness.
    ///
    /// Each step's required inputs are added to the previous step's required
    /// output. When the previous step ends up producing more columns than
    /// the next one consumes, the next step gets a leading projection to
    /// drop the surplus. A step that consumes nothing keeps the surplus,
    /// since it is what carries the row count.
    pub fn finalize(&mut self) -> Result<()> {
        for idx in (0..self.steps.len()).rev() {
            let required_output = self.steps[idx].required_output.clone();
            self.steps[idx].actions.finalize(&required_output)?;

            if idx > 0 {
                let required_input = self.steps[idx].actions.required_columns();
                let num_required = required_input.len();

                let (head, tail) = self.steps.split_at_mut(idx);
                let previous_output = &mut head[idx - 1].required_output;
                previous_output.extend(required_input);
                previous_output.sort();
                previous_output.dedup();

                if num_required != 0 && previous_output.len() > num_required {
                    tail[0].actions.prepend_project_input();
                }
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn last_step(&mut self) -> Result<&mut Step> {
        self.steps
            .last_mut()
            .ok_or_else(|| QuernError::logical("empty expression chain"))
    }

    pub fn last_actions(&mut self) -> Result<&mut ExpressionActions> {
        Ok(&mut self.last_step()?.actions)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::arrays::array::Array;
    use crate::arrays::block::{Block, BlockColumn, Column};
    use crate::arrays::datatype::DataType;
    use crate::arrays::field::Field;
    use crate::expr::action::Action;
    use crate::functions::arith::Plus;

    fn int_fields(names: &[&str]) -> Vec<Field> {
        names
            .iter()
            .map(|name| Field::new(*name, DataType::Int64))
            .collect()
    }

    fn int_column(name: &str, values: Vec<i64>) -> BlockColumn {
        BlockColumn::new(name, DataType::Int64, Some(Column::new(Array::Int64(values))))
    }

    #[test]
    fn empty_chain_accessors() {
        let mut chain = ExpressionChain::new(Settings::default());
        chain.add_step().unwrap_err();
        chain.last_step().unwrap_err();
        chain.last_actions().unwrap_err();

        chain.steps.push(Step::new(ExpressionActions::new(
            int_fields(&["x"]),
            Settings::default(),
        )));
        chain.last_step().unwrap();
        chain.clear();
        chain.last_step().unwrap_err();
    }

    #[test]
    fn dead_columns_dropped_between_steps() {
        let mut chain = ExpressionChain::new(Settings::default());
        chain.steps.push(Step::new(ExpressionActions::new(
            int_fields(&["a", "b", "c"]),
            Settings::default(),
        )));
        chain.last_step().unwrap().required_output =
            vec!["a".to_string(), "b".to_string(), "c".to_string()];

        chain.add_step().unwrap();
        chain
            .last_actions()
            .unwrap()
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["a".to_string(), "a".to_string()],
                "s",
            ))
            .unwrap();
        chain.last_step().unwrap().required_output = vec!["s".to_string()];

        chain.finalize().unwrap();

        // The second step only consumes `a`, so it starts by projecting the
        // surplus away.
        let second = &chain.steps[1].actions;
        assert_eq!(vec!["a".to_string()], second.required_columns());
        assert_eq!(
            vec![Field::new("a", DataType::Int64)],
            second.required_columns_with_types()
        );
        assert!(matches!(second.actions()[0], Action::Project { .. }));

        let mut block = Block::try_new(vec![
            int_column("a", vec![1, 2]),
            int_column("b", vec![3, 4]),
            int_column("c", vec![5, 6]),
        ])
        .unwrap();
        chain.steps[0].actions.execute(&mut block).unwrap();
        chain.steps[1].actions.execute(&mut block).unwrap();

        assert!(block.has("s"));
        assert!(block.has("a"));
        assert!(!block.has("b"));
        assert!(!block.has("c"));
    }

    #[test]
    fn step_inputs_follow_previous_outputs() {
        let mut chain = ExpressionChain::new(Settings::default());
        chain.steps.push(Step::new(ExpressionActions::new(
            int_fields(&["x", "y"]),
            Settings::default(),
        )));
        chain
            .last_actions()
            .unwrap()
            .add(Action::apply_function(
                Arc::new(Plus),
                vec!["x".to_string(), "y".to_string()],
                "s",
            ))
            .unwrap();

        chain.add_step().unwrap();
        let inputs = chain.last_actions().unwrap().required_columns();
        assert_eq!(
            vec!["x".to_string(), "y".to_string(), "s".to_string()],
            inputs
        );
    }
}
