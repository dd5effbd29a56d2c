//! Expression loaders: turning a textual definition into a compiled function.
//!
//! Controllers never parse expressions themselves. When their cached function
//! is stale they hand the current definition to an [`ExpressionLoader`] and
//! cache whatever it returns. [`EvalexprLoader`] is the default
//! implementation; tests and hosts can plug in their own.

use std::collections::HashMap;

use evalexpr::{build_operator_tree, DefaultNumericTypes};
use itertools::Itertools;
use log::debug;

use crate::convert::build_closure;
use crate::errors::CompilationError;
use crate::finite_difference::DEFAULT_STEP;
use crate::function::{CompiledFunction, GradientComponent};
use crate::types::ScalarFn;

/// Compiles scalar function definitions.
///
/// Implementations receive the parameter names in input order, the value
/// expression (possibly empty, which must be rejected) and optionally one
/// gradient expression per parameter.
pub trait ExpressionLoader: Send + Sync {
    fn load(
        &self,
        parameter_names: &[String],
        value_expression: &str,
        gradient_expressions: Option<&[String]>,
    ) -> Result<CompiledFunction, CompilationError>;
}

/// Loader backed by the evalexpr parser.
///
/// Gradient components whose expression is blank are approximated with
/// central differences using `difference_step`.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalexprLoader {
    pub difference_step: f64,
}

impl EvalexprLoader {
    /// Creates a loader with the default difference step.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader whose numeric gradients use `difference_step`.
    ///
    /// # Arguments
    /// * `difference_step` - Base step of the central differences, scaled by
    ///   the magnitude of each coordinate above 1
    pub fn with_difference_step(difference_step: f64) -> Self {
        Self { difference_step }
    }
}

impl Default for EvalexprLoader {
    fn default() -> Self {
        Self {
            difference_step: DEFAULT_STEP,
        }
    }
}

impl ExpressionLoader for EvalexprLoader {
    fn load(
        &self,
        parameter_names: &[String],
        value_expression: &str,
        gradient_expressions: Option<&[String]>,
    ) -> Result<CompiledFunction, CompilationError> {
        if value_expression.trim().is_empty() {
            return Err(CompilationError::MissingDefinition(
                "value expression is not defined".to_string(),
            ));
        }
        let var_map = variable_map(parameter_names)?;
        let fun = compile_expression(value_expression, &var_map)?;

        let gradient = match gradient_expressions {
            Some(expressions) => {
                if expressions.len() != parameter_names.len() {
                    return Err(CompilationError::GradientLength {
                        expected: parameter_names.len(),
                        got: expressions.len(),
                    });
                }
                let components = expressions
                    .iter()
                    .map(|expression| {
                        if expression.trim().is_empty() {
                            Ok(GradientComponent::Numeric)
                        } else {
                            compile_expression(expression, &var_map).map(GradientComponent::Analytic)
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(components)
            }
            None => None,
        };

        debug!(
            "loaded ({}) -> {} with {} gradient",
            parameter_names.iter().join(", "),
            value_expression,
            if gradient.is_some() { "expression" } else { "numeric" }
        );

        Ok(
            CompiledFunction::new(parameter_names.to_vec(), value_expression, fun, gradient)
                .with_difference_step(self.difference_step),
        )
    }
}

/// Maps each parameter name to its input index, rejecting blanks and duplicates.
fn variable_map(parameter_names: &[String]) -> Result<HashMap<String, usize>, CompilationError> {
    if let Some(index) = parameter_names.iter().position(|name| name.trim().is_empty()) {
        return Err(CompilationError::EmptyParameterName(index));
    }
    if let Some(duplicate) = parameter_names.iter().duplicates().next() {
        return Err(CompilationError::DuplicateParameter(duplicate.clone()));
    }
    Ok(parameter_names
        .iter()
        .enumerate()
        .map(|(index, name)| (name.clone(), index))
        .collect())
}

fn compile_expression(
    expression: &str,
    var_map: &HashMap<String, usize>,
) -> Result<ScalarFn, CompilationError> {
    let node = build_operator_tree::<DefaultNumericTypes>(expression).map_err(|err| {
        CompilationError::Parse {
            expression: expression.to_string(),
            message: err.to_string(),
        }
    })?;
    build_closure(&node, var_map).map_err(|source| CompilationError::Convert {
        expression: expression.to_string(),
        source,
    })
}
