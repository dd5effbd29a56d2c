//! Compiled scalar and vector functions.
//!
//! A [`CompiledFunction`] is what an expression loader produces for one
//! scalar definition: the value callable plus one gradient component per
//! parameter. Components defined by an expression are evaluated directly;
//! the rest fall back to central finite differences.
//!
//! A [`CompiledVectorFunction`] bundles the compiled components of a vector
//! function that share one parameter list.
//!
//! Both types are immutable and cheap to clone (the callables sit behind
//! `Arc`), so they can be handed out from a controller's cache and evaluated
//! on other threads.
//!
//! # Example
//!
//! ```
//! use scriptfn::ScalarFunctionController;
//!
//! let mut controller = ScalarFunctionController::new();
//! controller.set_parameter_names(Some(vec!["x".into(), "y".into()]));
//! controller.set_value_expression(Some("x^2 * y".into()));
//!
//! let f = controller.compiled_function().unwrap();
//! assert_eq!(f.eval(&[3.0, 2.0]).unwrap(), 18.0);
//! let gradient = f.gradient(&[3.0, 2.0]).unwrap();
//! assert!((gradient[0] - 12.0).abs() < 1e-5);
//! ```

use std::sync::Arc;

use colored::Colorize;
use itertools::Itertools;
use rayon::prelude::*;

use crate::backends::vector::Vector;
use crate::errors::EvaluationError;
use crate::finite_difference::{partial_derivative, DEFAULT_STEP};
use crate::types::{CombinedFn, ScalarFn};

/// One partial derivative of a compiled function.
#[derive(Clone)]
pub enum GradientComponent {
    /// Compiled from a gradient expression
    Analytic(ScalarFn),
    /// Approximated with central differences of the value function
    Numeric,
}

impl std::fmt::Debug for GradientComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analytic(_) => f.write_str("Analytic"),
            Self::Numeric => f.write_str("Numeric"),
        }
    }
}

/// Executable form of a scalar function definition.
#[derive(Clone)]
pub struct CompiledFunction {
    parameter_names: Vec<String>,
    value_expression: String,
    fun: ScalarFn,
    gradient: Vec<GradientComponent>,
    difference_step: f64,
}

impl CompiledFunction {
    /// Creates a compiled function from its callables.
    ///
    /// `gradient` must hold one component per parameter; `None` makes every
    /// component numeric.
    pub fn new(
        parameter_names: Vec<String>,
        value_expression: impl Into<String>,
        fun: ScalarFn,
        gradient: Option<Vec<GradientComponent>>,
    ) -> Self {
        let gradient = gradient
            .filter(|components| components.len() == parameter_names.len())
            .unwrap_or_else(|| vec![GradientComponent::Numeric; parameter_names.len()]);
        Self {
            parameter_names,
            value_expression: value_expression.into(),
            fun,
            gradient,
            difference_step: DEFAULT_STEP,
        }
    }

    /// Sets the relative step used by numeric gradient components.
    pub fn with_difference_step(mut self, step: f64) -> Self {
        self.difference_step = step;
        self
    }

    /// Number of parameters.
    pub fn dimension(&self) -> usize {
        self.parameter_names.len()
    }

    /// Parameter names in input order.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Expression the value callable was compiled from.
    pub fn value_expression(&self) -> &str {
        &self.value_expression
    }

    /// Returns the compiled value callable.
    pub fn fun(&self) -> &ScalarFn {
        &self.fun
    }

    /// How each partial derivative is computed, in parameter order.
    pub fn gradient_components(&self) -> &[GradientComponent] {
        &self.gradient
    }

    /// True if every gradient component comes from an expression.
    pub fn has_analytic_gradient(&self) -> bool {
        self.gradient
            .iter()
            .all(|component| matches!(component, GradientComponent::Analytic(_)))
    }

    /// Evaluates the function at `values`.
    ///
    /// # Errors
    /// Returns `EvaluationError::InvalidInputLength` if the number of values
    /// differs from the number of parameters.
    pub fn eval<V: Vector + ?Sized>(&self, values: &V) -> Result<f64, EvaluationError> {
        let values = values.values();
        let values: &[f64] = &values;
        self.validate_input_length(values)?;
        Ok((self.fun)(values))
    }

    /// Computes the gradient at `values` in parameter order.
    pub fn gradient<V: Vector + ?Sized>(&self, values: &V) -> Result<Vec<f64>, EvaluationError> {
        let mut results = vec![0.0; self.dimension()];
        self.gradient_into(values, &mut results)?;
        Ok(results)
    }

    /// Computes the gradient into a pre-allocated buffer.
    pub fn gradient_into<V: Vector + ?Sized>(
        &self,
        values: &V,
        results: &mut [f64],
    ) -> Result<(), EvaluationError> {
        let values = values.values();
        let values: &[f64] = &values;
        self.validate_input_length(values)?;
        if results.len() != self.dimension() {
            return Err(EvaluationError::InvalidOutputLength {
                expected: self.dimension(),
                got: results.len(),
            });
        }
        for (index, (component, result)) in self.gradient.iter().zip(results.iter_mut()).enumerate() {
            *result = match component {
                GradientComponent::Analytic(derivative) => derivative(values),
                GradientComponent::Numeric => {
                    partial_derivative(&*self.fun, values, index, self.difference_step)
                }
            };
        }
        Ok(())
    }

    /// Evaluates the value and the gradient in one call.
    pub fn value_and_gradient<V: Vector + ?Sized>(
        &self,
        values: &V,
    ) -> Result<(f64, Vec<f64>), EvaluationError> {
        let values = values.values();
        let values: &[f64] = &values;
        let value = self.eval(values)?;
        let gradient = self.gradient(values)?;
        Ok((value, gradient))
    }

    fn validate_input_length(&self, values: &[f64]) -> Result<(), EvaluationError> {
        if values.len() != self.dimension() {
            return Err(EvaluationError::InvalidInputLength {
                expected: self.dimension(),
                got: values.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("parameter_names", &self.parameter_names)
            .field("value_expression", &self.value_expression)
            .field("gradient", &self.gradient)
            .finish()
    }
}

impl std::fmt::Display for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}) = {}",
            "f".cyan(),
            self.parameter_names.iter().join(", "),
            self.value_expression
        )
    }
}

/// Executable form of a vector function: one compiled component per value.
#[derive(Clone)]
pub struct CompiledVectorFunction {
    parameter_names: Vec<String>,
    function_names: Vec<String>,
    components: Vec<CompiledFunction>,
}

impl CompiledVectorFunction {
    /// Bundles `components`, which are expected to share `parameter_names`.
    pub fn new(
        parameter_names: Vec<String>,
        function_names: Vec<String>,
        components: Vec<CompiledFunction>,
    ) -> Self {
        Self {
            parameter_names,
            function_names,
            components,
        }
    }

    /// Number of inputs shared by all components.
    pub fn num_parameters(&self) -> usize {
        self.parameter_names.len()
    }

    /// Number of components, i.e. output values.
    pub fn num_values(&self) -> usize {
        self.components.len()
    }

    /// Parameter names shared by all components.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Component names in output order.
    pub fn function_names(&self) -> &[String] {
        &self.function_names
    }

    /// Compiled component `index`, `None` if out of range.
    pub fn component(&self, index: usize) -> Option<&CompiledFunction> {
        self.components.get(index)
    }

    /// All compiled components in output order.
    pub fn components(&self) -> &[CompiledFunction] {
        &self.components
    }

    /// Evaluates every component into a pre-allocated buffer.
    ///
    /// # Errors
    /// Returns `EvaluationError` if either buffer has the wrong length.
    pub fn eval_into<'a>(
        &self,
        inputs: &[f64],
        results: &'a mut [f64],
    ) -> Result<&'a [f64], EvaluationError> {
        self.validate_input_length(inputs)?;
        if results.len() != self.num_values() {
            return Err(EvaluationError::InvalidOutputLength {
                expected: self.num_values(),
                got: results.len(),
            });
        }
        for (component, result) in self.components.iter().zip(results.iter_mut()) {
            *result = (component.fun)(inputs);
        }
        Ok(results)
    }

    /// Evaluates every component, allocating the result.
    pub fn eval<V: Vector + ?Sized>(&self, inputs: &V) -> Result<Vec<f64>, EvaluationError> {
        let inputs = inputs.values();
        let mut results = vec![0.0; self.num_values()];
        self.eval_into(&inputs, &mut results)?;
        Ok(results)
    }

    /// Computes the Jacobian, one row per component and one column per parameter.
    pub fn jacobian<V: Vector + ?Sized>(&self, inputs: &V) -> Result<Vec<Vec<f64>>, EvaluationError> {
        let inputs = inputs.values();
        let inputs: &[f64] = &inputs;
        self.validate_input_length(inputs)?;
        self.components
            .iter()
            .map(|component| component.gradient(inputs))
            .collect()
    }

    /// Evaluates many input sets in parallel.
    ///
    /// Every input set is validated before any work is scheduled.
    pub fn eval_parallel(&self, input_sets: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EvaluationError> {
        for inputs in input_sets {
            self.validate_input_length(inputs)?;
        }
        Ok(input_sets
            .par_iter()
            .map(|inputs| {
                self.components
                    .iter()
                    .map(|component| (component.fun)(inputs.as_slice()))
                    .collect()
            })
            .collect())
    }

    /// Returns one callable evaluating all components.
    ///
    /// The callable does not check buffer lengths; it expects
    /// `num_parameters()` inputs and `num_values()` outputs.
    pub fn as_fn(&self) -> CombinedFn {
        let funs: Vec<ScalarFn> = self
            .components
            .iter()
            .map(|component| Arc::clone(&component.fun))
            .collect();
        Arc::new(move |inputs: &[f64], results: &mut [f64]| {
            for (fun, result) in funs.iter().zip(results.iter_mut()) {
                *result = fun(inputs);
            }
        })
    }

    fn validate_input_length(&self, inputs: &[f64]) -> Result<(), EvaluationError> {
        if inputs.len() != self.num_parameters() {
            return Err(EvaluationError::InvalidInputLength {
                expected: self.num_parameters(),
                got: inputs.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for CompiledVectorFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledVectorFunction")
            .field("parameter_names", &self.parameter_names)
            .field("function_names", &self.function_names)
            .field("components", &self.components)
            .finish()
    }
}

impl std::fmt::Display for CompiledVectorFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parameters = self.parameter_names.iter().join(", ");
        for (name, component) in self.function_names.iter().zip(&self.components) {
            writeln!(
                f,
                "{}({}) = {}",
                name.as_str().cyan(),
                parameters,
                component.value_expression
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn product() -> CompiledFunction {
        let fun: ScalarFn = Arc::new(|x: &[f64]| x[0] * x[1]);
        let dx: ScalarFn = Arc::new(|x: &[f64]| x[1]);
        CompiledFunction::new(
            vec!["x".into(), "y".into()],
            "x*y",
            fun,
            Some(vec![GradientComponent::Analytic(dx), GradientComponent::Numeric]),
        )
    }

    fn sum() -> CompiledFunction {
        let fun: ScalarFn = Arc::new(|x: &[f64]| x[0] + x[1]);
        CompiledFunction::new(vec!["x".into(), "y".into()], "x+y", fun, None)
    }

    #[test]
    fn test_eval_and_gradient() {
        let f = product();
        assert_eq!(f.eval(&[2.0, 3.0]).unwrap(), 6.0);
        let gradient = f.gradient(&vec![2.0, 3.0]).unwrap();
        assert_eq!(gradient[0], 3.0);
        assert_abs_diff_eq!(gradient[1], 2.0, epsilon = 1e-6);
        assert!(!f.has_analytic_gradient());

        let (value, gradient) = f.value_and_gradient(&[1.0, 1.0]).unwrap();
        assert_eq!(value, 1.0);
        assert_eq!(gradient.len(), 2);
    }

    #[test]
    fn test_invalid_lengths() {
        let f = product();
        assert_eq!(
            f.eval(&[1.0]),
            Err(EvaluationError::InvalidInputLength { expected: 2, got: 1 })
        );
        let mut out = [0.0; 3];
        assert_eq!(
            f.gradient_into(&[1.0, 2.0], &mut out),
            Err(EvaluationError::InvalidOutputLength { expected: 2, got: 3 })
        );
    }

    #[test]
    fn test_mismatched_gradient_falls_back_to_numeric() {
        let fun: ScalarFn = Arc::new(|x: &[f64]| x[0]);
        let f = CompiledFunction::new(vec!["x".into()], "x", fun, Some(vec![]));
        assert!(matches!(f.gradient_components(), [GradientComponent::Numeric]));
    }

    #[test]
    fn test_vector_function() {
        let v = CompiledVectorFunction::new(
            vec!["x".into(), "y".into()],
            vec!["sum".into(), "product".into()],
            vec![sum(), product()],
        );
        assert_eq!(v.eval(&[2.0, 3.0]).unwrap(), vec![5.0, 6.0]);

        let jacobian = v.jacobian(&[2.0, 3.0]).unwrap();
        assert_abs_diff_eq!(jacobian[0][0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(jacobian[1][1], 2.0, epsilon = 1e-6);

        let mut out = vec![0.0; 2];
        (v.as_fn())(&[1.0, 4.0], out.as_mut_slice());
        assert_eq!(out, vec![5.0, 4.0]);

        assert!(v.eval(&[1.0]).is_err());
        assert!(v.eval_into(&[1.0, 2.0], &mut [0.0; 1]).is_err());
    }

    #[test]
    fn test_eval_parallel() {
        let v = CompiledVectorFunction::new(
            vec!["x".into(), "y".into()],
            vec!["f0".into(), "f1".into()],
            vec![sum(), product()],
        );
        let inputs: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64, 2.0]).collect();
        let results = v.eval_parallel(&inputs).unwrap();
        assert_eq!(results.len(), 100);
        assert_eq!(results[10], vec![12.0, 20.0]);

        assert!(v.eval_parallel(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_display() {
        let f = product();
        assert!(f.to_string().contains("x, y"));
        assert!(f.to_string().contains("x*y"));
        assert!(format!("{f:?}").contains("CompiledFunction"));
    }
}
