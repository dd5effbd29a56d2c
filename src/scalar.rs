//! Scalar function definitions with lazy compilation.
//!
//! A [`ScalarFunctionController`] holds the textual definition of one scalar
//! function (dimension, parameter names, value expression and optional
//! gradient expressions) and hands out a compiled function on request.
//!
//! # Lazy state
//!
//! Parameter names and gradient expressions can be written either as a list
//! or as one delimited string. Whichever form was written last is canonical;
//! the other is derived on first read.
//!
//! Writes invalidate downstream state along a fixed cascade (see [`Stage`]):
//!
//! ```text
//! Dimension -> ParameterNames -> Expressions -> Loader
//! ```
//!
//! Nothing is recomputed eagerly. Stale parameter names are checked against
//! the dimension on their next read, stale gradient lists on the next read of
//! gradients, and the compiled function is rebuilt on the next call to
//! [`compiled_function`](ScalarFunctionController::compiled_function).
//!
//! # Example
//!
//! ```
//! use scriptfn::ScalarFunctionController;
//!
//! let mut f = ScalarFunctionController::new();
//! f.set_parameter_names_text(Some("x; y".into()));
//! f.set_value_expression(Some("x + y".into()));
//!
//! assert_eq!(f.dimension(), 2);
//! assert_eq!(f.compiled_function().unwrap().eval(&[1.0, 2.0]).unwrap(), 3.0);
//!
//! f.set_value_expression(Some("x * y".into()));
//! assert!(!f.is_loader_consistent());
//! assert_eq!(f.compiled_function().unwrap().eval(&[3.0, 2.0]).unwrap(), 6.0);
//! ```

use std::sync::Arc;

use colored::Colorize;
use log::{debug, trace, warn};

use crate::cache::CompiledCache;
use crate::config::ControllerConfig;
use crate::dual::DualList;
use crate::errors::{FunctionError, ValidationError};
use crate::function::CompiledFunction;
use crate::loader::{EvalexprLoader, ExpressionLoader};
use crate::state::{NullableList, NullableText, ScalarFunctionState};

/// Stages of the invalidation cascade, upstream first.
///
/// A write at one stage invalidates every later stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Dimension,
    ParameterNames,
    Expressions,
    Loader,
}

impl Stage {
    pub const CASCADE: [Stage; 4] = [
        Stage::Dimension,
        Stage::ParameterNames,
        Stage::Expressions,
        Stage::Loader,
    ];

    /// Stages invalidated by a write at `self`.
    pub fn downstream(self) -> impl Iterator<Item = Stage> {
        Self::CASCADE.into_iter().filter(move |stage| *stage > self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StaleFlags {
    /// Names must be checked against a newer dimension
    parameter_names: bool,
    /// Gradients must be checked against newer parameter names
    gradient_expressions: bool,
}

/// Definition of one scalar function and its cached compiled form.
#[derive(Clone)]
pub struct ScalarFunctionController {
    dimension: usize,
    name: Option<String>,
    description: Option<String>,
    parameter_names: DualList,
    value_expression: Option<String>,
    gradient_expressions: DualList,
    stale: StaleFlags,
    cache: CompiledCache<CompiledFunction>,
    config: Arc<ControllerConfig>,
    loader: Arc<dyn ExpressionLoader>,
}

impl ScalarFunctionController {
    /// Creates an empty controller of dimension 1 using [`EvalexprLoader`].
    pub fn new() -> Self {
        Self::with_loader(Arc::new(EvalexprLoader::default()))
    }

    /// Creates an empty controller compiling through `loader`.
    pub fn with_loader(loader: Arc<dyn ExpressionLoader>) -> Self {
        Self::with_parts(Arc::new(ControllerConfig::default()), loader)
    }

    /// Creates an empty controller of dimension 1.
    ///
    /// # Arguments
    /// * `config` - Name format and naming conventions, usually shared with a
    ///   vector controller
    /// * `loader` - Compiles the definition when the compiled function is requested
    pub fn with_parts(config: Arc<ControllerConfig>, loader: Arc<dyn ExpressionLoader>) -> Self {
        Self {
            dimension: 1,
            name: None,
            description: None,
            parameter_names: DualList::new(),
            value_expression: None,
            gradient_expressions: DualList::new(),
            stale: StaleFlags {
                parameter_names: true,
                gradient_expressions: true,
            },
            cache: CompiledCache::new(),
            config,
            loader,
        }
    }

    /// Configuration used for name lists and default names.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Loader used by [`compiled_function`](Self::compiled_function).
    pub fn loader(&self) -> &Arc<dyn ExpressionLoader> {
        &self.loader
    }

    /// Invalidates every stage downstream of `source`.
    fn invalidate_downstream_of(&mut self, source: Stage) {
        for stage in source.downstream() {
            trace!("{source:?} write invalidates {stage:?}");
            match stage {
                Stage::Dimension => {}
                Stage::ParameterNames => self.stale.parameter_names = true,
                Stage::Expressions => self.stale.gradient_expressions = true,
                Stage::Loader => self.cache.invalidate(),
            }
        }
    }

    /// Settles the parameter names against the dimension.
    fn resolve_parameter_names(&mut self) {
        let dimension_is_newer = std::mem::replace(&mut self.stale.parameter_names, false);
        let before = self.dimension;
        self.parameter_names.reconcile(
            &self.config.names,
            &mut self.dimension,
            dimension_is_newer,
            &self.config.parameters,
            false,
        );
        if self.dimension != before {
            trace!("dimension {before} -> {} adopted from parameter names", self.dimension);
        }
    }

    /// Settles gradient expressions against the parameter names.
    fn resolve_gradient_expressions(&mut self) {
        self.resolve_parameter_names();
        if !std::mem::replace(&mut self.stale.gradient_expressions, false) {
            return;
        }
        let len = self.gradient_expressions.items(&self.config.names).map(<[String]>::len);
        if let Some(len) = len.filter(|len| *len != self.dimension) {
            warn!(
                "dropping {len} gradient expression(s) for dimension {}",
                self.dimension
            );
            self.gradient_expressions.set_items(None);
        }
    }

    /// Size of the parameter space.
    ///
    /// A parameter list written as text is parsed here if it has not been yet,
    /// since its length may define the dimension.
    pub fn dimension(&mut self) -> usize {
        self.resolve_parameter_names();
        self.dimension
    }

    /// Sets the dimension. A new value makes the parameter names stale.
    pub fn set_dimension(&mut self, dimension: usize) {
        if self.dimension() == dimension {
            return;
        }
        self.dimension = dimension;
        self.invalidate_downstream_of(Stage::Dimension);
    }

    /// Display name, e.g. the function name inside a vector.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the display name. The compiled function stays valid.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Free-form description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Sets the description. The compiled function stays valid.
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Parameter names, one per dimension.
    ///
    /// Unset or stale names are replaced with generated defaults (`x0, x1, ...`).
    pub fn parameter_names(&mut self) -> &[String] {
        self.resolve_parameter_names();
        self.parameter_names.items(&self.config.names).unwrap_or_default()
    }

    /// Sets the parameter names. A non-empty list also sets the dimension;
    /// `None` or an empty list reverts to generated names.
    pub fn set_parameter_names(&mut self, names: Option<Vec<String>>) {
        match names.filter(|names| !names.is_empty()) {
            Some(names) => {
                self.dimension = names.len();
                self.stale.parameter_names = false;
                self.parameter_names.set_items(Some(names));
            }
            None => {
                self.stale.parameter_names = true;
                self.parameter_names.set_items(None);
            }
        }
        self.invalidate_downstream_of(Stage::ParameterNames);
    }

    /// Parameter names as one delimited string.
    pub fn parameter_names_text(&mut self) -> Option<&str> {
        self.resolve_parameter_names();
        self.parameter_names.text(&self.config.names)
    }

    /// Sets the parameter names from a delimited string, parsed on first read.
    pub fn set_parameter_names_text(&mut self, text: Option<String>) {
        self.stale.parameter_names = text.is_none();
        self.parameter_names.set_text(text);
        self.invalidate_downstream_of(Stage::ParameterNames);
    }

    /// Expression of the function value, `None` if not set.
    pub fn value_expression(&self) -> Option<&str> {
        self.value_expression.as_deref()
    }

    /// Sets the value expression; only the compiled function becomes stale.
    pub fn set_value_expression(&mut self, expression: Option<String>) {
        self.value_expression = expression;
        self.invalidate_downstream_of(Stage::Expressions);
    }

    /// True if the value expression is non-blank.
    pub fn is_value_defined(&self) -> bool {
        self.value_expression
            .as_deref()
            .is_some_and(|expression| !expression.trim().is_empty())
    }

    /// Gradient list as written, whatever its length.
    fn written_gradient_expressions(&mut self) -> Option<&[String]> {
        self.resolve_gradient_expressions();
        self.gradient_expressions.items(&self.config.names)
    }

    /// True if a gradient list is written and has one entry per parameter.
    fn gradients_fit_dimension(&mut self) -> bool {
        let dimension = self.dimension();
        self.written_gradient_expressions()
            .is_some_and(|expressions| expressions.len() == dimension)
    }

    /// Gradient expressions, one per parameter, if defined.
    ///
    /// Blank entries are components without an expression. A list written as
    /// text with another length than the dimension reads as `None`; compiling
    /// it fails with `CompilationError::GradientLength`.
    pub fn gradient_expressions(&mut self) -> Option<&[String]> {
        if !self.gradients_fit_dimension() {
            return None;
        }
        self.gradient_expressions.items(&self.config.names)
    }

    /// Sets all gradient expressions at once.
    ///
    /// # Errors
    /// Returns `ValidationError::LengthMismatch` unless the list has one entry
    /// per parameter.
    pub fn set_gradient_expressions(
        &mut self,
        expressions: Option<Vec<String>>,
    ) -> Result<(), ValidationError> {
        let dimension = self.dimension();
        if let Some(expressions) = &expressions {
            if expressions.len() != dimension {
                return Err(ValidationError::LengthMismatch {
                    what: "gradient expressions",
                    expected: dimension,
                    got: expressions.len(),
                });
            }
        }
        self.stale.gradient_expressions = false;
        self.gradient_expressions.set_items(expressions);
        self.invalidate_downstream_of(Stage::Expressions);
        Ok(())
    }

    /// Gradient expressions as one delimited string, under the same length
    /// rule as [`gradient_expressions`](Self::gradient_expressions).
    pub fn gradient_expressions_text(&mut self) -> Option<&str> {
        if !self.gradients_fit_dimension() {
            return None;
        }
        self.gradient_expressions.text(&self.config.names)
    }

    /// Sets the gradient expressions from a delimited string.
    ///
    /// The length is not checked until the function is compiled.
    pub fn set_gradient_expressions_text(&mut self, text: Option<String>) {
        self.stale.gradient_expressions = false;
        self.gradient_expressions.set_text(text);
        self.invalidate_downstream_of(Stage::Expressions);
    }

    /// Gradient expression of one component, `None` if not set.
    pub fn gradient_expression(&mut self, index: usize) -> Result<Option<&str>, ValidationError> {
        let dimension = self.dimension();
        if index >= dimension {
            return Err(ValidationError::IndexOutOfRange {
                index,
                len: dimension,
            });
        }
        Ok(self
            .gradient_expressions()
            .and_then(|expressions| expressions.get(index))
            .map(String::as_str)
            .filter(|expression| !expression.trim().is_empty()))
    }

    /// Sets the gradient expression of one component.
    ///
    /// The list is reallocated only if its length differs from the dimension;
    /// components at overlapping indices are kept.
    ///
    /// # Errors
    /// Returns `ValidationError::IndexOutOfRange` if `index >= dimension`.
    pub fn set_gradient_expression(
        &mut self,
        index: usize,
        expression: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let dimension = self.dimension();
        if index >= dimension {
            return Err(ValidationError::IndexOutOfRange {
                index,
                len: dimension,
            });
        }
        let mut expressions = self
            .written_gradient_expressions()
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        if expressions.len() != dimension {
            expressions.resize(dimension, String::new());
        }
        expressions[index] = expression.into();
        self.gradient_expressions.set_items(Some(expressions));
        self.invalidate_downstream_of(Stage::Expressions);
        Ok(())
    }

    /// True if the cached compiled function reflects the current definition.
    pub fn is_loader_consistent(&self) -> bool {
        self.cache.is_consistent()
    }

    /// Returns the compiled function, building it if the definition changed
    /// since the last build.
    ///
    /// # Errors
    /// Returns `FunctionError::Compilation` if the loader rejects the
    /// definition, e.g. `MissingDefinition` without a value expression. The
    /// cache stays stale, so the next call retries.
    pub fn compiled_function(&mut self) -> Result<CompiledFunction, FunctionError> {
        if let Some(compiled) = self.cache.fresh() {
            return Ok(compiled.clone());
        }
        self.resolve_gradient_expressions();
        let names = self.parameter_names().to_vec();
        let gradients = self.written_gradient_expressions().map(<[String]>::to_vec);
        let value = self.value_expression.clone().unwrap_or_default();

        debug!(
            "building {} (build #{})",
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.cache.builds() + 1
        );
        let compiled = self.loader.load(&names, &value, gradients.as_deref())?;
        Ok(self.cache.store(compiled).clone())
    }

    /// Captures the definition with every list in array form.
    ///
    /// A gradient list that does not fit the dimension is saved as null.
    pub fn save_state(&mut self) -> ScalarFunctionState {
        self.resolve_gradient_expressions();
        let dimension = self.dimension;
        let parameter_names = NullableList::from_option(Some(self.parameter_names()));
        let gradient_expressions = NullableList::from_option(self.gradient_expressions());
        ScalarFunctionState {
            dimension,
            name: NullableText::from_option(self.name.as_deref()),
            description: NullableText::from_option(self.description.as_deref()),
            parameter_names,
            value_expression: NullableText::from_option(self.value_expression.as_deref()),
            gradient_expressions,
        }
    }

    /// Rebuilds a controller from a saved state. All derived state starts stale.
    ///
    /// # Errors
    /// Returns `ValidationError::LengthMismatch` if the gradient list does not
    /// match the dimension.
    pub fn from_state(
        state: ScalarFunctionState,
        config: Arc<ControllerConfig>,
        loader: Arc<dyn ExpressionLoader>,
    ) -> Result<Self, ValidationError> {
        let mut controller = Self::with_parts(config, loader);
        controller.dimension = state.dimension;
        if let Some(names) = state.parameter_names.into_option() {
            controller.set_parameter_names(Some(names));
        }
        controller.name = state.name.into_option();
        controller.description = state.description.into_option();
        controller.value_expression = state.value_expression.into_option();
        if let Some(gradients) = state.gradient_expressions.into_option() {
            controller.set_gradient_expressions(Some(gradients))?;
        }
        controller.stale = StaleFlags {
            parameter_names: true,
            gradient_expressions: true,
        };
        Ok(controller)
    }

    /// Serializes [`save_state`](Self::save_state) as pretty-printed JSON.
    pub fn to_json(&mut self) -> Result<String, FunctionError> {
        Ok(serde_json::to_string_pretty(&self.save_state())?)
    }

    /// Restores a controller from JSON written by [`to_json`](Self::to_json).
    ///
    /// # Errors
    /// Returns `FunctionError::Serialization` for malformed JSON and
    /// `FunctionError::Validation` for inconsistent state.
    pub fn from_json(
        json: &str,
        config: Arc<ControllerConfig>,
        loader: Arc<dyn ExpressionLoader>,
    ) -> Result<Self, FunctionError> {
        let state: ScalarFunctionState = serde_json::from_str(json)?;
        Ok(Self::from_state(state, config, loader)?)
    }
}

impl Default for ScalarFunctionController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScalarFunctionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarFunctionController")
            .field("dimension", &self.dimension)
            .field("name", &self.name)
            .field("parameter_names", &self.parameter_names.peek_items())
            .field("value_expression", &self.value_expression)
            .field("gradient_expressions", &self.gradient_expressions.peek_items())
            .field("loader_consistent", &self.cache.is_consistent())
            .finish()
    }
}

impl std::fmt::Display for ScalarFunctionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{}: {}",
            "Function".cyan(),
            self.name.as_deref().unwrap_or("<unnamed>")
        )?;
        writeln!(f, "    {}: {}", "Dimension".cyan(), self.dimension)?;
        writeln!(
            f,
            "    {}: {:?}",
            "Parameters".cyan(),
            self.parameter_names.peek_items().unwrap_or_default()
        )?;
        writeln!(
            f,
            "    {}: {}",
            "Value".cyan(),
            self.value_expression.as_deref().unwrap_or("")
        )
    }
}
