//! Vector-valued functions assembled from scalar elements.
//!
//! A [`VectorFunctionController`] owns `num_values` element slots, each
//! holding an optional [`ScalarFunctionController`] over the same
//! `num_parameters` inputs. Counts, names and elements can be edited in any
//! order; [`synchronize`](VectorFunctionController::synchronize) brings the
//! elements back in line with the vector.
//!
//! ```
//! use scriptfn::VectorFunctionController;
//!
//! let mut v = VectorFunctionController::new();
//! v.set_num_parameters(2);
//! v.set_num_values(2);
//! v.synchronize();
//!
//! v.element_mut(0).unwrap().as_mut().unwrap().set_value_expression(Some("x0 + x1".into()));
//! v.element_mut(1).unwrap().as_mut().unwrap().set_value_expression(Some("x0 * x1".into()));
//!
//! let f = v.compiled_function().unwrap();
//! assert_eq!(f.eval(&[2.0, 3.0]).unwrap(), vec![5.0, 6.0]);
//! ```

use std::sync::Arc;

use colored::Colorize;
use log::{debug, trace};

use crate::cache::CompiledCache;
use crate::config::ControllerConfig;
use crate::dual::DualList;
use crate::errors::{FunctionError, ValidationError, VectorAssemblyError};
use crate::function::CompiledVectorFunction;
use crate::loader::{EvalexprLoader, ExpressionLoader};
use crate::scalar::ScalarFunctionController;
use crate::state::{ElementState, NullableList, NullableText, VectorFunctionState};

/// Which element properties [`synchronize_with`](VectorFunctionController::synchronize_with)
/// overwrites on elements that already exist.
///
/// Dimensions are always forced; new elements always receive the vector's
/// parameter names and their function name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Replace element parameter names with the vector's
    pub parameter_names: bool,
    /// Rename elements after the vector's function names
    pub function_names: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            parameter_names: false,
            function_names: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StaleFlags {
    parameter_names: bool,
    function_names: bool,
}

/// Definition of a vector function and its cached compiled form.
#[derive(Clone)]
pub struct VectorFunctionController {
    num_parameters: usize,
    num_values: usize,
    name: Option<String>,
    description: Option<String>,
    parameter_names: DualList,
    function_names: DualList,
    stale: StaleFlags,
    elements: Vec<Option<ScalarFunctionController>>,
    cache: CompiledCache<CompiledVectorFunction>,
    config: Arc<ControllerConfig>,
    loader: Arc<dyn ExpressionLoader>,
}

impl VectorFunctionController {
    /// Creates a vector with one parameter and one empty element slot.
    pub fn new() -> Self {
        Self::with_loader(Arc::new(EvalexprLoader::default()))
    }

    /// Creates a vector whose elements compile through `loader`.
    pub fn with_loader(loader: Arc<dyn ExpressionLoader>) -> Self {
        Self::with_parts(Arc::new(ControllerConfig::default()), loader)
    }

    /// Creates a vector whose elements share `config` and `loader`.
    pub fn with_parts(config: Arc<ControllerConfig>, loader: Arc<dyn ExpressionLoader>) -> Self {
        Self {
            num_parameters: 1,
            num_values: 1,
            name: None,
            description: None,
            parameter_names: DualList::new(),
            function_names: DualList::new(),
            stale: StaleFlags {
                parameter_names: true,
                function_names: true,
            },
            elements: vec![None],
            cache: CompiledCache::new(),
            config,
            loader,
        }
    }

    /// Configuration shared with the elements this vector creates.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn resolve_parameter_names(&mut self) {
        let count_is_newer = std::mem::replace(&mut self.stale.parameter_names, false);
        self.parameter_names.reconcile(
            &self.config.names,
            &mut self.num_parameters,
            count_is_newer,
            &self.config.parameters,
            true,
        );
    }

    fn resolve_function_names(&mut self) {
        let count_is_newer = std::mem::replace(&mut self.stale.function_names, false);
        let before = self.num_values;
        self.function_names.reconcile(
            &self.config.names,
            &mut self.num_values,
            count_is_newer,
            &self.config.functions,
            true,
        );
        if self.num_values != before {
            trace!("num_values {before} -> {} adopted from function names", self.num_values);
            self.elements.resize_with(self.num_values, || None);
        }
    }

    /// Number of inputs, taken from parameter names written as text if needed.
    pub fn num_parameters(&mut self) -> usize {
        self.resolve_parameter_names();
        self.num_parameters
    }

    /// Sets the number of parameters. Elements pick it up on the next
    /// [`synchronize`](Self::synchronize).
    pub fn set_num_parameters(&mut self, num_parameters: usize) {
        if self.num_parameters() == num_parameters {
            return;
        }
        self.num_parameters = num_parameters;
        self.stale.parameter_names = true;
        self.cache.invalidate();
    }

    /// Number of values and element slots, taken from function names written
    /// as text if needed.
    pub fn num_values(&mut self) -> usize {
        self.resolve_function_names();
        self.num_values
    }

    /// Sets the number of values, dropping or adding empty element slots at
    /// the end immediately.
    pub fn set_num_values(&mut self, num_values: usize) {
        if self.num_values() == num_values {
            return;
        }
        self.num_values = num_values;
        self.elements.resize_with(num_values, || None);
        self.stale.function_names = true;
        self.cache.invalidate();
    }

    /// Display name of the vector.
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

    /// Parameter names, generated where missing.
    pub fn parameter_names(&mut self) -> &[String] {
        self.resolve_parameter_names();
        self.parameter_names.items(&self.config.names).unwrap_or_default()
    }

    /// Sets the parameter names; a non-empty list also sets `num_parameters`.
    pub fn set_parameter_names(&mut self, names: Option<Vec<String>>) {
        match names.filter(|names| !names.is_empty()) {
            Some(names) => {
                self.num_parameters = names.len();
                self.stale.parameter_names = false;
                self.parameter_names.set_items(Some(names));
            }
            None => {
                self.stale.parameter_names = true;
                self.parameter_names.set_items(None);
            }
        }
        self.cache.invalidate();
    }

    /// Parameter names as one delimited string.
    pub fn parameter_names_text(&mut self) -> Option<&str> {
        self.resolve_parameter_names();
        self.parameter_names.text(&self.config.names)
    }

    /// Sets the parameter names from a delimited string.
    ///
    /// The string is parsed on the next read; a non-empty result then sets
    /// `num_parameters`.
    pub fn set_parameter_names_text(&mut self, text: Option<String>) {
        self.stale.parameter_names = text.is_none();
        self.parameter_names.set_text(text);
        self.cache.invalidate();
    }

    /// Function names, one per element, generated where missing.
    pub fn function_names(&mut self) -> &[String] {
        self.resolve_function_names();
        self.function_names.items(&self.config.names).unwrap_or_default()
    }

    /// Sets the function names; a non-empty list also sets `num_values`.
    pub fn set_function_names(&mut self, names: Option<Vec<String>>) {
        match names.filter(|names| !names.is_empty()) {
            Some(names) => {
                self.num_values = names.len();
                self.elements.resize_with(self.num_values, || None);
                self.stale.function_names = false;
                self.function_names.set_items(Some(names));
            }
            None => {
                self.stale.function_names = true;
                self.function_names.set_items(None);
            }
        }
        self.cache.invalidate();
    }

    /// Function names as one delimited string.
    pub fn function_names_text(&mut self) -> Option<&str> {
        self.resolve_function_names();
        self.function_names.text(&self.config.names)
    }

    /// Sets the function names from a delimited string.
    ///
    /// The string is parsed on the next read, including the next indexed
    /// element access; a non-empty result then sets `num_values` and resizes
    /// the element slots.
    pub fn set_function_names_text(&mut self, text: Option<String>) {
        self.stale.function_names = text.is_none();
        self.function_names.set_text(text);
        self.cache.invalidate();
    }

    fn check_index(&mut self, index: usize) -> Result<(), ValidationError> {
        let len = self.num_values();
        if index >= len {
            return Err(ValidationError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    /// Element slot `index`, `None` if the slot is empty.
    ///
    /// Function names written as text are resolved first, so the bound is the
    /// current `num_values`.
    ///
    /// # Errors
    /// Returns `ValidationError::IndexOutOfRange` if `index >= num_values`.
    pub fn element(
        &mut self,
        index: usize,
    ) -> Result<Option<&ScalarFunctionController>, ValidationError> {
        self.check_index(index)?;
        Ok(self.elements[index].as_ref())
    }

    /// Mutable access to element slot `index`.
    ///
    /// The vector's compiled function is invalidated, since the element may be
    /// edited through the returned reference.
    pub fn element_mut(
        &mut self,
        index: usize,
    ) -> Result<&mut Option<ScalarFunctionController>, ValidationError> {
        self.check_index(index)?;
        self.cache.invalidate();
        Ok(&mut self.elements[index])
    }

    /// Replaces element slot `index`.
    ///
    /// With `adopt_element_dimension` enabled in the configuration, a new
    /// element whose dimension differs from `num_parameters` changes
    /// `num_parameters`. The other elements are updated by the next
    /// [`synchronize`](Self::synchronize).
    pub fn set_element(
        &mut self,
        index: usize,
        element: Option<ScalarFunctionController>,
    ) -> Result<(), ValidationError> {
        self.check_index(index)?;
        let mut element = element;
        if let Some(element) = element.as_mut() {
            if self.config.adopt_element_dimension {
                self.adopt_element_dimension(element);
            }
        }
        self.elements[index] = element;
        self.cache.invalidate();
        Ok(())
    }

    /// Last writer wins: the vector takes the element's dimension.
    fn adopt_element_dimension(&mut self, element: &mut ScalarFunctionController) {
        let dimension = element.dimension();
        if dimension > 0 && dimension != self.num_parameters() {
            debug!(
                "num_parameters {} -> {dimension} adopted from element",
                self.num_parameters
            );
            self.num_parameters = dimension;
            self.stale.parameter_names = true;
            self.cache.invalidate();
        }
    }

    /// Element slots in index order, one per value.
    pub fn elements(&mut self) -> &[Option<ScalarFunctionController>] {
        self.resolve_function_names();
        &self.elements
    }

    /// [`synchronize_with`](Self::synchronize_with) using [`SyncOptions::default`].
    pub fn synchronize(&mut self) {
        self.synchronize_with(SyncOptions::default());
    }

    /// Brings names and elements in line with the counts.
    ///
    /// Missing names are generated, keeping existing non-empty names. Empty
    /// slots receive new elements built from the vector's parameter names and
    /// the slot's function name. Existing elements are resized to
    /// `num_parameters` and, depending on `options`, renamed.
    ///
    /// Calling it again without intervening writes changes nothing.
    pub fn synchronize_with(&mut self, options: SyncOptions) {
        self.resolve_function_names();
        self.elements.truncate(self.num_values);

        let parameter_names = self.parameter_names().to_vec();
        let function_names = self.function_names().to_vec();
        let num_parameters = self.num_parameters;
        self.elements.resize_with(self.num_values, || None);

        let mut changed = false;
        for (index, slot) in self.elements.iter_mut().enumerate() {
            let function_name = &function_names[index];
            match slot {
                None => {
                    debug!("creating element {index} ({function_name})");
                    let mut element = ScalarFunctionController::with_parts(
                        Arc::clone(&self.config),
                        Arc::clone(&self.loader),
                    );
                    element.set_dimension(num_parameters);
                    element.set_parameter_names(Some(parameter_names.clone()));
                    element.set_name(Some(function_name.clone()));
                    *slot = Some(element);
                    changed = true;
                }
                Some(element) => {
                    if element.dimension() != num_parameters {
                        trace!("resizing element {index} to {num_parameters}");
                        element.set_dimension(num_parameters);
                        changed = true;
                    }
                    if options.parameter_names && element.parameter_names() != parameter_names {
                        element.set_parameter_names(Some(parameter_names.clone()));
                        changed = true;
                    }
                    if options.function_names && element.name() != Some(function_name.as_str()) {
                        element.set_name(Some(function_name.clone()));
                        changed = true;
                    }
                }
            }
        }
        if changed {
            self.cache.invalidate();
        }
    }

    /// True if the compiled vector function and every element are up to date.
    pub fn is_loader_consistent(&self) -> bool {
        self.cache.is_consistent()
            && self
                .elements
                .iter()
                .all(|slot| slot.as_ref().is_some_and(|element| element.is_loader_consistent()))
    }

    /// Compiles every element in index order and combines the results.
    ///
    /// # Errors
    /// Returns `FunctionError::VectorAssembly` naming the first element that
    /// is missing, has the wrong dimension or fails to compile.
    pub fn compiled_function(&mut self) -> Result<CompiledVectorFunction, FunctionError> {
        if let Some(compiled) = self.cache.fresh() {
            return Ok(compiled.clone());
        }
        let parameter_names = self.parameter_names().to_vec();
        let function_names = self.function_names().to_vec();
        let num_parameters = self.num_parameters;

        let mut components = Vec::with_capacity(self.elements.len());
        for (index, slot) in self.elements.iter_mut().enumerate() {
            let element = slot
                .as_mut()
                .ok_or(VectorAssemblyError::MissingElement { index })?;
            let dimension = element.dimension();
            if dimension != num_parameters {
                return Err(VectorAssemblyError::DimensionMismatch {
                    index,
                    expected: num_parameters,
                    got: dimension,
                }
                .into());
            }
            let compiled = element
                .compiled_function()
                .map_err(|source| VectorAssemblyError::Element {
                    index,
                    source: Box::new(source),
                })?;
            components.push(compiled);
        }

        debug!(
            "assembled {} with {} component(s)",
            self.name.as_deref().unwrap_or("<unnamed>"),
            components.len()
        );
        let compiled = CompiledVectorFunction::new(parameter_names, function_names, components);
        Ok(self.cache.store(compiled).clone())
    }

    /// Captures the definition, including every element.
    pub fn save_state(&mut self) -> VectorFunctionState {
        let parameter_names = NullableList::from_option(Some(self.parameter_names()));
        let function_names = NullableList::from_option(Some(self.function_names()));
        let elements = self
            .elements
            .iter_mut()
            .map(|slot| match slot {
                Some(element) => ElementState {
                    is_null: false,
                    function: element.save_state(),
                },
                None => ElementState::null(),
            })
            .collect();
        VectorFunctionState {
            num_parameters: self.num_parameters,
            num_values: self.num_values,
            name: NullableText::from_option(self.name.as_deref()),
            description: NullableText::from_option(self.description.as_deref()),
            parameter_names,
            function_names,
            elements,
        }
    }

    /// Rebuilds a vector from a saved state. Elements are restored as saved,
    /// without adopting their dimensions.
    ///
    /// # Errors
    /// Returns `ValidationError::LengthMismatch` if a name list does not match
    /// its count, there are more elements than values, or an element's
    /// gradient list is invalid.
    pub fn from_state(
        state: VectorFunctionState,
        config: Arc<ControllerConfig>,
        loader: Arc<dyn ExpressionLoader>,
    ) -> Result<Self, ValidationError> {
        check_saved_length("parameter names", &state.parameter_names, state.num_parameters)?;
        check_saved_length("function names", &state.function_names, state.num_values)?;
        if state.elements.len() > state.num_values {
            return Err(ValidationError::LengthMismatch {
                what: "elements",
                expected: state.num_values,
                got: state.elements.len(),
            });
        }
        let mut controller = Self::with_parts(Arc::clone(&config), Arc::clone(&loader));
        controller.num_parameters = state.num_parameters;
        controller.num_values = state.num_values;
        controller.name = state.name.into_option();
        controller.description = state.description.into_option();
        if let Some(names) = state.parameter_names.into_option() {
            controller.set_parameter_names(Some(names));
        }
        if let Some(names) = state.function_names.into_option() {
            controller.set_function_names(Some(names));
        }

        let mut elements = state
            .elements
            .into_iter()
            .map(|element| {
                if element.is_null {
                    Ok(None)
                } else {
                    ScalarFunctionController::from_state(
                        element.function,
                        Arc::clone(&config),
                        Arc::clone(&loader),
                    )
                    .map(Some)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        elements.resize_with(controller.num_values, || None);
        controller.elements = elements;
        controller.stale = StaleFlags {
            parameter_names: true,
            function_names: true,
        };
        Ok(controller)
    }

    /// Serializes [`save_state`](Self::save_state) as pretty-printed JSON.
    pub fn to_json(&mut self) -> Result<String, FunctionError> {
        Ok(serde_json::to_string_pretty(&self.save_state())?)
    }

    /// Restores a vector from JSON written by [`to_json`](Self::to_json).
    ///
    /// # Errors
    /// Returns `FunctionError::Serialization` for malformed JSON and
    /// `FunctionError::Validation` for inconsistent state.
    pub fn from_json(
        json: &str,
        config: Arc<ControllerConfig>,
        loader: Arc<dyn ExpressionLoader>,
    ) -> Result<Self, FunctionError> {
        let state: VectorFunctionState = serde_json::from_str(json)?;
        Ok(Self::from_state(state, config, loader)?)
    }
}

/// A saved non-empty name list must have one entry per counted item.
fn check_saved_length(
    what: &'static str,
    names: &NullableList,
    expected: usize,
) -> Result<(), ValidationError> {
    if names.is_null || names.items.is_empty() || names.items.len() == expected {
        return Ok(());
    }
    Err(ValidationError::LengthMismatch {
        what,
        expected,
        got: names.items.len(),
    })
}

impl Default for VectorFunctionController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VectorFunctionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorFunctionController")
            .field("num_parameters", &self.num_parameters)
            .field("num_values", &self.num_values)
            .field("name", &self.name)
            .field("parameter_names", &self.parameter_names.peek_items())
            .field("function_names", &self.function_names.peek_items())
            .field("elements", &self.elements)
            .finish()
    }
}

impl std::fmt::Display for VectorFunctionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{}: {} ({} -> {})",
            "Vector".cyan(),
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.num_parameters,
            self.num_values
        )?;
        for (index, slot) in self.elements.iter().enumerate() {
            match slot {
                Some(element) => write!(f, "[{index}] {element}")?,
                None => writeln!(f, "[{index}] {}", "<empty>".red())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CompilationError;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn sized(num_parameters: usize, num_values: usize) -> VectorFunctionController {
        let mut v = VectorFunctionController::new();
        v.set_num_parameters(num_parameters);
        v.set_num_values(num_values);
        v
    }

    fn element_of(v: &mut VectorFunctionController, index: usize) -> &ScalarFunctionController {
        v.element(index).unwrap().unwrap()
    }

    fn define(v: &mut VectorFunctionController, index: usize, expression: &str) {
        v.element_mut(index)
            .unwrap()
            .as_mut()
            .unwrap()
            .set_value_expression(Some(expression.into()));
    }

    #[test]
    fn test_new_vector() {
        let mut v = VectorFunctionController::new();
        assert_eq!(v.num_parameters(), 1);
        assert_eq!(v.num_values(), 1);
        assert_eq!(v.elements().len(), 1);
        assert!(v.element(0).unwrap().is_none());
        assert!(!v.is_loader_consistent());
    }

    #[test]
    fn test_synchronize_generates_defaults() {
        let mut v = sized(2, 3);
        v.synchronize();
        assert_eq!(v.parameter_names(), ["x0", "x1"]);
        assert_eq!(v.function_names(), ["f0", "f1", "f2"]);
        assert_eq!(v.elements().len(), 3);
        for (index, slot) in v.elements.iter_mut().enumerate() {
            let element = slot.as_mut().unwrap();
            assert_eq!(element.dimension(), 2);
            assert_eq!(element.parameter_names(), ["x0", "x1"]);
            assert_eq!(element.name(), Some(format!("f{index}").as_str()));
        }
    }

    #[test]
    fn test_synchronize_is_idempotent() {
        let mut v = sized(2, 2);
        v.synchronize();
        define(&mut v, 0, "x0 + x1");
        define(&mut v, 1, "x0 - x1");
        v.compiled_function().unwrap();
        assert!(v.is_loader_consistent());

        let before = v.save_state();
        v.synchronize();
        assert!(v.is_loader_consistent());
        assert_eq!(v.save_state(), before);
    }

    #[test]
    fn test_compile_and_evaluate() {
        let mut v = sized(2, 2);
        v.set_parameter_names(Some(strings(&["a", "b"])));
        v.synchronize();
        define(&mut v, 0, "a + b");
        define(&mut v, 1, "a * b");

        let f = v.compiled_function().unwrap();
        assert_eq!(f.parameter_names(), ["a", "b"]);
        assert_eq!(f.function_names(), ["f0", "f1"]);
        assert_eq!(f.eval(&[2.0, 3.0]).unwrap(), vec![5.0, 6.0]);
    }

    #[test]
    fn test_element_dimension_is_adopted() {
        let mut v = sized(2, 3);
        v.synchronize();

        let mut wide = ScalarFunctionController::new();
        wide.set_dimension(5);
        v.set_element(1, Some(wide)).unwrap();
        assert_eq!(v.num_parameters(), 5);
        assert_eq!(element_of(&mut v, 0).clone().dimension(), 2);

        v.synchronize();
        assert_eq!(v.parameter_names(), ["x0", "x1", "x2", "x3", "x4"]);
        for slot in v.elements.iter_mut() {
            assert_eq!(slot.as_mut().unwrap().dimension(), 5);
        }
    }

    #[test]
    fn test_adoption_can_be_disabled() {
        let config = ControllerConfig {
            adopt_element_dimension: false,
            ..Default::default()
        };
        let mut v = VectorFunctionController::with_parts(
            Arc::new(config),
            Arc::new(EvalexprLoader::default()),
        );
        v.set_num_parameters(2);

        let mut wide = ScalarFunctionController::new();
        wide.set_dimension(5);
        wide.set_value_expression(Some("x4".into()));
        v.set_element(0, Some(wide)).unwrap();
        assert_eq!(v.num_parameters(), 2);

        let err = v.compiled_function().unwrap_err();
        assert!(matches!(
            err,
            FunctionError::VectorAssembly(VectorAssemblyError::DimensionMismatch {
                index: 0,
                expected: 2,
                got: 5
            })
        ));
    }

    #[test]
    fn test_element_bounds() {
        let mut v = sized(1, 2);
        assert_eq!(
            v.element(2).unwrap_err(),
            ValidationError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert!(v.element_mut(2).is_err());
        assert!(v.set_element(7, None).is_err());
        assert!(v.set_element(1, None).is_ok());
    }

    #[test]
    fn test_missing_element() {
        let mut v = sized(1, 2);
        let err = v.compiled_function().unwrap_err();
        match err {
            FunctionError::VectorAssembly(err) => {
                assert!(matches!(err, VectorAssemblyError::MissingElement { .. }));
                assert_eq!(err.index(), 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failing_element_names_index() {
        let mut v = sized(1, 2);
        v.synchronize();
        define(&mut v, 0, "x0");
        let err = v.compiled_function().unwrap_err();
        match err {
            FunctionError::VectorAssembly(VectorAssemblyError::Element { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(
                    *source,
                    FunctionError::Compilation(CompilationError::MissingDefinition(_))
                ));
            }
            other => panic!("unexpected error: {other}"),
        }

        define(&mut v, 1, "2 * x0");
        assert_eq!(v.compiled_function().unwrap().eval(&[3.0]).unwrap(), vec![3.0, 6.0]);
    }

    #[test]
    fn test_num_values_resizes_immediately() {
        let mut v = sized(1, 3);
        v.synchronize();
        v.set_function_names(Some(strings(&["a", "b", "c"])));

        v.set_num_values(4);
        assert_eq!(v.elements().len(), 4);
        assert!(v.element(3).unwrap().is_none());
        assert_eq!(v.function_names(), ["a", "b", "c", "f3"]);

        v.set_num_values(2);
        assert_eq!(v.elements().len(), 2);
        assert_eq!(v.function_names(), ["a", "b"]);
    }

    #[test]
    fn test_function_names_text_sets_count() {
        let mut v = VectorFunctionController::new();
        v.set_function_names_text(Some("u; v; w".into()));
        assert_eq!(v.num_values(), 3);
        assert_eq!(v.elements().len(), 3);
        assert_eq!(v.function_names_text(), Some("u; v; w"));

        v.synchronize();
        assert_eq!(element_of(&mut v, 2).name(), Some("w"));
    }

    #[test]
    fn test_parameter_name_sync_option() {
        let mut v = sized(2, 1);
        v.set_parameter_names(Some(strings(&["a", "b"])));
        v.synchronize();
        v.element_mut(0)
            .unwrap()
            .as_mut()
            .unwrap()
            .set_parameter_names(Some(strings(&["p", "q"])));

        v.synchronize();
        assert_eq!(element_of(&mut v, 0).clone().parameter_names(), ["p", "q"]);

        v.synchronize_with(SyncOptions {
            parameter_names: true,
            function_names: true,
        });
        assert_eq!(element_of(&mut v, 0).clone().parameter_names(), ["a", "b"]);
    }

    #[test]
    fn test_element_edit_invalidates_vector() {
        let mut v = sized(1, 1);
        v.synchronize();
        define(&mut v, 0, "x0");
        v.compiled_function().unwrap();
        assert!(v.is_loader_consistent());

        define(&mut v, 0, "x0 + 1");
        assert!(!v.is_loader_consistent());
        assert_eq!(v.compiled_function().unwrap().eval(&[1.0]).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_state_round_trip() {
        let mut v = sized(2, 3);
        v.set_name(Some("model".into()));
        v.synchronize();
        define(&mut v, 0, "x0");
        define(&mut v, 1, "x1");
        v.set_element(2, None).unwrap();

        let state = v.save_state();
        assert_eq!(state.elements.len(), 3);
        assert!(state.elements[2].is_null);

        let json = v.to_json().unwrap();
        let mut restored = VectorFunctionController::from_json(
            &json,
            Arc::new(ControllerConfig::default()),
            Arc::new(EvalexprLoader::default()),
        )
        .unwrap();
        assert_eq!(restored.save_state(), state);
        assert_eq!(restored.name(), Some("model"));
        assert!(restored.element(2).unwrap().is_none());
    }

    #[test]
    fn test_from_state_rejects_extra_elements() {
        let state = VectorFunctionState {
            num_values: 1,
            elements: vec![ElementState::null(), ElementState::null()],
            ..Default::default()
        };
        let result = VectorFunctionController::from_state(
            state,
            Arc::new(ControllerConfig::default()),
            Arc::new(EvalexprLoader::default()),
        );
        assert!(matches!(
            result,
            Err(ValidationError::LengthMismatch { what: "elements", .. })
        ));
    }

    #[test]
    fn test_from_state_rejects_short_function_names() {
        let mut v = sized(1, 3);
        v.synchronize();
        let mut state = v.save_state();
        state.function_names = NullableList::from_option(Some(strings(&["f0", "f1"]).as_slice()));

        let result = VectorFunctionController::from_state(
            state,
            Arc::new(ControllerConfig::default()),
            Arc::new(EvalexprLoader::default()),
        );
        assert_eq!(
            result.unwrap_err(),
            ValidationError::LengthMismatch {
                what: "function names",
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn test_from_state_keeps_every_element() {
        let mut v = sized(2, 3);
        v.synchronize();
        let mut state = v.save_state();
        state.function_names = NullableList::null();
        state.parameter_names = NullableList::null();

        let mut restored = VectorFunctionController::from_state(
            state,
            Arc::new(ControllerConfig::default()),
            Arc::new(EvalexprLoader::default()),
        )
        .unwrap();
        assert_eq!(restored.num_values(), 3);
        assert_eq!(restored.elements().len(), 3);
        assert!(restored.elements().iter().all(Option::is_some));
        assert_eq!(restored.function_names(), ["f0", "f1", "f2"]);
    }

    #[test]
    fn test_element_bounds_follow_function_names_text() {
        let mut v = VectorFunctionController::new();
        v.set_function_names_text(Some("u; v; w".into()));

        assert!(v.element(2).unwrap().is_none());
        assert_eq!(v.elements().len(), 3);
        assert_eq!(
            v.element(3).unwrap_err(),
            ValidationError::IndexOutOfRange { index: 3, len: 3 }
        );
        assert!(v.element_mut(2).is_ok());
    }
}
