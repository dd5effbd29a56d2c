//! Script-defined scalar and vector functions with lazy compilation.
//!
//! This crate keeps the textual definition of mathematical functions (parameter
//! names, value expressions and optional gradient expressions) and compiles
//! them on demand. Expressions are parsed with
//! [evalexpr](https://github.com/ISibboI/evalexpr) and turned into native
//! closures.
//!
//! # Features
//!
//! - Name lists that can be edited either as text (`"x; y"`) or as arrays
//! - Generated default names (`x0, x1, ...`, `f0, f1, ...`)
//! - An invalidation cascade so compiled functions are rebuilt only when their
//!   definition changed
//! - Vector functions assembled from scalar elements, kept in line with
//!   `synchronize`
//! - Analytic gradients with a finite-difference fallback
//! - JSON state persistence
//!
//! # Example
//!
//! ```rust
//! use scriptfn::VectorFunctionController;
//!
//! let mut v = VectorFunctionController::new();
//! v.set_parameter_names_text(Some("x; y".into()));
//! v.set_function_names(Some(vec!["sum".into(), "product".into()]));
//! v.synchronize();
//!
//! for (index, expression) in ["x + y", "x * y"].into_iter().enumerate() {
//!     if let Some(element) = v.element_mut(index).unwrap() {
//!         element.set_value_expression(Some(expression.into()));
//!     }
//! }
//!
//! let f = v.compiled_function().unwrap();
//! assert_eq!(f.eval(&[2.0, 5.0]).unwrap(), vec![7.0, 10.0]);
//! ```

pub use config::ControllerConfig;
pub use errors::FunctionError;
pub use function::{CompiledFunction, CompiledVectorFunction};
pub use loader::{EvalexprLoader, ExpressionLoader};
pub use scalar::ScalarFunctionController;
pub use vector::{SyncOptions, VectorFunctionController};

pub mod prelude {
    pub use crate::backends::vector::Vector;
    pub use crate::config::ControllerConfig;
    pub use crate::function::{CompiledFunction, CompiledVectorFunction};
    pub use crate::loader::{EvalexprLoader, ExpressionLoader};
    pub use crate::names::{NameListFormat, NamingConvention};
    pub use crate::scalar::ScalarFunctionController;
    pub use crate::vector::{SyncOptions, VectorFunctionController};
}

/// Input types accepted by compiled functions
pub mod backends {
    pub mod vector;
}
/// Build-if-stale cache shared by the controllers
mod cache;
/// Controller configuration
pub mod config;
/// Conversion from parsed expressions to closures
pub mod convert;
/// Lists with a string and an array form
pub mod dual;
/// Error types for the various failure modes
pub mod errors;
/// Central finite differences
pub mod finite_difference;
/// Compiled scalar and vector functions
pub mod function;
/// Expression loaders
pub mod loader;
/// Name list parsing, formatting and generation
pub mod names;
/// Scalar function controller
pub mod scalar;
/// Serializable controller state
pub mod state;
/// Function type aliases
pub mod types;
/// Vector function controller
pub mod vector;
