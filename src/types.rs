use std::sync::Arc;

/// Type alias for a compiled scalar expression.
///
/// This represents a function that:
/// - Takes a slice of parameter values in parameter order
/// - Returns the value of the expression at that point
/// - Is both Send and Sync so compiled functions can be shared across threads
pub type ScalarFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Type alias for a compiled vector function.
///
/// This represents a function that:
/// - Takes a slice of parameter values
/// - Takes a mutable slice receiving one value per component
/// - Is both Send and Sync for thread safety
pub type CombinedFn = Arc<dyn Fn(&[f64], &mut [f64]) + Send + Sync>;
