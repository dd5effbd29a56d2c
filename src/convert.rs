//! Conversion of evalexpr operator trees into callable closures.
//!
//! The loader parses expression strings with evalexpr and hands the tree to
//! [`build_closure`], which walks it once and produces a nested closure that
//! reads parameters by index. Evaluation never touches the tree again.
//!
//! Supported:
//! * Arithmetic: `+ - * / % ^` and unary minus
//! * Numeric constants, plus `pi` and `e` unless a parameter shadows them
//! * Functions: `abs ln log sqrt exp sin cos tan asin acos atan sinh cosh tanh
//!   floor ceil round` and the two-argument `pow min max atan2`; evalexpr's
//!   `math::` prefix is accepted

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use evalexpr::{Node, Operator};

use crate::errors::ConvertError;
use crate::types::ScalarFn;

type Thunk = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Converts an evalexpr tree into a closure over a parameter slice.
///
/// # Arguments
/// * `node` - Root of the evalexpr tree
/// * `var_map` - Maps parameter names to their index in the input slice
///
/// # Returns
/// * `Result<ScalarFn, ConvertError>` - The callable, or the first unsupported construct
pub fn build_closure(node: &Node, var_map: &HashMap<String, usize>) -> Result<ScalarFn, ConvertError> {
    let thunk = build_thunk(node, var_map)?;
    let fun: ScalarFn = Arc::new(thunk);
    Ok(fun)
}

fn build_thunk(node: &Node, var_map: &HashMap<String, usize>) -> Result<Thunk, ConvertError> {
    let children = node.children();
    match node.operator() {
        Operator::RootNode => match children {
            [single] => build_thunk(single, var_map),
            [] => Err(ConvertError::UnsupportedOperator("empty expression".to_string())),
            _ => Err(ConvertError::MultipleExpressions),
        },
        // evalexpr may produce n-ary additions and multiplications
        Operator::Add => fold(children, var_map, |a, b| a + b),
        Operator::Mul => fold(children, var_map, |a, b| a * b),
        Operator::Sub => binary(children, var_map, |a, b| a - b),
        Operator::Div => binary(children, var_map, |a, b| a / b),
        Operator::Mod => binary(children, var_map, |a, b| a % b),
        Operator::Exp => {
            // integer exponents are common and cheaper through powi
            if let [base, exponent] = children {
                if let Operator::Const {
                    value: evalexpr::Value::Int(n),
                } = exponent.operator()
                {
                    if let Ok(n) = i32::try_from(*n) {
                        let base = build_thunk(base, var_map)?;
                        return Ok(Box::new(move |x: &[f64]| base(x).powi(n)));
                    }
                }
            }
            binary(children, var_map, f64::powf)
        }
        Operator::Neg => {
            let inner = single_child(children, var_map, "-")?;
            Ok(Box::new(move |x: &[f64]| -inner(x)))
        }
        Operator::Const { value } => {
            let constant = match value {
                evalexpr::Value::Float(f) => *f,
                evalexpr::Value::Int(i) => *i as f64,
                other => return Err(ConvertError::NonNumericConstant(format!("{other:?}"))),
            };
            Ok(Box::new(move |_: &[f64]| constant))
        }
        Operator::VariableIdentifierRead { identifier } => match var_map.get(identifier.as_str()) {
            Some(&index) => Ok(Box::new(move |x: &[f64]| x[index])),
            None => match identifier.as_str() {
                "pi" => Ok(Box::new(|_: &[f64]| std::f64::consts::PI)),
                "e" => Ok(Box::new(|_: &[f64]| std::f64::consts::E)),
                _ => Err(ConvertError::UnknownVariable(identifier.to_string())),
            },
        },
        Operator::FunctionIdentifier { identifier } => build_call(identifier, children, var_map),
        other => Err(ConvertError::UnsupportedOperator(format!("{other:?}"))),
    }
}

fn fold(
    children: &[Node],
    var_map: &HashMap<String, usize>,
    op: fn(f64, f64) -> f64,
) -> Result<Thunk, ConvertError> {
    let mut operands = children
        .iter()
        .map(|child| build_thunk(child, var_map))
        .collect::<Result<Vec<_>, _>>()?;
    match operands.len() {
        0 => Err(ConvertError::UnsupportedOperator("operator without operands".to_string())),
        1 => Ok(operands.remove(0)),
        _ => Ok(Box::new(move |x: &[f64]| {
            operands[1..]
                .iter()
                .fold(operands[0](x), |acc, operand| op(acc, operand(x)))
        })),
    }
}

fn binary(
    children: &[Node],
    var_map: &HashMap<String, usize>,
    op: fn(f64, f64) -> f64,
) -> Result<Thunk, ConvertError> {
    match children {
        [lhs, rhs] => {
            let lhs = build_thunk(lhs, var_map)?;
            let rhs = build_thunk(rhs, var_map)?;
            Ok(Box::new(move |x: &[f64]| op(lhs(x), rhs(x))))
        }
        _ => Err(ConvertError::UnsupportedOperator(format!(
            "binary operator with {} operands",
            children.len()
        ))),
    }
}

fn single_child(
    children: &[Node],
    var_map: &HashMap<String, usize>,
    name: &str,
) -> Result<Thunk, ConvertError> {
    match children {
        [child] => build_thunk(child, var_map),
        _ => Err(ConvertError::Arity {
            name: name.to_string(),
            expected: 1,
            got: children.len(),
        }),
    }
}

/// Flattens `f(a, b)`, which evalexpr parses as a call on a tuple node.
fn call_arguments(children: &[Node]) -> &[Node] {
    match children {
        [tuple] if matches!(tuple.operator(), Operator::Tuple) => tuple.children(),
        _ => children,
    }
}

fn build_call(
    identifier: &str,
    children: &[Node],
    var_map: &HashMap<String, usize>,
) -> Result<Thunk, ConvertError> {
    let name = identifier.strip_prefix("math::").unwrap_or(identifier);
    let unary: Option<fn(f64) -> f64> = match name {
        "abs" => Some(f64::abs),
        "ln" | "log" => Some(f64::ln),
        "sqrt" => Some(f64::sqrt),
        "exp" => Some(f64::exp),
        "sin" => Some(f64::sin),
        "cos" => Some(f64::cos),
        "tan" => Some(f64::tan),
        "asin" => Some(f64::asin),
        "acos" => Some(f64::acos),
        "atan" => Some(f64::atan),
        "sinh" => Some(f64::sinh),
        "cosh" => Some(f64::cosh),
        "tanh" => Some(f64::tanh),
        "floor" => Some(f64::floor),
        "ceil" => Some(f64::ceil),
        "round" => Some(f64::round),
        _ => None,
    };
    let args = call_arguments(children);

    if let Some(f) = unary {
        let arg = single_child(args, var_map, name)?;
        return Ok(Box::new(move |x: &[f64]| f(arg(x))));
    }

    let binary_fn: fn(f64, f64) -> f64 = match name {
        "pow" => f64::powf,
        "min" => f64::min,
        "max" => f64::max,
        "atan2" => f64::atan2,
        _ => return Err(ConvertError::UnsupportedFunction(identifier.to_string())),
    };
    if args.len() != 2 {
        return Err(ConvertError::Arity {
            name: name.to_string(),
            expected: 2,
            got: args.len(),
        });
    }
    binary(args, var_map, binary_fn)
}

/// Collects the identifiers an expression reads.
///
/// Function names are not included.
pub fn extract_symbols(node: &Node) -> HashSet<String> {
    let mut symbols = HashSet::new();
    collect_symbols(node, &mut symbols);
    symbols
}

fn collect_symbols(node: &Node, symbols: &mut HashSet<String>) {
    match node.operator() {
        Operator::VariableIdentifierRead { identifier } => {
            symbols.insert(identifier.to_string());
        }
        _ => {
            for child in node.children() {
                collect_symbols(child, symbols);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use evalexpr::{build_operator_tree, DefaultNumericTypes};

    fn compile(expression: &str, names: &[&str]) -> Result<ScalarFn, ConvertError> {
        let node = build_operator_tree::<DefaultNumericTypes>(expression).unwrap();
        let var_map = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        build_closure(&node, &var_map)
    }

    #[test]
    fn test_arithmetic() {
        let f = compile("2*x + y^2 - z/4", &["x", "y", "z"]).unwrap();
        assert_eq!(f(&[1.0, 2.0, 8.0]), 4.0);

        let f = compile("-(x % 3) + 1", &["x"]).unwrap();
        assert_eq!(f(&[7.0]), 0.0);
    }

    #[test]
    fn test_parameter_order_follows_map() {
        let f = compile("x - y", &["y", "x"]).unwrap();
        assert_eq!(f(&[1.0, 5.0]), 4.0);
    }

    #[test]
    fn test_fractional_power() {
        let f = compile("x^0.5", &["x"]).unwrap();
        assert_relative_eq!(f(&[9.0]), 3.0);
    }

    #[test]
    fn test_functions() {
        let f = compile("sin(x) + math::cos(x) + sqrt(y)", &["x", "y"]).unwrap();
        assert_relative_eq!(f(&[0.0, 4.0]), 3.0);

        let f = compile("max(x, y) + pow(2, 3)", &["x", "y"]).unwrap();
        assert_eq!(f(&[1.0, 3.0]), 11.0);

        let f = compile("ln(e) * pi", &[]).unwrap();
        assert_relative_eq!(f(&[]), std::f64::consts::PI);
    }

    #[test]
    fn test_parameter_shadows_constant() {
        let f = compile("e * 2", &["e"]).unwrap();
        assert_eq!(f(&[3.0]), 6.0);
    }

    #[test]
    fn test_unknown_variable() {
        let err = compile("x + q", &["x"]).err().unwrap();
        assert_eq!(err, ConvertError::UnknownVariable("q".into()));
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(
            compile("x > 1", &["x"]),
            Err(ConvertError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            compile("gamma(x)", &["x"]),
            Err(ConvertError::UnsupportedFunction(_))
        ));
        assert!(matches!(
            compile("min(x)", &["x"]),
            Err(ConvertError::Arity { expected: 2, .. })
        ));
        assert!(matches!(
            compile("\"text\"", &[]),
            Err(ConvertError::NonNumericConstant(_))
        ));
    }

    #[test]
    fn test_extract_symbols() {
        let node = build_operator_tree::<DefaultNumericTypes>("a*sin(b) + a").unwrap();
        let symbols = extract_symbols(&node);
        assert_eq!(symbols.len(), 2);
        assert!(symbols.contains("a") && symbols.contains("b"));
    }
}
