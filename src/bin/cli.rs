use clap::{Parser, Subcommand};
use colored::Colorize;
use evalexpr::{build_operator_tree, DefaultNumericTypes};
use scriptfn::{
    convert::extract_symbols, ControllerConfig, EvalexprLoader, ExpressionLoader,
    ScalarFunctionController, VectorFunctionController,
};
use std::{collections::BTreeSet, fs, path::PathBuf, process, sync::Arc};

#[derive(Parser)]
#[command(name = "scriptfn")]
#[command(about = "Evaluate script-defined functions and their derivatives")]
#[command(version)]
struct Args {
    /// JSON controller configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Step used for numeric gradients
    #[arg(long, global = true)]
    step: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a scalar function and its gradient
    Scalar {
        /// Value expression, e.g. "x^2 * y"
        expression: String,
        /// Parameter names as one delimited list; inferred from the
        /// expression when omitted
        #[arg(short, long)]
        names: Option<String>,
        /// Gradient expressions as one delimited list
        #[arg(short, long)]
        gradient: Option<String>,
        /// Point to evaluate at
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        point: Vec<f64>,
    },
    /// Evaluate a vector function and its Jacobian
    Vector {
        /// One value expression per component
        #[arg(required = true)]
        expressions: Vec<String>,
        /// Parameter names as one delimited list; inferred when omitted
        #[arg(short, long)]
        names: Option<String>,
        /// Function names as one delimited list
        #[arg(short, long)]
        functions: Option<String>,
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        point: Vec<f64>,
    },
    /// Load a saved scalar or vector state and evaluate it
    State {
        file: PathBuf,
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        point: Vec<f64>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("{} {}", "Error:".red(), e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => ControllerConfig::from_json_str(&fs::read_to_string(path)?)?,
        None => ControllerConfig::default(),
    };
    let config = Arc::new(config);
    let loader: Arc<dyn ExpressionLoader> = Arc::new(match args.step {
        Some(step) => EvalexprLoader::with_difference_step(step),
        None => EvalexprLoader::default(),
    });

    match args.command {
        Command::Scalar {
            expression,
            names,
            gradient,
            point,
        } => {
            let mut function = ScalarFunctionController::with_parts(config, loader);
            match names {
                Some(names) => function.set_parameter_names_text(Some(names)),
                None => function.set_parameter_names(inferred_names(&[expression.as_str()])?),
            }
            function.set_value_expression(Some(expression));
            function.set_gradient_expressions_text(gradient);
            print_scalar(&mut function, &point)
        }
        Command::Vector {
            expressions,
            names,
            functions,
            point,
        } => {
            let mut function = VectorFunctionController::with_parts(config, loader);
            match names {
                Some(names) => function.set_parameter_names_text(Some(names)),
                None => {
                    let sources: Vec<&str> = expressions.iter().map(String::as_str).collect();
                    function.set_parameter_names(inferred_names(&sources)?);
                }
            }
            function.set_function_names_text(functions);
            function.set_num_values(expressions.len());
            function.synchronize();
            for (index, expression) in expressions.into_iter().enumerate() {
                if let Some(element) = function.element_mut(index)? {
                    element.set_value_expression(Some(expression));
                }
            }
            print_vector(&mut function, &point)
        }
        Command::State { file, point } => {
            let json = fs::read_to_string(file)?;
            let value: serde_json::Value = serde_json::from_str(&json)?;
            if value.get("num_values").is_some() {
                let mut function = VectorFunctionController::from_json(&json, config, loader)?;
                function.synchronize();
                print_vector(&mut function, &point)
            } else {
                let mut function = ScalarFunctionController::from_json(&json, config, loader)?;
                print_scalar(&mut function, &point)
            }
        }
    }
}

/// Identifiers read by `expressions` in sorted order, without `pi` and `e`.
fn inferred_names(expressions: &[&str]) -> Result<Option<Vec<String>>, Box<dyn std::error::Error>> {
    let mut symbols = BTreeSet::new();
    for expression in expressions {
        let node = build_operator_tree::<DefaultNumericTypes>(expression)?;
        symbols.extend(extract_symbols(&node));
    }
    symbols.remove("pi");
    symbols.remove("e");
    Ok((!symbols.is_empty()).then(|| symbols.into_iter().collect()))
}

fn print_scalar(
    function: &mut ScalarFunctionController,
    point: &[f64],
) -> Result<(), Box<dyn std::error::Error>> {
    let compiled = function.compiled_function()?;
    println!("{compiled}");
    let (value, gradient) = compiled.value_and_gradient(point)?;
    println!("{} = {value}", "value".green());
    println!("{} = {gradient:?}", "gradient".green());
    Ok(())
}

fn print_vector(
    function: &mut VectorFunctionController,
    point: &[f64],
) -> Result<(), Box<dyn std::error::Error>> {
    let compiled = function.compiled_function()?;
    println!("{compiled}");
    println!("{} = {:?}", "values".green(), compiled.eval(point)?);
    println!("{}:", "jacobian".green());
    for row in compiled.jacobian(point)? {
        println!("    {row:?}");
    }
    Ok(())
}
