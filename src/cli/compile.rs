//! Compile and evaluate expressions from the command line

use serde_json::{Value as Json, json};
use tracing::debug;

use super::CliError;
use crate::{
    builder::Builder,
    config::{Config, Target},
    es::to_es_filter,
    evaluator::Evaluator,
    output::expr_to_json,
    painless::to_painless,
    schema::{MemorySchema, OpenSchema, Schema},
    sql::to_sql,
    value::Value,
};

/// Options for the compile command
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Expression JSON text
    pub expression: String,
    /// Schema JSON text; without one every field is an untyped top-level column
    pub schema: Option<String>,
    pub config: Config,
}

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Expression JSON text
    pub expression: String,
    /// Document JSON text
    pub input: Option<String>,
    pub config: Config,
}

fn load_schema(text: Option<&str>) -> Result<Box<dyn Schema>, CliError> {
    match text {
        Some(text) => {
            let json: Json = serde_json::from_str(text)?;
            Ok(Box::new(MemorySchema::from_json(&json)?))
        }
        None => Ok(Box::new(OpenSchema)),
    }
}

/// Compile an expression for the configured target.
pub fn execute_compile(options: &CompileOptions) -> Result<Json, CliError> {
    let config = &options.config;
    let expr = Builder::new(config.build_options()).parse(&options.expression)?;
    let schema = load_schema(options.schema.as_deref())?;
    debug!(output = ?config.target, "compiling expression");

    let output = match config.target {
        Target::Es => to_es_filter(&expr, schema.as_ref(), config.dialect)?,
        Target::Painless => {
            let script = to_painless(&expr, schema.as_ref())?;
            json!({"source": script.script(), "filter": script.truthy()})
        }
        Target::Sql => to_sql(&expr, schema.as_ref())?.to_json(),
        Target::Simplify => expr_to_json(&expr.resolve(schema.as_ref()).partial_eval()?),
    };
    Ok(output)
}

/// Evaluate an expression against one JSON document.
pub fn execute_eval(options: &EvalOptions) -> Result<Json, CliError> {
    let expr = Builder::new(options.config.build_options()).parse(&options.expression)?;
    let input = options.input.as_ref().ok_or(CliError::NoInput)?;
    let document: Json = serde_json::from_str(input)?;
    let result = Evaluator::new().eval_expression(&expr, Value::from_json(&document))?;
    Ok(result.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simplify_without_schema() {
        let options = CompileOptions {
            expression: r#"{"and": [true, {"eq": {"a": 1}}]}"#.to_string(),
            schema: None,
            config: Config {
                target: Target::Simplify,
                ..Default::default()
            },
        };
        let out = execute_compile(&options).unwrap();
        assert_eq!(out, json!({"eq": ["a", 1]}));
    }

    #[test]
    fn test_eval_requires_input() {
        let options = EvalOptions {
            expression: "\"a\"".to_string(),
            input: None,
            config: Config::default(),
        };
        assert!(matches!(execute_eval(&options), Err(CliError::NoInput)));
    }

    #[test]
    fn test_script_rejected_by_default() {
        let options = CompileOptions {
            expression: r#"{"script": "doc['a'].value > 1"}"#.to_string(),
            ..Default::default()
        };
        assert!(matches!(
            execute_compile(&options),
            Err(CliError::Jx(crate::error::JxError::ScriptsDisabled))
        ));
    }
}
