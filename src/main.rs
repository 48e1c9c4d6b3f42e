use clap::{Parser as ClapParser, Subcommand};
use jx_lang::cli::{self, CliError, CompileOptions, EvalOptions};
use jx_lang::config::{Config, Target};
use jx_lang::es::Dialect;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "jx")]
#[command(about = "JX - compile JSON expressions to search filters, scripts and SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an expression
    Compile {
        /// Expression JSON (reads from stdin if not provided)
        expression: Option<String>,

        /// Output: es, painless, sql or simplify
        #[arg(short, long)]
        target: Option<Target>,

        /// Schema JSON file
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Filter dialect: legacy or bool
        #[arg(short, long)]
        dialect: Option<Dialect>,

        /// Configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Accept the `script` operator
        #[arg(long)]
        allow_scripts: bool,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Evaluate an expression against a JSON document
    Eval {
        /// Expression JSON
        expression: String,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// List documentation categories
    Docs,

    /// Show documentation for a specific category
    Doc {
        /// Category name (use 'jx docs' to list categories)
        category: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("JX_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            expression,
            target,
            schema,
            dialect,
            config,
            allow_scripts,
            pretty,
        } => run_compile(expression, target, schema, dialect, config, allow_scripts, pretty),
        Commands::Eval {
            expression,
            input,
            pretty,
        } => run_eval(expression, input, pretty),
        Commands::Docs => {
            print!("{}", cli::get_docs_overview());
            Ok(())
        }
        Commands::Doc { category } => cli::get_doc_category(&category).map(|content| {
            print!("{}", content);
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_stdin() -> Result<Option<String>, CliError> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(Some(buffer))
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<(), CliError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_compile(
    expression: Option<String>,
    target: Option<Target>,
    schema: Option<PathBuf>,
    dialect: Option<Dialect>,
    config: Option<PathBuf>,
    allow_scripts: bool,
    pretty: bool,
) -> Result<(), CliError> {
    let mut config = match config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_env();
    if let Some(target) = target {
        config.target = target;
    }
    if let Some(dialect) = dialect {
        config.dialect = dialect;
    }
    config.allow_scripts |= allow_scripts;
    config.pretty |= pretty;

    let expression = match expression {
        Some(e) => e,
        None => read_stdin()?.ok_or(CliError::NoInput)?,
    };
    let schema = schema.map(std::fs::read_to_string).transpose()?;
    let pretty = config.pretty;

    let output = cli::execute_compile(&CompileOptions {
        expression,
        schema,
        config,
    })?;
    print_json(&output, pretty)
}

fn run_eval(expression: String, input: Option<String>, pretty: bool) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None => read_stdin()?,
    };
    let output = cli::execute_eval(&EvalOptions {
        expression,
        input,
        config: Config::default().with_env(),
    })?;
    print_json(&output, pretty)
}
