use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use clap::Parser;
use miette::IntoDiagnostic;
use serde::Serialize;
use serde_json::Value;

use stix_pattern::{evaluate_compiled, validate_ast, CompiledPattern, PatternError, SyntaxError};

/// Filter newline-delimited JSON observable records through a STIX pattern.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// STIX pattern to compile
    #[clap(short, long)]
    pattern: String,

    /// validate the pattern (syntax and semantics) and exit
    #[clap(long)]
    check: bool,

    /// with --check, emit a machine-readable JSON report
    #[clap(long, requires = "check")]
    json: bool,

    /// print the parsed AST and exit
    #[clap(long)]
    ast: bool,

    /// newline-delimited JSON records to filter (defaults to stdin)
    #[clap(short, long)]
    input: Option<PathBuf>,
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    pattern: &'a str,
    valid: bool,
    syntax_errors: &'a [SyntaxError],
    semantic_errors: &'a [String],
}

fn main() -> miette::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    let compiled = stix_pattern::compile(&args.pattern);

    if args.check {
        return run_check(&args, &compiled);
    }

    if let Some(err) = compiled.errors().first() {
        return Err(PatternError::from_syntax(err, compiled.pattern()).into());
    }

    if args.ast {
        print!("{}", compiled.render_ast());
        return Ok(());
    }

    if let Some(ast) = compiled.ast() {
        let validation = validate_ast(ast);
        if !validation.valid {
            return Err(PatternError::Semantic {
                message: validation.message(),
            }
            .into());
        }
    }

    run_filter(&args, &compiled)
}

fn run_check(args: &Args, compiled: &CompiledPattern) -> miette::Result<()> {
    let semantic_errors = match compiled.ast() {
        Some(ast) => validate_ast(ast).errors,
        None => Vec::new(),
    };
    let valid = compiled.is_valid() && semantic_errors.is_empty();

    if args.json {
        let report = ValidationReport {
            pattern: compiled.pattern(),
            valid,
            syntax_errors: compiled.errors(),
            semantic_errors: &semantic_errors,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).into_diagnostic()?
        );
        if !valid {
            std::process::exit(1);
        }
        return Ok(());
    }

    if let Some(err) = compiled.errors().first() {
        return Err(PatternError::from_syntax(err, compiled.pattern()).into());
    }
    if !semantic_errors.is_empty() {
        return Err(PatternError::Semantic {
            message: semantic_errors.join("\n"),
        }
        .into());
    }
    println!("pattern is valid");
    Ok(())
}

fn run_filter(args: &Args, compiled: &CompiledPattern) -> miette::Result<()> {
    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(File::open(path).into_diagnostic()?)),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    for line in reader.lines() {
        let line = line.into_diagnostic()?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(record) => {
                if evaluate_compiled(compiled, &record) {
                    println!("{}", line);
                }
            }
            Err(e) => log::warn!("skipping malformed record: {}", e),
        }
    }
    Ok(())
}
