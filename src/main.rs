use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use itertools::Itertools;
use tracing_subscriber::EnvFilter;

use regtracks::{Match, MatchOptions, compile};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Schema file
    #[arg(value_name = "SCHEMA_FILE")]
    schema: PathBuf,

    /// Text to search. Read from stdin (minus a trailing newline) if omitted
    #[arg(value_name = "TEXT")]
    text: Option<String>,

    /// Entry pattern, instead of the first unnamed one
    #[arg(short, long, value_name = "PATTERN")]
    entry: Option<String>,

    /// Report every match (for replace, the default)
    #[arg(short, long)]
    global: bool,

    /// Replace only the first match
    #[arg(long, conflicts_with = "global")]
    single: bool,

    /// Variable for ($name) literals
    #[arg(short = 'D', long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
    vars: Vec<(String, String)>,

    /// Replace matches with TEMPLATE; $(name) expands to a capture
    #[arg(short, long, value_name = "TEMPLATE", conflicts_with = "test")]
    replace: Option<String>,

    /// Only report whether the text matches
    #[arg(short, long)]
    test: bool,

    /// Log filter, e.g. `debug` or `regtracks=trace`. Overrides RUST_LOG
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn parse_variable(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

fn log_filter(level: Option<&str>) -> Result<EnvFilter> {
    match level {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("Bad log level '{level}'"))
        }
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))),
    }
}

/// Log to stderr so output on stdout stays clean.
fn init_logging(filter: EnvFilter) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .finish();
    // A subscriber may already be installed; the first one wins.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn read_text(text: Option<String>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read stdin")?;
    if input.ends_with('\n') {
        input.pop();
        if input.ends_with('\r') {
            input.pop();
        }
    }
    Ok(input)
}

fn print_match(m: &Match) {
    println!("{}", m.text);
    println!("start: {}", m.start);
    for (name, value) in m.captured.iter().sorted() {
        println!("{name}: {value}");
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(log_filter(args.log_level.as_deref())?);

    let source = fs::read_to_string(&args.schema)
        .with_context(|| format!("Failed to read {}", args.schema.display()))?;
    let schema = compile(&source)
        .with_context(|| format!("Failed to compile {}", args.schema.display()))?;
    let text = read_text(args.text)?;

    let mut options = MatchOptions::new().variables(args.vars);
    if let Some(entry) = args.entry {
        options = options.entry(entry);
    }

    if let Some(template) = args.replace {
        let options = options.global(!args.single);
        println!("{}", schema.replace(&text, &template, &options)?);
        return Ok(ExitCode::SUCCESS);
    }
    if args.single {
        bail!("--single only applies to --replace");
    }

    if args.test {
        let matched = schema.is_match(&text, &options)?;
        println!("{matched}");
        return Ok(if matched {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let options = options.global(args.global);
    let mut tracker = schema.tracker();
    let mut found = 0usize;
    while let Some(m) = tracker.find(&text, &options)? {
        if found > 0 {
            println!();
        }
        print_match(&m);
        found += 1;
        if !args.global {
            break;
        }
    }
    Ok(if found > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
