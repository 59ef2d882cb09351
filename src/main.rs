//! jsoneq CLI.
//!
//! Canonicalize and compare JSON files, and run matcher corpora.
//!
//! Exit codes: 0 success or equal, 1 mismatch or failing corpus, 2 malformed
//! input or usage error.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use env_logger::Env;
use log::debug;

use jsoneq::conformance::CorpusRunner;
use jsoneq::error::MatchError;
use jsoneq::json::{jcs, parse_with_limits, Limits};
use jsoneq::matcher::JsonMatcher;

const EXIT_MISMATCH: u8 = 1;
const EXIT_MALFORMED: u8 = 2;

#[derive(Parser)]
#[command(name = "jsoneq")]
#[command(about = "Canonical JSON comparison", long_about = None)]
#[command(version)]
struct Cli {
    /// Use strict decoding limits
    #[arg(long, global = true, conflicts_with = "limits")]
    strict: bool,

    /// Load decoding limits from a JSON file
    #[arg(long, global = true, value_name = "FILE")]
    limits: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical form of a JSON document
    Canonicalize {
        /// Input file; stdin if omitted or "-"
        file: Option<PathBuf>,
    },

    /// Check two JSON documents for logical equality
    Compare {
        /// File holding the expected value
        expected: PathBuf,
        /// File holding the stored text
        actual: PathBuf,
    },

    /// Run a conformance corpus
    Conformance {
        /// Corpus JSON file
        corpus: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let limits = match resolve_limits(&cli) {
        Ok(limits) => limits,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::from(EXIT_MALFORMED);
        }
    };
    debug!("decoding with {:?}", limits);

    match cli.command {
        Commands::Canonicalize { file } => run_canonicalize(file.as_deref(), limits),
        Commands::Compare { expected, actual } => run_compare(&expected, &actual, limits),
        Commands::Conformance { corpus } => {
            let override_limits = cli.strict || cli.limits.is_some();
            run_conformance(&corpus, override_limits, limits)
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default)).try_init();
}

fn resolve_limits(cli: &Cli) -> Result<Limits, String> {
    if cli.strict {
        return Ok(Limits::strict());
    }
    match &cli.limits {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("invalid limits in {}: {}", path.display(), e))
        }
        None => Ok(Limits::standard()),
    }
}

fn read_input(path: Option<&Path>) -> io::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => fs::read_to_string(p),
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn run_canonicalize(file: Option<&Path>, limits: Limits) -> ExitCode {
    let text = match read_input(file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_MALFORMED);
        }
    };
    match parse_with_limits(text.as_bytes(), limits) {
        Ok(value) => {
            println!("{}", jcs::canonicalize(&value));
            ExitCode::SUCCESS
        }
        Err(code) => {
            eprintln!("error: malformed JSON: {}", code);
            ExitCode::from(EXIT_MALFORMED)
        }
    }
}

fn run_compare(expected: &Path, actual: &Path, limits: Limits) -> ExitCode {
    let texts = read_input(Some(expected)).and_then(|e| Ok((e, read_input(Some(actual))?)));
    let (expected_text, actual_text) = match texts {
        Ok(texts) => texts,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_MALFORMED);
        }
    };

    let expected_value = match parse_with_limits(expected_text.as_bytes(), limits) {
        Ok(value) => value,
        Err(code) => {
            eprintln!("error: {}: malformed JSON: {}", expected.display(), code);
            return ExitCode::from(EXIT_MALFORMED);
        }
    };
    let matcher = match JsonMatcher::with_limits(&expected_value, limits) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_MALFORMED);
        }
    };

    match matcher.check(&actual_text) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ MatchError::ComparisonMismatch { .. }) => {
            eprintln!("{}", e);
            ExitCode::from(EXIT_MISMATCH)
        }
        Err(MatchError::MalformedJson { code, .. }) => {
            eprintln!("error: {}: malformed JSON: {}", actual.display(), code);
            ExitCode::from(EXIT_MALFORMED)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_MALFORMED)
        }
    }
}

fn run_conformance(corpus: &Path, override_limits: bool, limits: Limits) -> ExitCode {
    let runner = match CorpusRunner::load(corpus) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_MALFORMED);
        }
    };
    let runner = if override_limits {
        runner.with_limits(limits)
    } else {
        runner
    };

    let results = runner.run_all();
    for (id, result) in results.problems() {
        eprintln!("{}: {}", id, result);
    }
    println!("{}", results.summary());

    if results.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_MISMATCH)
    }
}
