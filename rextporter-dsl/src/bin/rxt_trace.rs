//! RXT Tracer - Shows the flow through Source → Tokens → Configuration tree
//!
//! # Usage
//!
//! ```bash
//! # Print the token stream
//! rxt_trace --tokens-only skycoin.rxt
//!
//! # Parse and dump the tree as JSON
//! cat skycoin.rxt | rxt_trace --json
//! ```

use clap::Parser as ClapParser;
use rextporter_dsl::lexer::{rxt_patterns, Frame};
use rextporter_dsl::{
    tokenize_threaded, tokenize_with_context, DslContext, DslError, DslResult, KeywordTable,
    Lexer, Parser, Scanner, TokenWriter,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(ClapParser)]
#[command(name = "rxt_trace")]
#[command(version)]
#[command(about = "Trace RXT sources through the lexer and parser")]
struct Cli {
    /// Input file (reads stdin if not provided)
    input: Option<PathBuf>,

    /// Print tokens as they are lexed and stop there
    #[arg(long)]
    tokens_only: bool,

    /// Run the scanner on its own thread
    #[arg(long)]
    threaded: bool,

    /// Print the configuration tree as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "RXT_JSON_LOGS")]
    json_logs: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rextporter_dsl=info,rextporter_core=info,warn"));
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init()
    };
    if let Err(err) = result {
        eprintln!("can not initialize logging: {}", err);
    }
}

fn read_source(input: Option<&PathBuf>) -> DslResult<String> {
    match input {
        Some(path) => std::fs::read_to_string(path).map_err(|source| DslError::Read {
            path: path.display().to_string(),
            source,
        }),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .map_err(|source| DslError::Read {
                    path: "<stdin>".to_string(),
                    source,
                })?;
            Ok(source)
        }
    }
}

fn run(cli: &Cli) -> DslResult<()> {
    let source = read_source(cli.input.as_ref())?;
    let context = Arc::new(DslContext::new());

    if cli.tokens_only {
        let scanner = Scanner::new(rxt_patterns()?, &source);
        return if cli.threaded {
            write_tokens(scanner.spawn(), context)
        } else {
            write_tokens(scanner, context)
        };
    }

    let tokens = if cli.threaded {
        tokenize_threaded(&source, context)?
    } else {
        tokenize_with_context(&source, context)?
    };
    tracing::debug!(tokens = tokens.len(), "source tokenized");

    let config = Parser::new(tokens).parse()?;
    config.validate()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{:#?}", config);
    }
    Ok(())
}

fn write_tokens<I: Iterator<Item = Frame>>(frames: I, context: Arc<DslContext>) -> DslResult<()> {
    let stdout = io::stdout();
    let mut writer = TokenWriter::new(stdout.lock(), KeywordTable::global());
    Lexer::new(frames, context).lex(&mut writer)?;
    let count = writer.count();
    let _stdout = writer.into_inner().map_err(|source| DslError::Write {
        target: "<stdout>".to_string(),
        source,
    })?;
    tracing::info!(tokens = count, "token stream written");
    Ok(())
}
