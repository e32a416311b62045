use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::parser::Parser;
use rox::scanner::{scan_all, Scanner};
use rox::token::Token;
use rox::{Diagnostics, Lox};

/// Exit status for lexical, syntax and resolution failures.
const EXIT_STATIC: u8 = 65;

/// Exit status for runtime failures.
const EXIT_RUNTIME: u8 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Emit the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Runs a Lox program from a file, or starts a prompt when none is given
    Run { filename: Option<PathBuf> },
}

/// Reads the contents of a file into a String
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // `[module:line] - message`, module path without the crate prefix
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn report(diagnostics: &Diagnostics) -> ExitCode {
    debug!("Run failed: {}", diagnostics);
    eprintln!("{}", diagnostics);

    if diagnostics.is_runtime() {
        ExitCode::from(EXIT_RUNTIME)
    } else {
        ExitCode::from(EXIT_STATIC)
    }
}

fn tokenize(filename: PathBuf, json: bool) -> Result<ExitCode> {
    let source = read_file(filename)?;

    if json {
        let (tokens, errors) = scan_all(&source);

        for e in &errors {
            eprintln!("{}", e);
        }

        println!("{}", serde_json::to_string_pretty(&tokens)?);

        return Ok(if errors.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(EXIT_STATIC)
        });
    }

    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) => println!("{}", token),
            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC);
        return Ok(ExitCode::from(EXIT_STATIC));
    }

    info!("Tokenization completed successfully");
    Ok(ExitCode::SUCCESS)
}

fn parse(filename: PathBuf) -> Result<ExitCode> {
    let source = read_file(filename)?;
    let (tokens, lex_errors): (Vec<Token<'_>>, _) = scan_all(&source);

    if !lex_errors.is_empty() {
        return Ok(report(&Diagnostics::new(lex_errors)));
    }

    match Parser::new(&tokens).parse_expression() {
        Ok(expr) => {
            let ast_str = AstPrinter::print(&expr);
            debug!("AST: {}", ast_str);
            println!("{}", ast_str);
            Ok(ExitCode::SUCCESS)
        }
        Err(errors) => Ok(report(&Diagnostics::new(errors))),
    }
}

fn run_file(filename: PathBuf) -> Result<ExitCode> {
    let source = read_file(filename)?;
    let mut lox = Lox::new();

    match lox.run(&source) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(diagnostics) => Ok(report(&diagnostics)),
    }
}

/// Line‑oriented prompt.  Every line runs in the same session, so globals
/// persist; an error is reported and the prompt carries on.
fn run_prompt() -> Result<ExitCode> {
    info!("Starting prompt");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut lox = Lox::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };

        let line = line.context("Failed to read from stdin")?;

        if let Err(diagnostics) = lox.run(&line) {
            eprintln!("{}", diagnostics);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => tokenize(filename, json),
        Commands::Parse { filename } => parse(filename),
        Commands::Run { filename: Some(filename) } => run_file(filename),
        Commands::Run { filename: None } => run_prompt(),
    }
}
