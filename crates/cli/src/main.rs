// gridcalc CLI - headless spreadsheet operations

mod script;

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use gridcalc_engine::formula::Formula;
use gridcalc_engine::sheet::Sheet;

use script::Command;

// Exit codes
const EXIT_SUCCESS: u8 = 0;
const EXIT_EVAL_ERROR: u8 = 1;
const EXIT_SCRIPT_ERROR: u8 = 2;
const EXIT_IO_ERROR: u8 = 3;

#[derive(Parser)]
#[command(name = "gridcalc")]
#[command(about = "Spreadsheet evaluation engine (headless)")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply an edit script and print the resulting table
    Run {
        /// Script file (omit to read from stdin)
        script: Option<PathBuf>,

        /// Print raw cell texts instead of evaluated values
        #[arg(long)]
        texts: bool,
    },

    /// Evaluate a formula against a scripted sheet
    Calc {
        /// Formula to evaluate (must start with =)
        formula: String,

        /// Edit script applied before evaluation
        #[arg(long, short = 's')]
        script: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    let code = match cli.command {
        None => {
            eprintln!("Usage: gridcalc <command> [options]");
            eprintln!("       gridcalc --help for more information");
            EXIT_SUCCESS
        }
        Some(Commands::Run { script, texts }) => cmd_run(script, texts),
        Some(Commands::Calc { formula, script }) => cmd_calc(&formula, script),
    };

    ExitCode::from(code)
}

/// Read the script source from a file, or stdin when no path is given.
fn read_source(script: Option<PathBuf>) -> io::Result<String> {
    match script {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

/// Apply a script to a fresh sheet.
///
/// Rejected edits (bad formula, cycle) are reported and counted but do not
/// stop the run; malformed script lines do.
fn apply_script(sheet: &mut Sheet, source: &str) -> Result<usize, u8> {
    let mut rejected = 0usize;

    for (idx, line) in source.lines().enumerate() {
        let lineno = idx + 1;
        let command = match script::parse_line(line) {
            Ok(None) => continue,
            Ok(Some(command)) => command,
            Err(e) => {
                eprintln!("line {}: {}", lineno, e);
                return Err(EXIT_SCRIPT_ERROR);
            }
        };

        let result = match &command {
            Command::Set(pos, text) => sheet.set_cell(*pos, text),
            Command::Clear(pos) => sheet.clear_cell(*pos),
        };

        match result {
            Ok(()) => log::debug!("line {}: applied {:?}", lineno, command),
            Err(e) => {
                log::warn!("line {}: rejected: {}", lineno, e);
                eprintln!("line {}: {}", lineno, e);
                rejected += 1;
            }
        }
    }

    Ok(rejected)
}

fn cmd_run(script: Option<PathBuf>, texts: bool) -> u8 {
    let source = match read_source(script) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: {}", e);
            return EXIT_IO_ERROR;
        }
    };

    let mut sheet = Sheet::new();
    let rejected = match apply_script(&mut sheet, &source) {
        Ok(rejected) => rejected,
        Err(code) => return code,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let printed = if texts {
        sheet.print_texts(&mut out)
    } else {
        sheet.print_values(&mut out)
    };
    if printed.and_then(|_| out.flush()).is_err() {
        return EXIT_IO_ERROR;
    }

    if rejected > 0 {
        EXIT_EVAL_ERROR
    } else {
        EXIT_SUCCESS
    }
}

fn cmd_calc(formula: &str, script: Option<PathBuf>) -> u8 {
    let Some(expression) = formula.strip_prefix('=') else {
        eprintln!("error: formula must start with =");
        return EXIT_SCRIPT_ERROR;
    };

    let mut sheet = Sheet::new();
    if let Some(path) = script {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("error: {}", e);
                return EXIT_IO_ERROR;
            }
        };
        if let Err(code) = apply_script(&mut sheet, &source) {
            return code;
        }
    }

    let parsed = match Formula::parse(expression) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("error: {}", e);
            return EXIT_SCRIPT_ERROR;
        }
    };

    let value = parsed.evaluate(&sheet);
    println!("{}", value);

    if value.is_error() {
        EXIT_EVAL_ERROR
    } else {
        EXIT_SUCCESS
    }
}
