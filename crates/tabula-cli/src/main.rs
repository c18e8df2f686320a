//! Tabula CLI - evaluate and inspect spreadsheet formulas

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tabula::prelude::*;
use tabula::{parse_formula, FunctionRegistry};
use tabula_formula::lexer::{tokenize, TokenKind};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about = "Spreadsheet formula evaluation and inspection tool")]
struct Cli {
    /// Log recalculation details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula against a scratch workbook
    Eval {
        /// Formula to evaluate, with or without the leading '='
        formula: String,

        /// Cell assignment such as `A1=5`, `B2==A1*2` or `Rates!A1=0.2`
        /// (repeatable; sheets are created on first use)
        #[arg(short = 's', long = "set", value_name = "CELL=INPUT")]
        cells: Vec<String>,

        /// Cell the formula is evaluated at, for relative lookups
        #[arg(short, long, default_value = "A1")]
        at: String,

        /// Print every non-empty cell after recalculation
        #[arg(long)]
        dump: bool,
    },

    /// Show the tokens of a formula with their byte spans
    Tokens {
        formula: String,
    },

    /// Parse a formula and print the tree and any diagnostics
    Parse {
        formula: String,
    },

    /// Show the function call enclosing a caret position
    Hint {
        formula: String,

        /// Caret position in characters (default: end of formula)
        #[arg(short, long)]
        caret: Option<usize>,
    },

    /// List the built-in functions
    Functions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Eval {
            formula,
            cells,
            at,
            dump,
        } => eval(&formula, &cells, &at, dump),
        Commands::Tokens { formula } => show_tokens(&formula),
        Commands::Parse { formula } => show_parse(&formula),
        Commands::Hint { formula, caret } => show_hint(&formula, caret),
        Commands::Functions => list_functions(),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tabula=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Split `Sheet!A1=input` into an optional sheet name, an address and the input
fn split_assignment(assignment: &str) -> Result<(Option<&str>, &str, &str)> {
    let (target, input) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("expected CELL=INPUT, got '{}'", assignment))?;
    let target = target.trim();
    match target.rsplit_once('!') {
        Some((sheet, address)) => {
            let sheet = sheet.trim_matches('\'');
            if sheet.is_empty() {
                bail!("empty sheet name in '{}'", assignment);
            }
            Ok((Some(sheet), address, input))
        }
        None => Ok((None, target, input)),
    }
}

fn eval(formula: &str, cells: &[String], at: &str, dump: bool) -> Result<()> {
    let mut workbook = Workbook::new();
    workbook.begin_update(0).context("Failed to start update batch")?;

    for assignment in cells {
        let (sheet_name, address, input) = split_assignment(assignment)?;
        let sheet = match sheet_name {
            None => 0,
            Some(name) => match workbook.sheet_index(name) {
                Some(index) => index,
                None => workbook
                    .add_sheet(name)
                    .with_context(|| format!("Failed to add sheet '{}'", name))?,
            },
        };
        let cell = CellRef::parse(address).with_context(|| format!("Invalid cell '{}'", address))?;
        workbook
            .set_input(sheet, cell.row, cell.col, input)
            .with_context(|| format!("Failed to set '{}'", assignment))?;
    }

    let stats = workbook.end_update(0).context("Failed to recalculate")?;
    debug!(
        formulas = stats.formula_count,
        calculated = stats.cells_calculated,
        circular = stats.circular_references,
        "workbook ready"
    );

    let at = CellRef::parse(at).with_context(|| format!("Invalid cell '{}'", at))?;
    let formula = if formula.starts_with('=') {
        formula.to_string()
    } else {
        format!("={}", formula)
    };
    let value = workbook
        .evaluate(0, at.row, at.col, &formula)
        .context("Failed to evaluate formula")?;
    println!("{}", value);

    if dump {
        for ws in workbook.worksheets() {
            for (row, col, cell) in ws.cells() {
                if cell.is_blank() {
                    continue;
                }
                let address = CellRef::new(row, col).to_a1_string();
                match &cell.formula {
                    Some(text) => println!("{}!{}\t{}\t{}", ws.name(), address, text, cell.value),
                    None => println!("{}!{}\t{}", ws.name(), address, cell.value),
                }
            }
        }
    }
    Ok(())
}

fn show_tokens(formula: &str) -> Result<()> {
    for token in tokenize(formula) {
        if token.kind == TokenKind::Eof {
            break;
        }
        let text = formula.get(token.span.clone()).unwrap_or_default();
        println!("{:>3}..{:<3} {:?}\t{}", token.span.start, token.span.end, token.kind, text);
    }
    Ok(())
}

fn show_parse(formula: &str) -> Result<()> {
    let parsed = parse_formula(formula);
    match &parsed.root {
        Some(root) => {
            println!("{}", root);
            println!("{:#?}", root);
        }
        None => println!("(no expression)"),
    }
    for error in &parsed.errors {
        eprintln!("error: {}", error);
    }
    if !parsed.is_ok() {
        bail!("formula has {} parse error(s)", parsed.errors.len().max(1));
    }
    Ok(())
}

fn show_hint(formula: &str, caret: Option<usize>) -> Result<()> {
    let caret = caret.unwrap_or_else(|| formula.chars().count());
    match FunctionRegistry::global().function_hint(formula, caret) {
        Some(resolved) => {
            let hint = &resolved.hint;
            match resolved.function {
                Some(def) => {
                    let max = def
                        .max_args
                        .map_or_else(|| "any".to_string(), |n| n.to_string());
                    println!(
                        "{} argument {} (takes {}..{} arguments{})",
                        hint.name,
                        hint.argument_index + 1,
                        def.min_args,
                        max,
                        if def.volatile { ", volatile" } else { "" }
                    );
                }
                None => println!("{} argument {} (unknown function)", hint.name, hint.argument_index + 1),
            }
        }
        None => println!("(not inside a function call)"),
    }
    Ok(())
}

fn list_functions() -> Result<()> {
    let registry = FunctionRegistry::global();
    let mut names = registry.names();
    names.sort_unstable();
    for name in names {
        if let Some(def) = registry.get(name) {
            let max = def.max_args.map_or_else(|| "*".to_string(), |n| n.to_string());
            println!("{}\t{}..{}", name, def.min_args, max);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("A1=5").unwrap(), (None, "A1", "5"));
        assert_eq!(split_assignment("B2==A1*2").unwrap(), (None, "B2", "=A1*2"));
        assert_eq!(
            split_assignment("'Tax Rates'!C3=0.2").unwrap(),
            (Some("Tax Rates"), "C3", "0.2")
        );
        assert!(split_assignment("A1").is_err());
        assert!(split_assignment("!A1=1").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["tabula", "eval", "SUM(A1:A2)", "-s", "A1=1", "-s", "A2=2"]).unwrap();
        match cli.command {
            Commands::Eval { formula, cells, at, .. } => {
                assert_eq!(formula, "SUM(A1:A2)");
                assert_eq!(cells, vec!["A1=1", "A2=2"]);
                assert_eq!(at, "A1");
            }
            _ => panic!("expected eval"),
        }
    }
}
