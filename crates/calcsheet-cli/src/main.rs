//! calcsheet CLI - evaluate and check calculation sheets

use anyhow::{bail, Context as _, Result};
use calcsheet::prelude::*;
use calcsheet::validate_context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "calcsheet")]
#[command(author, version, about = "Calculation sheet evaluation tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every field of a sheet
    Eval {
        /// Sheet file (JSON)
        input: PathBuf,

        /// Override a seed value (ref=value, value parsed as JSON when possible)
        #[arg(short, long = "set", value_name = "REF=VALUE")]
        sets: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Maximum expression nesting evaluated
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Evaluate a sheet, apply edits and print only what they changed
    Recalc {
        /// Sheet file (JSON)
        input: PathBuf,

        /// Edit to apply (ref=value, value parsed as JSON when possible)
        #[arg(short, long = "set", value_name = "REF=VALUE", required = true)]
        sets: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report duplicate references, parse errors, dangling references,
    /// cycles and invalid seed values
    Check {
        /// Sheet file (JSON)
        input: PathBuf,
    },

    /// Print the evaluation order
    Order {
        /// Sheet file (JSON)
        input: PathBuf,
    },
}

/// On-disk sheet: field definitions plus seed values
#[derive(Deserialize)]
struct SheetFile {
    fields: Vec<FieldDefinition>,
    #[serde(default)]
    values: BTreeMap<String, Value>,
}

impl SheetFile {
    fn seed(&self) -> Context {
        self.values
            .iter()
            .map(|(reference, value)| (reference.clone(), value.clone()))
            .collect()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval {
            input,
            sets,
            json,
            max_depth,
        } => eval(&input, &sets, json, max_depth),
        Commands::Recalc { input, sets, json } => recalc(&input, &sets, json),
        Commands::Check { input } => check(&input),
        Commands::Order { input } => order(&input),
    }
}

fn load(input: &Path) -> Result<SheetFile> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read '{}'", input.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse '{}'", input.display()))
}

/// Split `ref=value`; the value is JSON if it parses, else a plain string
fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((reference, value)) = raw.split_once('=') else {
        bail!("Expected REF=VALUE, got '{}'", raw);
    };
    let reference = reference.trim();
    if reference.is_empty() {
        bail!("Missing reference name in '{}'", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::string(value));
    Ok((reference.to_string(), value))
}

fn eval(input: &Path, sets: &[String], json: bool, max_depth: Option<usize>) -> Result<()> {
    let file = load(input)?;
    let mut seed = file.seed();
    for raw in sets {
        let (reference, value) = parse_assignment(raw)?;
        seed.set(reference, value);
    }

    let mut options = CalculationOptions::default();
    if let Some(max_depth) = max_depth {
        options.max_depth = max_depth;
    }

    let sheet = Sheet::new(&file.fields).with_options(options);
    let calc = sheet.evaluate(&seed);

    print_context(&calc.context, None, json)?;
    eprintln!(
        "Calculated {} formulas ({} errors, {} circular references)",
        calc.stats.cells_calculated, calc.stats.errors, calc.stats.circular_references
    );

    Ok(())
}

fn recalc(input: &Path, sets: &[String], json: bool) -> Result<()> {
    let file = load(input)?;
    let sheet = Sheet::new(&file.fields);
    let mut context = sheet.evaluate(&file.seed()).context;

    let mut affected = BTreeSet::new();
    let mut calculated = 0;
    for raw in sets {
        let (reference, value) = parse_assignment(raw)?;
        affected.extend(sheet.affected(&reference).into_iter().map(str::to_string));
        let calc = sheet.update(&reference, value, &context);
        calculated += calc.stats.cells_calculated;
        context = calc.context;
    }

    print_context(&context, Some(&affected), json)?;
    eprintln!("Recalculated {} formulas", calculated);

    Ok(())
}

fn check(input: &Path) -> Result<()> {
    let file = load(input)?;
    let sheet = Sheet::new(&file.fields);
    let mut problems = 0;

    if let Err(e) = calcsheet::validate_fields(&file.fields) {
        println!("error: {}", e);
        problems += 1;
    }

    for (reference, error) in sheet.parse_errors() {
        println!("parse error in '{}': {}", reference, error);
        problems += 1;
    }

    for reference in sheet.graph().dangling() {
        let readers: Vec<&str> = sheet.graph().dependents(reference).collect();
        println!(
            "unknown reference '{}' read by {}",
            reference,
            readers.join(", ")
        );
        problems += 1;
    }

    if let Some(path) = calcsheet::detect_cycle(sheet.graph()) {
        println!("circular reference through {}", path.join(" -> "));
        let cyclic: Vec<&str> = sheet
            .cyclic_references()
            .iter()
            .map(String::as_str)
            .collect();
        println!("  on a cycle: {}", cyclic.join(", "));
        problems += 1;
    }

    for issue in validate_context(&file.fields, &file.seed()) {
        println!("invalid value: {}", issue);
        problems += 1;
    }

    if problems > 0 {
        bail!("{} problem(s) found in '{}'", problems, input.display());
    }

    println!("OK: {} fields, no problems", sheet.graph().nodes().count());
    Ok(())
}

fn order(input: &Path) -> Result<()> {
    let file = load(input)?;
    let sheet = Sheet::new(&file.fields);

    for (i, reference) in sheet.order().iter().enumerate() {
        let marker = if sheet.is_formula(reference) {
            "="
        } else if sheet.graph().is_declared(reference) {
            " "
        } else {
            "?"
        };
        println!("{:>4} {} {}", i + 1, marker, reference);
    }

    let cyclic = sheet.cyclic_references();
    if !cyclic.is_empty() {
        let names: Vec<&str> = cyclic.iter().map(String::as_str).collect();
        println!("cyclic: {}", names.join(", "));
    }

    Ok(())
}

fn print_context(context: &Context, only: Option<&BTreeSet<String>>, json: bool) -> Result<()> {
    let selected = context
        .iter()
        .filter(|(reference, _)| only.map_or(true, |set| set.contains(*reference)));

    if json {
        let filtered: Context = selected
            .map(|(reference, entry)| (reference.clone(), entry.clone()))
            .collect();
        let text = serde_json::to_string_pretty(&filtered).context("Failed to serialize result")?;
        println!("{}", text);
        return Ok(());
    }

    let entries: Vec<(&String, &EvalResult)> = selected.collect();
    let width = entries.iter().map(|(r, _)| r.len()).max().unwrap_or(0);
    for (reference, entry) in entries {
        let text = match entry {
            Ok(value) => value.to_string(),
            Err(code) => code.to_string(),
        };
        println!("{:<width$}  {}", reference, text, width = width);
    }

    Ok(())
}
