//! plate_report - query and maintain the plate ledger
//!
//! Lists logged plates (most recent first) with optional filters, deletes a
//! single plate, resets the ledger, or exports the filtered rows to CSV/JSON.

use anyhow::{anyhow, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use plate_ledger::ledger::{export_rows, ANY_SOURCE};
use plate_ledger::{FilterCriteria, LedgerEntry, PlateConfig};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(name = "plate_report", about = "Query and maintain the plate ledger")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE", global = true)]
    ui: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print logged plates, most recent first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Remove the oldest entry for a plate
    Delete { plate: String },
    /// Remove every entry
    Reset {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Write the filtered rows to a .csv or .json file
    Export {
        path: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct FilterArgs {
    /// Plate text contains
    #[arg(long, default_value = "")]
    plate: String,

    /// Minimum confidence
    #[arg(long, default_value = "", value_name = "CONF")]
    min_confidence: String,

    /// Image, Video, Live Stream, or All
    #[arg(long, default_value = ANY_SOURCE)]
    source: String,

    /// First day, YYYY-MM-DD
    #[arg(long, default_value = "", value_name = "DATE")]
    from: String,

    /// Last day, YYYY-MM-DD
    #[arg(long, default_value = "", value_name = "DATE")]
    to: String,
}

impl FilterArgs {
    fn criteria(&self) -> Result<Option<FilterCriteria>> {
        let criteria = FilterCriteria::from_inputs(
            &self.plate,
            &self.min_confidence,
            &self.source,
            &self.from,
            &self.to,
        )?;
        Ok((!criteria.is_empty()).then_some(criteria))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = PlateConfig::load()?;
    let mut ledger = {
        let _stage = ui.stage("Open ledger");
        cfg.open_ledger(false)?
    };

    match args.command {
        Command::List { filter, json } => {
            let rows = ledger.read(filter.criteria()?.as_ref());
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_table(&rows);
            }
        }
        Command::Delete { plate } => match ledger.delete(&plate)? {
            Some(entry) => println!(
                "deleted {} (logged {})",
                entry.plate_text,
                entry.formatted_timestamp()
            ),
            None => return Err(anyhow!("no entry for plate '{}'", plate)),
        },
        Command::Reset { yes } => {
            if !yes {
                return Err(anyhow!("reset removes every entry; pass --yes to confirm"));
            }
            let count = ledger.len();
            ledger.clear()?;
            println!("removed {} entries", count);
        }
        Command::Export { path, filter } => {
            let rows = ledger.read(filter.criteria()?.as_ref());
            let written = {
                let _stage = ui.stage("Export rows");
                export_rows(&rows, &path)?
            };
            println!("exported {} rows to {}", rows.len(), written.display());
        }
    }
    Ok(())
}

fn print_table(rows: &[LedgerEntry]) {
    println!(
        "{:>4}  {:<19}  {:<12}  {:>10}  {}",
        "#", "Time", "Plate", "Confidence", "Source"
    );
    for (idx, row) in rows.iter().enumerate() {
        println!(
            "{:>4}  {:<19}  {:<12}  {:>10}  {}",
            idx + 1,
            row.formatted_timestamp(),
            row.plate_text,
            row.formatted_confidence(),
            row.source_label
        );
    }
    if rows.is_empty() {
        println!("(no entries)");
    }
}
