// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! dotgate CLI Tool
//!
//! Plans a query document against a vindex catalog and prints the resulting
//! operator tree.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use config::CliConfig;
use dotgate_core::query::QuerySpec;
use dotgate_core::{PlannerConfig, QueryPlanner, VSchemaCatalog, analyze, describe};
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "dotgate")]
#[command(about = "dotgate - sharded query planner CLI")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (defaults to $DOTGATE_CONFIG, then built-in defaults)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Log every planner decision
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a query and print the operator tree
    Plan {
        /// VSchema JSON file
        #[arg(long)]
        vschema: PathBuf,
        /// Query JSON file
        #[arg(long)]
        query: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Validate a vschema and list what it contains
    CheckVschema {
        /// VSchema JSON file
        #[arg(long)]
        vschema: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = CliConfig::resolve_config(cli.config.clone());
    let level = config.as_ref().ok().and_then(|c| Level::from_str(&c.logging.level).ok()).unwrap_or(Level::INFO);
    let level = if cli.verbose { Level::DEBUG.max(level) } else { level };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };
    if cli.verbose {
        config.planner.verbose = true;
    }

    let result = match cli.command {
        Commands::Plan { vschema, query, format } => handle_plan(&config.planner, &vschema, &query, format),
        Commands::CheckVschema { vschema } => handle_check_vschema(&vschema),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

fn load_catalog(path: &Path) -> anyhow::Result<VSchemaCatalog> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading vschema {}", path.display()))?;
    let catalog = VSchemaCatalog::from_json(&json)?;
    Ok(catalog)
}

fn handle_plan(config: &PlannerConfig, vschema: &Path, query: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let catalog = load_catalog(vschema)?;
    let json = std::fs::read_to_string(query).with_context(|| format!("reading query {}", query.display()))?;
    let spec: QuerySpec = serde_json::from_str(&json).context("parsing query document")?;

    let statement = analyze(&spec)?;
    info!("Planning: {}", statement.sql);
    let Some(plan) = QueryPlanner::with_config(&catalog, config.clone()).plan(&statement)? else {
        info!("Query references no tables, nothing to route");
        return Ok(());
    };
    let description = describe(&plan);

    match format {
        OutputFormat::Text => print!("{description}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&description)?),
    }
    Ok(())
}

fn handle_check_vschema(vschema: &Path) -> anyhow::Result<()> {
    let catalog = load_catalog(vschema)?;
    let mut count = 0;
    for keyspace in catalog.keyspaces() {
        let mut tables: Vec<String> = catalog.tables_in(&keyspace.name).map(|t| t.name.clone()).collect();
        tables.sort();
        count += 1;
        let kind = if keyspace.sharded { "sharded" } else { "unsharded" };
        println!("{} ({kind}): {}", keyspace.name, tables.join(", "));
    }
    info!("VSchema {} is valid with {} keyspaces", vschema.display(), count);
    Ok(())
}
