use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

use fedsql::ast::{
    collect_elements, collect_elements_at_this_level, collect_groups, parse_sql, ColumnReference,
    NamedTable,
};
use fedsql::config::DialectConfig;
use fedsql::translators::{ConfiguredTranslator, TranslatorRegistry};

/// Translate federated SQL into source requests
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate SQL for a source
    Render {
        /// Translator name (see `fedsql translators`)
        #[arg(short, long, default_value = "ansi")]
        translator: String,
        /// Dialect config registered as the `configured` translator
        #[arg(short, long)]
        config: Option<PathBuf>,
        sql: String,
    },
    /// List the tables a command references, as JSON
    Tables { sql: String },
    /// List the column references of a command, as JSON
    Columns {
        /// Skip columns inside subqueries
        #[arg(long)]
        this_level: bool,
        sql: String,
    },
    /// List the available translators
    Translators {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct TableEntry<'a> {
    name: &'a str,
    alias: Option<&'a str>,
}

impl<'a> From<&'a NamedTable> for TableEntry<'a> {
    fn from(table: &'a NamedTable) -> Self {
        Self {
            name: &table.name,
            alias: table.correlation_name.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct ColumnEntry<'a> {
    table: Option<&'a str>,
    name: &'a str,
    data_type: &'static str,
}

impl<'a> From<&'a ColumnReference> for ColumnEntry<'a> {
    fn from(column: &'a ColumnReference) -> Self {
        Self {
            table: column
                .table
                .as_ref()
                .map(|t| t.correlation_name.as_deref().unwrap_or(&t.name)),
            name: &column.name,
            data_type: column.data_type.name(),
        }
    }
}

fn registry(config: Option<&PathBuf>) -> Result<TranslatorRegistry> {
    let mut registry = TranslatorRegistry::new();
    let config = DialectConfig::load(config.map(PathBuf::as_path))?;
    registry.register(Box::new(ConfiguredTranslator::new("configured", config)));
    Ok(registry)
}

fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            translator,
            config,
            sql,
        } => {
            let mut registry = registry(config.as_ref())?;
            for mut command in parse_sql(&sql)? {
                println!("{}", registry.translate(&translator, &mut command)?);
            }
        }
        Command::Tables { sql } => {
            for command in parse_sql(&sql)? {
                let tables: Vec<TableEntry> =
                    collect_groups(&command).into_iter().map(Into::into).collect();
                println!("{}", serde_json::to_string_pretty(&tables)?);
            }
        }
        Command::Columns { this_level, sql } => {
            for command in parse_sql(&sql)? {
                let columns = if this_level {
                    collect_elements_at_this_level(&command)
                } else {
                    collect_elements(&command)
                };
                let columns: Vec<ColumnEntry> = columns.into_iter().map(Into::into).collect();
                println!("{}", serde_json::to_string_pretty(&columns)?);
            }
        }
        Command::Translators { config } => {
            for (name, description) in registry(config.as_ref())?.describe() {
                println!("{:<12} {}", name, description);
            }
        }
    }

    Ok(())
}
