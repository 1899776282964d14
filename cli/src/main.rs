use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tablemap_sqlite::{
    IndexColumn, IndexDescriptor, Orm, ProceduralResource, StoreConfig, list_tables, table_info,
};

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "tablemap")]
#[command(about = "Inspect and maintain mapped SQLite stores")]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    format: CliOutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Store configuration YAML file.
    #[arg(long, global = true, conflicts_with_all = ["dir", "name"])]
    config: Option<PathBuf>,
    /// Store directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Database name within the store directory.
    #[arg(long, global = true)]
    name: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a store configuration file.
    Init(InitArgs),
    /// List the tables in the store.
    Tables,
    /// Show the live columns of a table.
    Inspect(InspectArgs),
    /// List, create and drop indexes.
    Index(IndexArgs),
    /// List stored procedural resources.
    Procedural,
}

#[derive(Debug, Args)]
struct InitArgs {
    /// Output path for the configuration file.
    #[arg(long)]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Table name.
    table: String,
}

#[derive(Debug, Args)]
struct IndexArgs {
    #[command(subcommand)]
    operation: IndexOperation,
}

#[derive(Debug, Subcommand)]
enum IndexOperation {
    /// List indexes, optionally on one table.
    List {
        #[arg(long)]
        table: Option<String>,
    },
    /// Create an index.
    Create(IndexCreateArgs),
    /// Drop an index by name.
    Drop {
        #[arg(id = "index_name", value_name = "NAME")]
        name: String,
    },
}

#[derive(Debug, Args)]
struct IndexCreateArgs {
    /// Index name.
    #[arg(id = "index_name", value_name = "NAME")]
    name: String,
    /// Table to index.
    #[arg(long)]
    table: String,
    /// Indexed columns, in order. Suffix a column with `:desc` for
    /// descending order.
    #[arg(long = "column", required = true)]
    columns: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Init(args) => run_init(&cli.store, args),
        Command::Tables => run_tables(&cli.store, cli.format),
        Command::Inspect(args) => run_inspect(&cli.store, cli.format, args),
        Command::Index(args) => run_index(&cli.store, cli.format, args),
        Command::Procedural => run_procedural(&cli.store, cli.format),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Store resolution
// ---------------------------------------------------------------------------

fn store_config(args: &StoreArgs) -> Result<StoreConfig, String> {
    if let Some(path) = &args.config {
        return StoreConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()));
    }
    match (&args.dir, &args.name) {
        (Some(dir), Some(name)) => Ok(StoreConfig::new(dir, name.as_str())),
        _ => Err("either --config or both --dir and --name are required".to_string()),
    }
}

fn open_store(args: &StoreArgs) -> Result<Orm, String> {
    let config = store_config(args)?;
    tracing::debug!(path = %config.database_path().display(), "opening store");
    Orm::open(config).map_err(|e| format!("Failed to open store: {e}"))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_init(store: &StoreArgs, args: InitArgs) -> Result<(), String> {
    let config = store_config(store)?;
    config.validate().map_err(|e| e.to_string())?;
    config
        .save(&args.output)
        .map_err(|e| format!("Failed to write '{}': {e}", args.output.display()))?;
    println!("Wrote store configuration to '{}'.", args.output.display());
    Ok(())
}

fn run_tables(store: &StoreArgs, format: CliOutputFormat) -> Result<(), String> {
    let orm = open_store(store)?;
    let conn = orm.database().connect().map_err(|e| e.to_string())?;
    let tables = list_tables(&conn).map_err(|e| format!("Failed to list tables: {e}"))?;
    emit(format, &tables, || tables.join("\n"))
}

#[derive(Debug, Serialize)]
struct ColumnRow {
    name: String,
    keyword: String,
    value_type: String,
}

fn run_inspect(store: &StoreArgs, format: CliOutputFormat, args: InspectArgs) -> Result<(), String> {
    let orm = open_store(store)?;
    let conn = orm.database().connect().map_err(|e| e.to_string())?;
    let columns: Vec<ColumnRow> = table_info(&conn, &args.table)
        .map_err(|e| format!("Failed to inspect '{}': {e}", args.table))?
        .into_iter()
        .map(|c| ColumnRow {
            value_type: c.column_type().value_type().to_string(),
            name: c.name,
            keyword: c.keyword,
        })
        .collect();
    if columns.is_empty() {
        return Err(format!("table '{}' does not exist", args.table));
    }
    emit(format, &columns, || {
        columns
            .iter()
            .map(|c| format!("{:<24} {:<10} {}", c.name, c.keyword, c.value_type))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn run_index(store: &StoreArgs, format: CliOutputFormat, args: IndexArgs) -> Result<(), String> {
    let orm = open_store(store)?;
    let indexes = orm.indexes();
    match args.operation {
        IndexOperation::List { table } => {
            let listed = match table {
                Some(table) => indexes.list_for_table(&table),
                None => indexes.list(),
            }
            .map_err(|e| format!("Failed to list indexes: {e}"))?;
            emit(format, &listed, || {
                listed.iter().map(describe_index).collect::<Vec<_>>().join("\n")
            })
        }
        IndexOperation::Create(args) => {
            let columns = args.columns.iter().map(|c| parse_index_column(c)).collect();
            let index = IndexDescriptor::new(&args.name, &args.table, columns);
            indexes
                .create(&index)
                .map_err(|e| format!("Failed to create index: {e}"))?;
            println!("Created {}", describe_index(&index));
            Ok(())
        }
        IndexOperation::Drop { name } => {
            let index = indexes
                .list()
                .map_err(|e| format!("Failed to list indexes: {e}"))?
                .into_iter()
                .find(|i| i.name.eq_ignore_ascii_case(&name))
                .ok_or_else(|| format!("index '{name}' does not exist"))?;
            indexes
                .drop(&index)
                .map_err(|e| format!("Failed to drop index: {e}"))?;
            println!("Dropped index '{}'.", index.name);
            Ok(())
        }
    }
}

fn run_procedural(store: &StoreArgs, format: CliOutputFormat) -> Result<(), String> {
    let orm = open_store(store)?;
    let resource_type = ProceduralResource::entity_type().map_err(|e| e.to_string())?;
    let resources = orm
        .ensure_schema(&resource_type)
        .and_then(|table| table.select(&[]))
        .map_err(|e| format!("Failed to read procedural resources: {e}"))?;

    #[derive(Serialize)]
    struct ResourceRow<'a> {
        name: &'a str,
        table: &'a str,
        base: &'a str,
        methods: String,
        description: Option<&'a str>,
    }

    let rows: Vec<ResourceRow<'_>> = resources
        .iter()
        .map(|r| ResourceRow {
            name: &r.name,
            table: &r.table_name,
            base: &r.base_type_name,
            methods: r.methods_string(),
            description: r.description.as_deref(),
        })
        .collect();
    emit(format, &rows, || {
        rows.iter()
            .map(|r| format!("{:<32} {:<32} {:<24} {}", r.name, r.table, r.base, r.methods))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parses `name` or `name:desc`.
fn parse_index_column(spec: &str) -> IndexColumn {
    match spec.rsplit_once(':') {
        Some((name, direction)) if direction.eq_ignore_ascii_case("desc") => {
            IndexColumn::descending(name)
        }
        Some((name, direction)) if direction.eq_ignore_ascii_case("asc") => {
            IndexColumn::ascending(name)
        }
        _ => IndexColumn::ascending(spec),
    }
}

fn describe_index(index: &IndexDescriptor) -> String {
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, if c.descending { "DESC" } else { "ASC" }))
        .collect();
    let resource = index
        .resource
        .as_deref()
        .map(|r| format!(" [{r}]"))
        .unwrap_or_default();
    format!("{} ON {} ({}){resource}", index.name, index.table, columns.join(", "))
}

/// Prints `value` in the requested format; `text` renders the plain form.
fn emit<T: Serialize>(
    format: CliOutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<(), String> {
    let rendered = match format {
        CliOutputFormat::Text => text(),
        CliOutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| format!("Failed to serialize output: {e}"))?,
        CliOutputFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| format!("Failed to serialize output: {e}"))?,
    };
    if !rendered.is_empty() {
        println!("{}", rendered.trim_end());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_column() {
        assert_eq!(parse_index_column("Name"), IndexColumn::ascending("Name"));
        assert_eq!(parse_index_column("Name:DESC"), IndexColumn::descending("Name"));
        assert_eq!(parse_index_column("Name:asc"), IndexColumn::ascending("Name"));
    }

    #[test]
    fn test_describe_index() {
        let mut index = IndexDescriptor::new(
            "ix",
            "shop$Item",
            vec![IndexColumn::ascending("a"), IndexColumn::descending("b")],
        );
        assert_eq!(describe_index(&index), "ix ON shop$Item (a ASC, b DESC)");
        index.resource = Some("shop.Item".to_string());
        assert_eq!(describe_index(&index), "ix ON shop$Item (a ASC, b DESC) [shop.Item]");
    }

    #[test]
    fn test_store_config_requires_location() {
        let args = StoreArgs {
            config: None,
            dir: Some(PathBuf::from("/tmp")),
            name: None,
        };
        assert!(store_config(&args).is_err());
    }
}
