//! gridql CLI - compile grid list requests to SQL
//!
//! Usage:
//!   gridql sql --catalog <catalog.json> --model <id> [--view <id>] [--where <expr>] [--sort <expr>]
//!   gridql aggregate --catalog <catalog.json> --model <id> --column <id> --aggregation <name>
//!   gridql run --catalog <catalog.json> --model <id> --db <data.db>
//!
//! Examples:
//!   gridql sql --catalog shop.json --model md_orders --where "(amount,gt,100)" --sort -amount
//!   gridql aggregate --catalog shop.json --model md_orders --column or_amount --aggregation sum
//!   gridql run --catalog shop.json --model md_orders --view vw_big --db shop.db

use clap::{Args, Parser, Subcommand, ValueEnum};
use gridql::compile::{Aggregation, Strictness};
use gridql::config::Settings;
use gridql::list::{AggregationRequest, ListRequest, Orchestrator, SqliteExecutor};
use gridql::meta::{CachedStore, InMemoryStore};
use gridql::sql::Dialect;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gridql")]
#[command(about = "gridql - compile grid views, filters and sorts to multi-dialect SQL")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to GRIDQL_CONFIG, ./gridql.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL of a list request
    Sql {
        #[command(flatten)]
        request: RequestArgs,

        /// SQL dialect to generate
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Print the SQL of an aggregate request
    Aggregate {
        #[command(flatten)]
        request: RequestArgs,

        /// SQL dialect to generate
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Column id to aggregate
        #[arg(long)]
        column: String,

        /// Aggregation name (e.g. sum, countUnique, earliestDate)
        #[arg(long)]
        aggregation: String,
    },

    /// Run a list request against a SQLite database and print rows as JSON lines
    Run {
        #[command(flatten)]
        request: RequestArgs,

        /// SQLite database file (defaults to [database] path)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// JSON catalog file (defaults to [catalog] path)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Model id
    #[arg(short, long)]
    model: String,

    /// View id whose filters and sorts apply
    #[arg(long)]
    view: Option<String>,

    /// Where expression, e.g. "(amount,gt,100)~and(status,eq,open)"
    #[arg(short, long = "where")]
    where_clause: Option<String>,

    /// Sort expression, e.g. "-amount,title"
    #[arg(short, long)]
    sort: Option<String>,

    #[arg(short, long)]
    limit: Option<u64>,

    #[arg(short, long)]
    offset: Option<u64>,

    /// Fail on unresolvable fields instead of skipping them
    #[arg(long)]
    strict: bool,
}

impl RequestArgs {
    fn to_request(&self) -> ListRequest {
        ListRequest {
            model_id: self.model.clone(),
            view_id: self.view.clone(),
            where_clause: self.where_clause.clone(),
            sort: self.sort.clone(),
            limit: self.limit,
            offset: self.offset,
            strictness: self.strict.then_some(Strictness::Strict),
            ..Default::default()
        }
    }
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Postgres,
    Mysql,
    Sqlite,
    Tsql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Tsql => Dialect::TSql,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let mut settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Sql { request, dialect } => {
            if let Some(d) = dialect {
                settings.compile.dialect = d.into();
            }
            cmd_sql(request, settings).await
        }
        Commands::Aggregate {
            request,
            dialect,
            column,
            aggregation,
        } => {
            if let Some(d) = dialect {
                settings.compile.dialect = d.into();
            }
            cmd_aggregate(request, settings, column, aggregation).await
        }
        Commands::Run { request, db } => cmd_run(request, settings, db).await,
    }
}

fn open_store(args: &RequestArgs, settings: &Settings) -> Option<CachedStore<InMemoryStore>> {
    let path = match &args.catalog {
        Some(path) => path.clone(),
        None => match settings.catalog.resolved_path() {
            Ok(Some(path)) => path,
            Ok(None) => {
                eprintln!("Error: no catalog given (use --catalog or [catalog] path)");
                return None;
            }
            Err(e) => {
                eprintln!("Error resolving catalog path: {}", e);
                return None;
            }
        },
    };

    match InMemoryStore::from_file(&path) {
        Ok(store) => Some(CachedStore::new(store)),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

async fn cmd_sql(args: RequestArgs, settings: Settings) -> ExitCode {
    let Some(store) = open_store(&args, &settings) else {
        return ExitCode::FAILURE;
    };
    let lists = Orchestrator::new(store, settings);

    match lists.list_query(&args.to_request()).await {
        Ok(sql) => {
            println!("{}", sql);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_aggregate(
    args: RequestArgs,
    settings: Settings,
    column: String,
    aggregation: String,
) -> ExitCode {
    let aggregation: Aggregation = match aggregation.parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let Some(store) = open_store(&args, &settings) else {
        return ExitCode::FAILURE;
    };
    let lists = Orchestrator::new(store, settings);
    let aggregations = [AggregationRequest::new(&column, aggregation)];

    match lists.aggregate_query(&args.to_request(), &aggregations).await {
        Ok(Some(sql)) => {
            println!("{}", sql);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("-- nothing to aggregate");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_run(args: RequestArgs, settings: Settings, db: Option<PathBuf>) -> ExitCode {
    let db_path = match db {
        Some(path) => path,
        None => match settings.database.resolved_path() {
            Ok(Some(path)) => path,
            Ok(None) => {
                eprintln!("Error: no database given (use --db or [database] path)");
                return ExitCode::FAILURE;
            }
            Err(e) => {
                eprintln!("Error resolving database path: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    let executor = match SqliteExecutor::open(&db_path) {
        Ok(executor) => executor,
        Err(e) => {
            eprintln!("Error opening '{}': {}", db_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let Some(store) = open_store(&args, &settings) else {
        return ExitCode::FAILURE;
    };
    let lists = Orchestrator::new(store, settings);

    match lists.list(&args.to_request(), &executor).await {
        Ok(rows) => {
            for row in rows {
                println!("{}", row.into_json());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
