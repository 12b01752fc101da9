///
/// naml-sql - run SQL against a database through the naml SQL driver
///
/// Usage:
/// - naml-sql app.db "SELECT * FROM users"
/// - naml-sql app.db --file schema.sql
/// - echo "SELECT 1" | naml-sql :memory:
///

mod runner;
mod script;

use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use naml_std_sql::{Connection, DriverConfig, Environment};
use tracing::Level;

use runner::{abandon_transaction, Runner};
use script::split_statements;

#[derive(Parser)]
#[command(name = "naml-sql")]
#[command(author, version, about = "Run SQL through the naml SQL driver", long_about = None)]
struct Cli {
    /// Database file, `file:` URI, or `:memory:`
    database: String,

    /// Statements to execute in order
    statements: Vec<String>,

    /// Read statements from a script file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Driver configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Busy timeout in milliseconds, overriding the config
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Print column names before query results
    #[arg(long)]
    headers: bool,

    /// Text printed for NULL values
    #[arg(long, default_value = "")]
    null: String,

    /// Run everything in one transaction, committed at the end
    #[arg(long)]
    transaction: bool,

    /// Log driver activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    if let Err(message) = run(&cli) {
        eprintln!("naml-sql: {}", message);
        process::exit(1);
    }
}

fn load_statements(cli: &Cli) -> Result<Vec<String>, String> {
    let mut statements = Vec::new();
    if let Some(path) = &cli.file {
        let script = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        statements.extend(split_statements(&script));
    }
    for text in &cli.statements {
        statements.extend(split_statements(text));
    }
    if cli.file.is_none() && cli.statements.is_empty() {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .map_err(|e| format!("cannot read stdin: {}", e))?;
        statements.extend(split_statements(&script));
    }
    Ok(statements)
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => DriverConfig::load(path).map_err(|e| e.to_string())?,
        None => DriverConfig::default(),
    };
    let statements = load_statements(cli)?;

    let env = naml_std_sql::open_with_config("sqlite3", config).map_err(|e| e.to_string())?;
    let conn = env
        .connect(&cli.database, cli.timeout.map(Duration::from_millis))
        .map_err(|e| format!("cannot open {}: {}", cli.database, e))?;

    if cli.transaction {
        conn.set_autocommit(false).map_err(|e| e.to_string())?;
    }

    let stdout = std::io::stdout();
    let mut runner = Runner::new(stdout.lock(), cli.headers, &cli.null);
    for sql in &statements {
        if let Err(e) = runner.run(&conn, sql) {
            if cli.transaction {
                abandon_transaction(&conn);
            }
            return Err(e.to_string());
        }
    }
    drop(runner);

    if cli.transaction {
        conn.commit().map_err(|e| e.to_string())?;
        conn.set_autocommit(true).map_err(|e| e.to_string())?;
    }
    conn.close().map_err(|e| e.to_string())?;
    env.close();
    Ok(())
}
