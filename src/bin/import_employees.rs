use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use employee_api::import::{FileUpload, import_uploads};
use employee_api::store::{PgEmployeeStore, run_migrations};

#[derive(Parser, Debug)]
#[command(
    name = "import_employees",
    about = "Bulk import employee CSV files into the employees database"
)]
struct Args {
    /// CSV files to import, applied in order. Each file is one transaction.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Assume the schema is already current and skip running migrations.
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    if !args.skip_migrations {
        run_migrations(&pool).await?;
    }

    let uploads: Vec<FileUpload> = args.files.into_iter().map(FileUpload::new).collect();
    let store = PgEmployeeStore::new(pool.clone());
    let outcome = import_uploads(&store, &uploads).await;

    pool.close().await;

    match outcome.failure {
        Some(failure) => {
            writeln!(
                io::stderr(),
                "error: import stopped at {}: {}",
                failure.upload,
                failure.error
            )?;
            writeln!(
                io::stderr(),
                "{} employee record(s) were applied before the failure",
                outcome.records_applied
            )?;
            std::process::exit(1);
        }
        None => {
            println!("Number of employees inserted : {}", outcome.records_applied);
        }
    }

    Ok(())
}
