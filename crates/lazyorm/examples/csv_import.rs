//! Load a CSV file into a freshly inferred table.
//!
//! Run with: cargo run --example csv_import -p lazyorm -- path/to/file.csv table_name
//!
//! Set DATABASE_URL in .env file or environment variable.

use lazyorm::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mut args = std::env::args().skip(1);
    let (Some(path), Some(table)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: csv_import <file.csv> <table>");
    };
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in .env or environment"))?;

    let db = Db::new(create_pool_from_url(&database_url)?);
    let options = LoadOptions::new()
        .chunk_size(500)
        .drop_if_exists(true)
        .auto_increment(true)
        .log_create_table_query(true);

    match BulkLoader::new(&db, &table).options(options).load_path(&path).await {
        Ok(report) => {
            println!(
                "loaded {} rows into {table} in {} batches",
                report.rows_inserted, report.batches
            );
            Ok(())
        }
        Err(err) => {
            eprintln!("{} rows were committed before the failure", err.rows_committed);
            Err(err.into())
        }
    }
}
