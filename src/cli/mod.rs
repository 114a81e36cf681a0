pub mod seed;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::SecurityConfig;
use crate::database::DataAccessor;

#[derive(Parser)]
#[command(name = "seeder")]
#[command(about = "Load or clear DevCamper sample data")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Import bootcamps, courses, reviews and users from JSON files", short_flag = 'i')]
    Import {
        #[arg(long, help = "Directory holding the JSON files", default_value = "_data")]
        data_dir: PathBuf,
    },

    #[command(about = "Delete every record in every collection", short_flag = 'd')]
    Destroy,
}

pub async fn run(cli: Cli, db: &dyn DataAccessor, security: &SecurityConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Import { data_dir } => {
            let summary = seed::import(db, &data_dir, security).await?;
            println!("Data imported: {}", summary);
        }
        Commands::Destroy => {
            let removed = seed::destroy(db).await?;
            println!("Data destroyed: {} records", removed);
        }
    }
    Ok(())
}
