// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use influxdb_compat::{
    load_config_from_env, load_config_with_env, InfluxConnection, Point, WriteOutcome,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// InfluxDB compat - write points and look up sync positions on 1.x or 2.x
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file (default: INFLUXDB_* environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and run the backend health check
    Check,

    /// Print the latest timestamp of a measurement, or the default start
    Latest {
        /// Measurement to look up (overrides lookup.measurement)
        #[arg(short, long)]
        measurement: Option<String>,

        /// Days before now to fall back to (overrides lookup.default_days)
        #[arg(short, long)]
        default_days: Option<u32>,
    },

    /// Write points from a JSON array file
    Write {
        /// File holding `[{"measurement", "tags", "fields", "time"}, ...]`
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config_with_env(path)?,
        None => load_config_from_env()?,
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Storage backend: {}", config.storage.backend);
    info!("Bucket/database: {}", config.storage.bucket);

    let connection = InfluxConnection::initialize(&config).await?;

    match args.command {
        Command::Check => {
            println!("{} backend healthy", connection.backend_type());
        }

        Command::Latest {
            measurement,
            default_days,
        } => {
            let default_days = default_days.unwrap_or(connection.lookup().default_days);
            let latest = match measurement {
                Some(m) => connection.latest_timestamp_or_default_for(&m, default_days).await,
                None => connection.get_latest_timestamp_or_default(default_days).await,
            };
            println!("{}", latest.to_rfc3339());
        }

        Command::Write { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let points: Vec<Point> =
                serde_json::from_str(&content).context("Failed to parse points JSON")?;

            match connection.write_points(&points).await {
                WriteOutcome::Empty => println!("no points to write"),
                WriteOutcome::Written { count } => println!("wrote {} points", count),
                WriteOutcome::Failed { error } => bail!("write failed: {}", error),
            }
        }
    }

    Ok(())
}
