use std::io::{Error, ErrorKind};

use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;

use ratingscope::actors::lichess::connect_to_lichess;
use ratingscope::config::Settings;
use ratingscope::crawl::{
    add_all_percentiles, add_percentiles, add_percentiles_for, scrape_distributions,
};
use ratingscope::entities::{connect, Distributions};
use ratingscope::schemas::PerfType;

mod api;
mod server;

#[derive(Parser, Debug)]
#[command(name = "ratings", about = "Lichess rating distributions and their percentiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the api and scrape on the configured cron
    Server {},

    /// Scrape once and store the snapshots
    Scrape {
        #[arg(long = "perf-type")]
        perf_types: Vec<PerfType>,

        #[arg(long = "skip-percentiles", default_value_t = false)]
        skip_percentiles: bool,
    },

    /// Compute percentiles of stored snapshots
    Percentiles {
        #[arg(long = "id")]
        id: Option<String>,

        /// Recompute snapshots which already have percentiles
        #[arg(long = "all", default_value_t = false)]
        all: bool,
    },
}

fn other<E: std::fmt::Display>(error: E) -> Error {
    Error::new(ErrorKind::Other, format!("{:#}", error))
}

async fn distributions(settings: &Settings) -> std::io::Result<Distributions> {
    let store = connect(&settings.store).await.map_err(other)?;
    Ok(Distributions::new(store, settings.retry))
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Server {} => server::run(settings).await,

        Commands::Scrape {
            perf_types,
            skip_percentiles,
        } => {
            let perf_types = if perf_types.is_empty() {
                settings.perf_types.clone()
            } else {
                perf_types
            };
            let distributions = distributions(&settings).await?;
            let lichess = connect_to_lichess(&settings).map_err(other)?;

            let report =
                scrape_distributions(&lichess, &distributions, &perf_types, Utc::now()).await;
            if !skip_percentiles {
                let updated = add_percentiles_for(
                    &distributions,
                    &report.saved,
                    settings.geometry,
                    &settings.percentiles,
                )
                .await;
                info!(
                    "Updated percentiles of {}/{} distributions",
                    updated,
                    report.saved.len()
                );
            }

            if report.failed.is_empty() {
                return Ok(());
            }

            Err(Error::new(
                ErrorKind::Other,
                format!(
                    "Fail to scrape {}",
                    report
                        .failed
                        .iter()
                        .map(|(perf_type, _)| perf_type.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ))
        }

        Commands::Percentiles { id, all } => {
            let distributions = distributions(&settings).await?;

            match id {
                Some(id) => {
                    let ratings = add_percentiles(
                        &distributions,
                        &id,
                        settings.geometry,
                        &settings.percentiles,
                    )
                    .await
                    .map_err(other)?;
                    info!("Percentiles of {}: {:?}", id, ratings);
                }
                None => {
                    let updated = add_all_percentiles(
                        &distributions,
                        settings.geometry,
                        &settings.percentiles,
                        !all,
                    )
                    .await
                    .map_err(other)?;
                    info!("Updated percentiles of {} distributions", updated);
                }
            }
            Ok(())
        }
    }
}
