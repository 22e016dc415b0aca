use std::io::{Error, ErrorKind, Result as AppStateResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use actix::Addr;
use actix_web::web::Data;
use actix_web::{HttpResponse, Result as HttpResult};
use actix_web_prometheus::{PrometheusMetrics, PrometheusMetricsBuilder};

use chrono::Utc;
use log::{error, info};
use serde::{Deserialize, Serialize};

use ratingscope::actors::cron::CronSchedule;
use ratingscope::actors::lichess::{
    connect_to_lichess, LichessActor, ScrapeDistributionCommand,
};
use ratingscope::actors::HealthCommand;
use ratingscope::algorithm::{estimate_labelled, Histogram};
use ratingscope::config::Settings;
use ratingscope::crawl::{scrape_and_compute, ScrapeReport};
use ratingscope::entities::{connect, Distributions, DocumentStore};
use ratingscope::schemas::{PercentileRatings, PerfType};

pub mod distributions;

#[derive(Serialize, Deserialize, Clone, Debug)]
struct Status {
    store: bool,
    scraper: bool,
    running: bool,
    next_scrape: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Probe {
    pub perf_type: PerfType,
    pub distribution: Vec<u64>,
    pub percentiles: PercentileRatings,
}

/// Clears the running flag when a scrape ends, even by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AppState {
    // @NOTE: monitoring
    prometheus: PrometheusMetrics,
    running: Arc<AtomicBool>,

    // @NOTE: shared components
    settings: Settings,
    schedule: Mutex<CronSchedule>,
    distributions: Distributions,
    lichess: Arc<Addr<LichessActor>>,
}

impl AppState {
    pub async fn new(settings: Settings) -> AppStateResult<AppState> {
        let store = connect(&settings.store).await.map_err(|error| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Failed to connect store: {}", error),
            )
        })?;

        Self::with_store(settings, store)
    }

    pub fn with_store(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
    ) -> AppStateResult<AppState> {
        let prometheus = PrometheusMetricsBuilder::new("ratings")
            .endpoint("/metrics")
            .build()
            .map_err(|error| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("Failed to build prometheus: {}", error),
                )
            })?;

        let schedule = CronSchedule::new(&settings.cron, Utc::now())
            .map_err(|error| Error::new(ErrorKind::InvalidInput, error.message))?;

        let lichess = connect_to_lichess(&settings)
            .map_err(|error| Error::new(ErrorKind::InvalidInput, error.message))?;

        Ok(AppState {
            prometheus,
            running: Arc::new(AtomicBool::new(false)),
            distributions: Distributions::new(store, settings.retry),
            schedule: Mutex::new(schedule),
            lichess: Arc::new(lichess),
            settings,
        })
    }

    pub fn prometheus(&self) -> &PrometheusMetrics {
        &self.prometheus
    }

    pub fn distributions(&self) -> &Distributions {
        &self.distributions
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts a scrape when the cron schedule is due.
    pub fn send_tick_to_schedule(self: &Arc<Self>) {
        let due = match self.schedule.lock() {
            Ok(mut schedule) => match schedule.tick(Utc::now()) {
                Ok(due) => due,
                Err(error) => {
                    error!("Failed to compute next scrape: {}", error);
                    false
                }
            },
            Err(_) => {
                error!("Schedule lock is poisoned");
                false
            }
        };

        if due && !self.spawn_scrape() {
            info!("Previous scrape is still running, skip this round");
        }
    }

    /// Runs a scrape in background. Returns false when one is already running.
    pub fn spawn_scrape(self: &Arc<Self>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let appstate = self.clone();
        actix_rt::spawn(async move {
            let _running = RunningGuard(appstate.running.clone());

            appstate.scrape().await;
        });
        true
    }

    async fn scrape(&self) -> ScrapeReport {
        info!(
            "Scrape started at {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        );

        scrape_and_compute(
            self.lichess.as_ref(),
            &self.distributions,
            &self.settings.perf_types,
            self.settings.geometry,
            &self.settings.percentiles,
        )
        .await
    }

    fn next_scrape(&self) -> String {
        match self.schedule.lock() {
            Ok(schedule) => schedule.next().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            Err(_) => String::new(),
        }
    }

    pub async fn ping(&self) -> bool {
        self.distributions.ping().await
    }
}

pub async fn health(appstate: Data<Arc<AppState>>) -> HttpResult<HttpResponse> {
    let store = appstate.ping().await;
    let scraper = appstate.lichess.send(HealthCommand).await.unwrap_or(false);
    let status = Status {
        store,
        scraper,
        running: appstate.is_running(),
        next_scrape: appstate.next_scrape(),
    };

    if store && scraper {
        Ok(HttpResponse::Ok().json(status))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(status))
    }
}

pub async fn scrape(appstate: Data<Arc<AppState>>) -> HttpResult<HttpResponse> {
    if appstate.get_ref().spawn_scrape() {
        Ok(HttpResponse::Accepted().body("ok"))
    } else {
        Ok(HttpResponse::Conflict().body("Scrape is already running"))
    }
}

/// Scrapes a single perf type synchronously, mostly to check the parser against
/// the live page.
pub async fn probe(
    appstate: Data<Arc<AppState>>,
    path: actix_web::web::Path<String>,
) -> HttpResult<HttpResponse> {
    let perf_type: PerfType = path
        .into_inner()
        .parse()
        .map_err(actix_web::error::ErrorBadRequest)?;

    match appstate
        .lichess
        .send(ScrapeDistributionCommand { perf_type })
        .await
    {
        Ok(Ok(counts)) => {
            let histogram = Histogram::new(appstate.settings.geometry, counts);
            let mut percentiles = PercentileRatings::new();

            // @NOTE: an empty page still answers with its counts
            if let Ok(estimates) = estimate_labelled(&histogram, &appstate.settings.percentiles) {
                for (label, estimate) in estimates {
                    if let Ok(rating) = estimate {
                        percentiles.insert(label, rating);
                    }
                }
            }

            Ok(HttpResponse::Ok().json(Probe {
                perf_type,
                distribution: histogram.counts().to_vec(),
                percentiles,
            }))
        }
        Ok(Err(error)) => Ok(HttpResponse::BadGateway().body(error.message)),
        Err(error) => Ok(HttpResponse::InternalServerError().body(format!("{}", error))),
    }
}
