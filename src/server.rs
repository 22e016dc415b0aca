use std::io::{Error, ErrorKind};
use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::web::{get, put, scope, Data};
use actix_web::{App, HttpServer};

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;

use chrono::Utc;
use log::{error, info};

use ratingscope::config::Settings;

use crate::api::distributions::v1 as distributions;
use crate::api::{health, probe, scrape, AppState};

pub async fn run(settings: Settings) -> std::io::Result<()> {
    let host = settings.host.clone();
    let port = settings.port;
    let concurrent = settings.concurrent;

    // @NOTE: control cron
    let (txstop, mut rxstop) = oneshot::channel::<()>();
    let (txcron, rxcron) = oneshot::channel::<()>();

    // @NOTE: store appstate
    let appstate_for_control = Arc::new(AppState::new(settings).await?);
    let appstate_for_cron = appstate_for_control.clone();

    // @NOTE: start cron
    actix_rt::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(1));
        let appstate = appstate_for_cron.clone();

        info!(
            "Cron started at {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    appstate.send_tick_to_schedule();
                }
                _ = &mut rxstop => {
                    info!("Cron is down...");

                    let _ = txcron.send(());
                    break;
                }
            }
        }
    });

    // @NOTE: spawn new http server
    let server = HttpServer::new(move || {
        App::new()
            // @NOTE: monitoring
            .wrap(appstate_for_control.prometheus().clone())
            .wrap(Logger::default())
            // @NOTE: health-check
            .route("/health", get().to(health))
            // @NOTE: APIs of rating distributions
            .service(
                scope("/api/v1")
                    .route(
                        "/distributions",
                        get().to(distributions::list_distributions),
                    )
                    .route(
                        "/distributions/{perf_type}",
                        get().to(distributions::list_distributions_by_perf_type),
                    )
                    .route(
                        "/percentiles/{perf_type}",
                        get().to(distributions::get_percentile_timeline),
                    )
                    .route("/scrape", put().to(scrape))
                    .route("/probe/{perf_type}", get().to(probe)),
            )
            // @NOTE: AppState
            .app_data(Data::new(appstate_for_control.clone()))
    })
    .workers(concurrent)
    .bind((host.as_str(), port))
    .map_err(|e| {
        Error::new(
            ErrorKind::AddrInUse,
            format!("Failed to bind to {}:{}: {}", host, port, e),
        )
    })?
    .shutdown_timeout(30)
    .run();

    let handler = server.handle();

    info!(
        "Server started at {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
    );

    // @NOTE: graceful shutdown
    actix_rt::spawn(async move {
        let (mut sigint, mut sigterm) = match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            _ => {
                error!("Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }

        info!("Shutting down...");
        let _ = txstop.send(());

        if rxcron.await.is_ok() {
            info!("Cron is downed gracefully...");
        }

        handler.stop(true).await;
        info!("Server is going to shutdown...");
    });

    // @NOTE: wait for everything to finish
    server.await
}
