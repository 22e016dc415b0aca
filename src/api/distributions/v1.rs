use std::sync::Arc;

use actix_web::error::{ErrorBadRequest, ErrorInternalServerError};
use actix_web::web::{Data, Path};
use actix_web::{HttpResponse, Result};

use log::error;
use serde::{Deserialize, Serialize};

use ratingscope::entities::StoreError;
use ratingscope::schemas::{timeline, Distribution, PerfType};

use crate::api::AppState;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DistributionResponse {
    pub id: String,

    #[serde(flatten)]
    pub distribution: Distribution,
}

fn parse_perf_type(path: Path<String>) -> Result<PerfType> {
    path.into_inner().parse::<PerfType>().map_err(ErrorBadRequest)
}

fn store_failure(error: StoreError) -> actix_web::Error {
    error!("Fail to read distributions: {}", error);
    ErrorInternalServerError(error)
}

/// Every stored snapshot, the raw dump the reporter used to download.
pub async fn list_distributions(appstate: Data<Arc<AppState>>) -> Result<HttpResponse> {
    let distributions = appstate
        .distributions()
        .list()
        .await
        .map_err(store_failure)?
        .into_iter()
        .map(|(id, distribution)| DistributionResponse { id, distribution })
        .collect::<Vec<_>>();

    Ok(HttpResponse::Ok().json(distributions))
}

pub async fn list_distributions_by_perf_type(
    appstate: Data<Arc<AppState>>,
    path: Path<String>,
) -> Result<HttpResponse> {
    let perf_type = parse_perf_type(path)?;
    let distributions = appstate
        .distributions()
        .list_by_perf_type(perf_type)
        .await
        .map_err(store_failure)?
        .into_iter()
        .map(|distribution| DistributionResponse {
            id: distribution.id(),
            distribution,
        })
        .collect::<Vec<_>>();

    Ok(HttpResponse::Ok().json(distributions))
}

/// One line per stored percentile, feeding the percentile-over-time chart.
pub async fn get_percentile_timeline(
    appstate: Data<Arc<AppState>>,
    path: Path<String>,
) -> Result<HttpResponse> {
    let perf_type = parse_perf_type(path)?;
    let distributions = appstate
        .distributions()
        .list_by_perf_type(perf_type)
        .await
        .map_err(store_failure)?;

    Ok(HttpResponse::Ok().json(timeline(&distributions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use actix_web::web::get;
    use actix_web::{test, App};
    use chrono::{TimeZone, Utc};

    use ratingscope::config::Settings;
    use ratingscope::entities::MemoryStore;
    use ratingscope::schemas::PercentileLine;

    async fn appstate() -> Arc<AppState> {
        let appstate = Arc::new(
            AppState::with_store(Settings::default(), Arc::new(MemoryStore::new())).unwrap(),
        );

        for (perf_type, hour, median) in [
            (PerfType::Blitz, 10, 1500.0),
            (PerfType::Blitz, 11, 1510.0),
            (PerfType::Bullet, 10, 1400.0),
        ] {
            let mut distribution = Distribution::new(
                perf_type,
                Utc.with_ymd_and_hms(2020, 4, 7, hour, 0, 0).unwrap(),
                vec![1, 2, 3],
            );
            distribution.percentiles = Some(BTreeMap::from([("50".to_string(), median)]));
            appstate.distributions().save(&distribution).await.unwrap();
        }

        appstate
    }

    #[actix_rt::test]
    async fn test_list_distributions() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(appstate().await))
                .route("/distributions", get().to(list_distributions))
                .route(
                    "/distributions/{perf_type}",
                    get().to(list_distributions_by_perf_type),
                ),
        )
        .await;

        let all: Vec<DistributionResponse> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/distributions").to_request(),
        )
        .await;
        assert_eq!(all.len(), 3);

        let blitz: Vec<DistributionResponse> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/distributions/blitz").to_request(),
        )
        .await;
        assert_eq!(
            blitz.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["blitz07042010", "blitz07042011"]
        );
    }

    #[actix_rt::test]
    async fn test_unknown_perf_type_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(appstate().await))
                .route("/percentiles/{perf_type}", get().to(get_percentile_timeline)),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/percentiles/bughouse").to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_percentile_timeline() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(appstate().await))
                .route("/percentiles/{perf_type}", get().to(get_percentile_timeline)),
        )
        .await;

        let lines: Vec<PercentileLine> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/percentiles/blitz").to_request(),
        )
        .await;

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].percentile, 50.0);
        assert_eq!(
            lines[0]
                .line
                .iter()
                .map(|point| point.rating)
                .collect::<Vec<_>>(),
            vec![1500.0, 1510.0]
        );
    }
}
