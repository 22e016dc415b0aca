use std::sync::Arc;
use std::time::Duration;

use actix::prelude::*;
use actix::Addr;
use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, error};
use regex::Regex;
use reqwest_middleware::ClientWithMiddleware as HttpClient;

use crate::actors::{http_client, ActorError, HealthCommand};
use crate::config::Settings;
use crate::schemas::PerfType;

const URL_TEMPLATE: &str = "https://lichess.org/stat/rating/distribution";
const CHART_MARKER: &str = "lichess.ratingDistributionChart";

lazy_static! {
    static ref SCRIPT: Regex =
        Regex::new(r"(?is)<script[^>]*>(.*?)</script>").expect("valid script pattern");
    static ref COUNTS: Regex = Regex::new(r"\[[0-9, ]+\]").expect("valid counts pattern");
}

/// Anything able to hand out the raw histogram of a perf type.
#[async_trait(?Send)]
pub trait DistributionSource {
    async fn fetch(&self, perf_type: PerfType) -> Result<Vec<u64>, ActorError>;
}

pub struct LichessActor {
    client: Arc<HttpClient>,
    base_url: String,
    delay: Duration,
    timeout: Duration,
}

impl LichessActor {
    pub fn new(settings: &Settings) -> Result<Self, ActorError> {
        Ok(Self {
            client: http_client(&settings.retry)?,
            base_url: URL_TEMPLATE.to_string(),
            delay: settings.delay,
            timeout: settings.timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl Actor for LichessActor {
    type Context = Context<Self>;
}

impl Handler<HealthCommand> for LichessActor {
    type Result = ResponseFuture<bool>;

    fn handle(&mut self, _msg: HealthCommand, _: &mut Self::Context) -> Self::Result {
        Box::pin(async move { true })
    }
}

#[derive(Message, Debug)]
#[rtype(result = "Result<Vec<u64>, ActorError>")]
pub struct ScrapeDistributionCommand {
    pub perf_type: PerfType,
}

impl Handler<ScrapeDistributionCommand> for LichessActor {
    type Result = ResponseFuture<Result<Vec<u64>, ActorError>>;

    fn handle(&mut self, msg: ScrapeDistributionCommand, _: &mut Self::Context) -> Self::Result {
        let client = self.client.clone();
        let url = format!("{}/{}", self.base_url, msg.perf_type);
        let delay = self.delay;
        let timeout = self.timeout;

        Box::pin(async move {
            // @NOTE: stay polite with lichess between consecutive pages
            tokio::time::sleep(delay).await;

            let page = fetch_page(client, &url, timeout).await?;
            parse_distribution(&page).map_err(|error| ActorError {
                message: format!("Fail to parse {}: {}", msg.perf_type, error),
            })
        })
    }
}

#[async_trait(?Send)]
impl DistributionSource for Addr<LichessActor> {
    async fn fetch(&self, perf_type: PerfType) -> Result<Vec<u64>, ActorError> {
        self.send(ScrapeDistributionCommand { perf_type })
            .await
            .map_err(|error| ActorError {
                message: format!("Lichess actor is unreachable: {}", error),
            })?
    }
}

pub fn connect_to_lichess(settings: &Settings) -> Result<Addr<LichessActor>, ActorError> {
    Ok(LichessActor::new(settings)?.start())
}

async fn fetch_page(
    client: Arc<HttpClient>,
    url: &str,
    timeout: Duration,
) -> Result<String, ActorError> {
    debug!("Fetching {}", url);

    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|error| ActorError {
            message: format!("Fail to fetch {}: {}", url, error),
        })?;

    let status = resp.status();
    let body = resp.text().await.map_err(|error| ActorError {
        message: format!("Fail to read body of {}: {}", url, error),
    })?;

    if !status.is_success() {
        error!("Fetching {} returned {}: {}", url, status, body);

        return Err(ActorError {
            message: format!("Fail to fetch {}: status {}", url, status),
        });
    }

    Ok(body)
}

/// Extracts the bucket counts from the `<script>` feeding the rating chart.
pub fn parse_distribution(page: &str) -> Result<Vec<u64>, ActorError> {
    let script = SCRIPT
        .captures_iter(page)
        .filter_map(|capture| capture.get(1))
        .map(|body| body.as_str())
        .find(|body| body.contains(CHART_MARKER))
        .ok_or_else(|| ActorError {
            message: format!("no script contains {}", CHART_MARKER),
        })?;

    let counts = COUNTS.find(script).ok_or_else(|| ActorError {
        message: "chart script holds no array of counts".to_string(),
    })?;

    let distribution =
        serde_json::from_str::<Vec<u64>>(counts.as_str()).map_err(|error| ActorError {
            message: format!("invalid array of counts: {}", error),
        })?;

    if distribution.is_empty() {
        return Err(ActorError {
            message: "array of counts is empty".to_string(),
        });
    }
    if distribution
        .iter()
        .try_fold(0u64, |sum, count| sum.checked_add(*count))
        .is_none()
    {
        return Err(ActorError {
            message: "counts overflow a u64 total".to_string(),
        });
    }

    Ok(distribution)
}
