use std::error::Error;
use std::fmt;
use std::sync::Arc;

use actix::prelude::*;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware as HttpClient};
use reqwest_retry::RetryTransientMiddleware;

use crate::config::RetryPolicy;

pub mod cron;
pub mod lichess;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone)]
pub struct ActorError {
    pub message: String,
}

impl fmt::Display for ActorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ActorError {}

#[derive(Message, Debug)]
#[rtype(result = "bool")]
pub struct HealthCommand;

/// Http client retrying transient failures (timeouts, 5xx, 429) with `retry`.
pub fn http_client(retry: &RetryPolicy) -> Result<Arc<HttpClient>, ActorError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|error| ActorError {
            message: format!("Fail to build client: {}", error),
        })?;

    Ok(Arc::new(
        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(
                retry.exponential_backoff(),
            ))
            .build(),
    ))
}
