use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{ActuatorClient, IndicatorColor, IndicatorState};
use crate::error::ActuatorError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
const USER_AGENT: &str = concat!("shapesort/", env!("CARGO_PKG_VERSION"));

/// Actuator reached over plain HTTP GET endpoints:
/// `/servo?angle=`, `/led?color=&state=` and `/log?msg=`.
#[derive(Debug, Clone)]
pub struct HttpActuatorClient {
    base_url: String,
    client: Client,
}

impl HttpActuatorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ActuatorError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ActuatorError::BaseUrl(base_url));
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| ActuatorError::Request {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String, ActuatorError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|source| ActuatorError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ActuatorError::Status {
                url,
                status: status.as_u16(),
            });
        }
        response
            .text()
            .await
            .map_err(|source| ActuatorError::Request { url, source })
    }
}

#[async_trait]
impl ActuatorClient for HttpActuatorClient {
    async fn set_position(&self, angle: i32) -> Result<String, ActuatorError> {
        self.get("/servo", &[("angle", angle.to_string())]).await
    }

    async fn set_indicator(
        &self,
        color: IndicatorColor,
        state: IndicatorState,
    ) -> Result<String, ActuatorError> {
        self.get(
            "/led",
            &[
                ("color", color.as_str().to_string()),
                ("state", state.as_str().to_string()),
            ],
        )
        .await
    }

    async fn log(&self, message: &str) -> Result<String, ActuatorError> {
        self.get("/log", &[("msg", message.to_string())]).await
    }
}
