use super::error::ReplayError;
use crate::application::ports::ReplayGateway;
use crate::domain::entities::QueuedAction;
use crate::domain::value_objects::HttpMethod;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use std::time::Duration;
use tracing::debug;

/// Replays queued actions over HTTP with `reqwest`.
pub struct HttpReplayGateway {
    client: Client,
}

impl HttpReplayGateway {
    pub fn new(request_timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build_request(&self, action: &QueuedAction) -> Result<RequestBuilder, ReplayError> {
        let url = reqwest::Url::parse(&action.url)
            .map_err(|err| ReplayError::InvalidRequest(format!("{}: {err}", action.url)))?;
        let mut builder = self.client.request(to_reqwest_method(action.method), url);
        for (name, value) in &action.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &action.body {
            builder = builder.json(body.as_json());
        }
        Ok(builder)
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl ReplayGateway for HttpReplayGateway {
    async fn replay(&self, action: &QueuedAction) -> Result<(), AppError> {
        let builder = self.build_request(action)?;
        let response = builder.send().await.map_err(ReplayError::from)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplayError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        debug!(action_id = %action.id, status = status.as_u16(), "Replay accepted");
        Ok(())
    }
}
