use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::envelope::{Request, Response};
use crate::error::TransportError;
use crate::errors::FailureReport;

/// Carries request envelopes to the formplayer server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &Url, request: &Request) -> Result<Response, TransportError>;

    /// Tells the server about a failed request. Transports without a
    /// reporting channel drop the report.
    async fn report_error(
        &self,
        _url: &Url,
        _report: &FailureReport,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

/// `{base}/{action}`, keeping any path the base already has.
pub fn endpoint(base: &Url, action: &str) -> Result<Url, TransportError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| TransportError::Url(base.to_string()))?
        .pop_if_empty()
        .push(action);
    Ok(url)
}

/// JSON-over-HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("formplayer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &Url, request: &Request) -> Result<Response, TransportError> {
        debug!(%url, action = request.action.name(), "posting request");
        let response = self.client.post(url.clone()).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: serde_json::from_str::<Value>(&body).ok(),
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| TransportError::Decode(err.to_string()))
    }

    async fn report_error(&self, url: &Url, report: &FailureReport) -> Result<(), TransportError> {
        let response = self.client.post(url.clone()).json(report).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Http {
                status: status.as_u16(),
                body: None,
            })
        }
    }
}
