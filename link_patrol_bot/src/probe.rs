use std::{future::Future, time::Duration};

use reqwest::{header::LOCATION, redirect::Policy, StatusCode};
use thiserror::Error;

/// Status of a link after probing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// HTTP 403.
    Forbidden,
    /// HTTP 301, with where it points to if the server said.
    Redirected { location: Option<String> },
    /// Anything else, including not getting an answer at all.
    Valid,
}

/// Raw answer to a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReply {
    pub status: u16,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("probe failed: {0}")]
pub struct ProbeError(pub String);

impl From<reqwest::Error> for ProbeError {
    fn from(value: reqwest::Error) -> Self {
        ProbeError(value.to_string())
    }
}

impl ProbeOutcome {
    /// Classify a probe result. Failing to probe counts as [`ProbeOutcome::Valid`]:
    /// a network hiccup shouldn't take links down.
    pub fn classify(result: Result<ProbeReply, ProbeError>) -> Self {
        match result {
            Ok(ProbeReply { status: 403, .. }) => ProbeOutcome::Forbidden,
            Ok(ProbeReply {
                status: 301,
                location,
            }) => ProbeOutcome::Redirected { location },
            Ok(_) => ProbeOutcome::Valid,
            Err(e) => {
                log::debug!("Assuming link is fine: {e}");
                ProbeOutcome::Valid
            }
        }
    }
}

/// Something that can check whether a link still works.
pub trait LinkProber: Send + Sync {
    fn probe(&self, url: &str) -> impl Future<Output = Result<ProbeReply, ProbeError>> + Send;
}

/// Probes links with an HTTP HEAD request, without following redirects.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent("GoogleOther")
            .redirect(Policy::none())
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl LinkProber for HttpProber {
    async fn probe(&self, url: &str) -> Result<ProbeReply, ProbeError> {
        let response = self.client.head(url).send().await?;

        let status = response.status();
        let location = if status == StatusCode::MOVED_PERMANENTLY {
            response
                .headers()
                .get(LOCATION)
                .and_then(|x| x.to_str().ok())
                .map(ToString::to_string)
        } else {
            None
        };

        Ok(ProbeReply {
            status: status.as_u16(),
            location,
        })
    }
}
