//! HTTP callback reporter.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use tracing::{debug, info, warn};

use reel_models::{CallbackAuth, CallbackSettings, JobSpec};

use crate::error::{CallbackError, CallbackResult};
use crate::event::CallbackEvent;

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// No endpoint configured; nothing was sent
    Disabled,
    /// Observer answered 2xx
    Delivered { status: u16 },
    /// Observer answered non-2xx
    Rejected { status: u16 },
    /// Transport error (connect, timeout, ...)
    Failed(String),
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered { .. })
    }
}

/// Destination for lifecycle events.
///
/// Implementations must not fail the run: problems are reported through
/// the returned `DeliveryStatus` only.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &CallbackEvent) -> DeliveryStatus;
}

struct Target {
    settings: CallbackSettings,
    headers: HeaderMap,
    http: Client,
}

/// Posts events as JSON to the configured observer.
pub struct CallbackReporter {
    job_id: String,
    target: Option<Target>,
}

impl CallbackReporter {
    /// Create a reporter; `None` settings make every emission a no-op.
    pub fn new(job_id: impl Into<String>, settings: Option<CallbackSettings>) -> CallbackResult<Self> {
        let target = match settings {
            Some(settings) if !settings.endpoint.is_empty() => {
                let headers = auth_headers(&settings.auth)?;
                let http = Client::builder().timeout(settings.timeout).build()?;
                Some(Target {
                    settings,
                    headers,
                    http,
                })
            }
            _ => None,
        };

        Ok(Self {
            job_id: job_id.into(),
            target,
        })
    }

    /// Create a reporter from a job spec.
    pub fn from_spec(spec: &JobSpec) -> CallbackResult<Self> {
        Self::new(spec.job_id.clone(), spec.callback.clone())
    }

    /// Reporter that never sends anything.
    pub fn disabled(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            target: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    async fn deliver(&self, target: &Target, event: &CallbackEvent) -> DeliveryStatus {
        let segment = event.kind().path_segment();
        let url = target.settings.event_url(&self.job_id, segment);

        let body = match event.payload(&target.settings.job_id_field) {
            Ok(body) => body,
            Err(e) => {
                warn!("[callback:{}] failed to encode payload: {}", segment, e);
                return DeliveryStatus::Failed(e.to_string());
            }
        };

        debug!("[callback:{}] POST {}", segment, url);

        let response = match target
            .http
            .post(&url)
            .headers(target.headers.clone())
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("[callback:{}] delivery failed: {}", segment, e);
                return DeliveryStatus::Failed(e.to_string());
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            info!("[callback:{}] {} {}", segment, status.as_u16(), text);
            DeliveryStatus::Delivered {
                status: status.as_u16(),
            }
        } else {
            warn!("[callback:{}] {} {}", segment, status.as_u16(), text);
            DeliveryStatus::Rejected {
                status: status.as_u16(),
            }
        }
    }
}

#[async_trait]
impl EventSink for CallbackReporter {
    async fn emit(&self, event: &CallbackEvent) -> DeliveryStatus {
        match &self.target {
            Some(target) => self.deliver(target, event).await,
            None => DeliveryStatus::Disabled,
        }
    }
}

/// Headers implementing the configured auth style.
fn auth_headers(auth: &CallbackAuth) -> CallbackResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    match auth {
        CallbackAuth::None => {}
        CallbackAuth::Header { name, value } => {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CallbackError::InvalidHeader(format!("{}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CallbackError::InvalidHeader(e.to_string()))?;
            headers.insert(name, value);
        }
        CallbackAuth::Bearer { token } => {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| CallbackError::InvalidHeader(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
    }
    Ok(headers)
}
