//! Callback dialect settings.
//!
//! Observers differ in how they expect events to be addressed and
//! authenticated. These settings describe one observer's dialect so a
//! single reporter can serve all of them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shape of the URL each event is posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallbackPathStyle {
    /// `{endpoint}/{event}`
    #[default]
    Flat,
    /// `{endpoint}/{job_id}/{event}`
    JobScoped,
}

impl CallbackPathStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Some(Self::Flat),
            "job_scoped" | "job-scoped" | "scoped" => Some(Self::JobScoped),
            _ => None,
        }
    }
}

/// How requests authenticate against the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "style")]
pub enum CallbackAuth {
    /// No authorization header
    #[default]
    None,
    /// A custom header carrying the raw key (e.g. `key: <token>`)
    Header { name: String, value: String },
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
}

/// Everything needed to reach one observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSettings {
    /// Base URL, without trailing slash
    pub endpoint: String,
    /// URL shape
    pub path_style: CallbackPathStyle,
    /// Authorization style
    pub auth: CallbackAuth,
    /// Payload key the job id is reported under
    pub job_id_field: String,
    /// Per-request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl CallbackSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            path_style: CallbackPathStyle::default(),
            auth: CallbackAuth::default(),
            job_id_field: "generate_number".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_path_style(mut self, path_style: CallbackPathStyle) -> Self {
        self.path_style = path_style;
        self
    }

    pub fn with_auth(mut self, auth: CallbackAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_job_id_field(mut self, field: impl Into<String>) -> Self {
        self.job_id_field = field.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL an event named `event` is posted to.
    pub fn event_url(&self, job_id: &str, event: &str) -> String {
        match self.path_style {
            CallbackPathStyle::Flat => format!("{}/{}", self.endpoint, event),
            CallbackPathStyle::JobScoped => format!("{}/{}/{}", self.endpoint, job_id, event),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
