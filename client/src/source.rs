use checkpoint_shared::{CheckpointError, CheckpointRecord, CheckpointResponse};
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("record source reported {status}: {error}")]
    Upstream {
        status: StatusCode,
        error: String,
        details: Option<String>,
    },
    #[error("upstream status {status}; body preview: {preview}")]
    Status { status: StatusCode, preview: String },
    #[error("failed to decode records: {0}")]
    Decode(String),
}

/// Server-side narrowing supported by the record API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub state: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub upcoming: bool,
}

impl RecordQuery {
    fn params(&self) -> Vec<(&'static str, &str)> {
        let mut params = Vec::new();
        let fields = [
            ("state", &self.state),
            ("city", &self.city),
            ("county", &self.county),
        ];
        for (name, value) in fields {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                params.push((name, value));
            }
        }
        if self.upcoming {
            params.push(("upcoming", "true"));
        }
        params
    }
}

/// Client for `GET {base}/api/dui-checkpoints`.
#[derive(Debug, Clone)]
pub struct RecordSource {
    client: reqwest::Client,
    base_url: String,
}

impl RecordSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch(&self, query: &RecordQuery) -> Result<Vec<CheckpointRecord>, SourceError> {
        let resp = self
            .client
            .get(format!("{}/api/dui-checkpoints", self.base_url))
            .query(&query.params())
            .send()
            .await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<CheckpointError>(&bytes) {
                Ok(body) => SourceError::Upstream {
                    status,
                    error: body.error,
                    details: body.details,
                },
                Err(_) => SourceError::Status {
                    status,
                    preview: preview(&bytes),
                },
            });
        }

        let body: CheckpointResponse = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Decode(format!("{e}; body preview: {}", preview(&bytes))))?;
        if !body.success {
            return Err(SourceError::Upstream {
                status,
                error: "record source reported failure".to_string(),
                details: None,
            });
        }
        Ok(body.checkpoints)
    }
}

fn preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).chars().take(200).collect()
}
