//! REST backend client.
//!
//! ```text
//! GET   /sessions/                      list
//! GET   /sessions/{id}                  get
//! POST  /sessions/                      create
//! PATCH /sessions/{id}/start|resume|complete
//! PATCH /sessions/{id}/pause            {reason}
//! GET   /sessions/{id}/interruptions
//! GET   /sessions/history
//! ```
//!
//! Naive timestamps in responses are resolved in the configured
//! [`BackendTimezone`] before decoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{SessionPatch, SessionRepository};
use crate::error::RepositoryError;
use crate::session::{BackendTimezone, HistoryEntry, Interruption, NewSession, Session};

#[derive(Debug, Clone)]
pub struct HttpSessionRepository {
    client: Client,
    base_url: Url,
    timezone: BackendTimezone,
}

#[derive(Debug, Serialize)]
struct PauseRequest<'a> {
    reason: &'a str,
}

impl HttpSessionRepository {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RepositoryError> {
        let base_url = Url::parse(base_url).map_err(|error| {
            RepositoryError::Transport(format!("invalid base url '{base_url}': {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RepositoryError::Transport(format!(
                "base url '{base_url}' cannot be a base"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                RepositoryError::Transport(format!("cannot build http client: {error}"))
            })?;
        Ok(Self {
            client,
            base_url,
            timezone: BackendTimezone::default(),
        })
    }

    /// Zone for timestamps the backend sends without an offset.
    pub fn with_timezone(mut self, timezone: BackendTimezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn timezone(&self) -> BackendTimezone {
        self.timezone
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RepositoryError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                RepositoryError::Transport("backend URL cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder, RepositoryError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "backend request");
        Ok(self.client.request(method, url))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<T, RepositoryError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &body, resource));
        }

        let decode =
            |error: serde_json::Error| RepositoryError::Decode(format!("{error}; body={body}"));
        let mut value: serde_json::Value = serde_json::from_str(&body).map_err(decode)?;
        self.timezone.localize(&mut value);
        serde_json::from_value(value).map_err(decode)
    }
}

/// Map a non-success response. FastAPI puts its message under `detail`.
fn status_error(status: StatusCode, body: &str, resource: &str) -> RepositoryError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| match json.get("detail")? {
            serde_json::Value::String(detail) => Some(detail.clone()),
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("http {}", status.as_u16())
            } else {
                body.trim().to_string()
            }
        });

    match status {
        StatusCode::NOT_FOUND => RepositoryError::NotFound {
            resource: resource.to_string(),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RepositoryError::Timeout,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            RepositoryError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
        other => RepositoryError::Server {
            status: other.as_u16(),
            message,
        },
    }
}

fn latest(interruptions: &[Interruption]) -> Option<Interruption> {
    interruptions
        .iter()
        .max_by_key(|i| (i.pause_time, i.id))
        .cloned()
}

#[async_trait]
impl SessionRepository for HttpSessionRepository {
    async fn list(&self) -> Result<Vec<Session>, RepositoryError> {
        let request = self.request(Method::GET, &["sessions", ""])?;
        self.send(request, "sessions").await
    }

    async fn get(&self, id: i64) -> Result<Session, RepositoryError> {
        let id_segment = id.to_string();
        let request = self.request(Method::GET, &["sessions", &id_segment])?;
        self.send(request, &format!("session {id}")).await
    }

    async fn create(&self, fields: &NewSession) -> Result<Session, RepositoryError> {
        let request = self.request(Method::POST, &["sessions", ""])?.json(fields);
        self.send(request, "sessions").await
    }

    async fn update(&self, id: i64, patch: SessionPatch) -> Result<Session, RepositoryError> {
        // No dedicated overdue endpoint: the backend decides the terminal
        // status on completion.
        let action = match patch {
            SessionPatch::Start => "start",
            SessionPatch::Resume => "resume",
            SessionPatch::Complete | SessionPatch::MarkOverdue => "complete",
        };
        let id_segment = id.to_string();
        let request = self.request(Method::PATCH, &["sessions", &id_segment, action])?;
        self.send(request, &format!("session {id}")).await
    }

    async fn list_interruptions(
        &self,
        session_id: i64,
    ) -> Result<Vec<Interruption>, RepositoryError> {
        let id_segment = session_id.to_string();
        let request = self.request(Method::GET, &["sessions", &id_segment, "interruptions"])?;
        self.send(request, &format!("session {session_id}")).await
    }

    async fn create_interruption(
        &self,
        session_id: i64,
        reason: &str,
    ) -> Result<Interruption, RepositoryError> {
        let id_segment = session_id.to_string();
        // Body per the API contract; the query parameter is what the
        // reference server reads.
        let request = self
            .request(Method::PATCH, &["sessions", &id_segment, "pause"])?
            .query(&[("reason", reason)])
            .json(&PauseRequest { reason });
        let session: Session = self.send(request, &format!("session {session_id}")).await?;

        if let Some(interruption) = latest(&session.interruptions) {
            return Ok(interruption);
        }
        let interruptions = self.list_interruptions(session_id).await?;
        latest(&interruptions).ok_or_else(|| {
            RepositoryError::Decode(format!(
                "pause of session {session_id} did not record an interruption"
            ))
        })
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let request = self.request(Method::GET, &["sessions", "history"])?;
        self.send(request, "session history").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(base: &str) -> HttpSessionRepository {
        HttpSessionRepository::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoints_keep_trailing_slash_for_collections() {
        let repo = repo("http://localhost:8090");
        assert_eq!(
            repo.endpoint(&["sessions", ""]).unwrap().as_str(),
            "http://localhost:8090/sessions/"
        );
        assert_eq!(
            repo.endpoint(&["sessions", "7", "pause"]).unwrap().as_str(),
            "http://localhost:8090/sessions/7/pause"
        );
    }

    #[test]
    fn endpoints_respect_base_path() {
        let repo = repo("https://example.com/api/");
        assert_eq!(
            repo.endpoint(&["sessions", "history"]).unwrap().as_str(),
            "https://example.com/api/sessions/history"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(HttpSessionRepository::new("not a url", Duration::from_secs(1)).is_err());
        assert!(
            HttpSessionRepository::new("mailto:me@example.com", Duration::from_secs(1)).is_err()
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, "", "session 3"),
            RepositoryError::NotFound {
                resource: "session 3".into()
            }
        );
        assert_eq!(
            status_error(
                StatusCode::BAD_REQUEST,
                r#"{"detail":"Cannot start session"}"#,
                "session 3"
            ),
            RepositoryError::Rejected {
                status: 400,
                message: "Cannot start session".into()
            }
        );
        assert_eq!(
            status_error(StatusCode::GATEWAY_TIMEOUT, "", "x"),
            RepositoryError::Timeout
        );
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom", "x"),
            RepositoryError::Server {
                status: 500,
                message: "boom".into()
            }
        );
    }
}
