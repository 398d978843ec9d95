//! HTTP plumbing shared by the console clients.
//!
//! The services expose no provisioning API, only their web consoles, so all
//! traffic goes through a cookie-keeping session that can GET a page and POST
//! a form back to it.
use crate::model::Credential;
use thiserror::Error;

pub mod csrf;
#[cfg(test)]
pub(crate) mod fake;
pub mod readiness;
mod transport;

pub use transport::UreqTransport;

/// What the console clients need from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// URL the response was finally served from, after redirects.
    pub url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One cookie-bearing session against a service.
///
/// Every value of this type is a fresh session; cookies set by responses are
/// replayed on later requests made through the same value.
pub trait HttpTransport {
    fn get(&self, url: &str, auth: Option<&Credential>) -> Result<HttpResponse, SessionError>;

    /// POST `fields` as `application/x-www-form-urlencoded`.
    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse, SessionError>;

    /// POST a pre-encoded body with explicit headers.
    fn post_body(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, SessionError>;
}

/// Builds a new, empty session for each HTTP-driven step.
pub type SessionFactory = Box<dyn Fn() -> Box<dyn HttpTransport>>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("no CSRF token on {url} (marker {marker} not found)")]
    CsrfMarkerMissing { url: String, marker: String },
    #[error("login rejected for user {username}")]
    LoginRejected { username: String },
    #[error("{operation} requires a logged-in session")]
    NotAuthenticated { operation: &'static str },
}

/// Fail with [`SessionError::Status`] unless the response is 2xx.
pub fn ensure_success(response: HttpResponse) -> Result<HttpResponse, SessionError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(SessionError::Status {
        url: response.url,
        status: response.status,
    })
}

/// Join `path` onto a base URL without doubling or dropping slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
