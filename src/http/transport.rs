use super::{HttpResponse, HttpTransport, SessionError};
use crate::model::Credential;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body, ResponseExt};

/// Blocking session backed by a `ureq` agent with its own cookie jar.
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: Agent::new_with_config(config),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str, auth: Option<&Credential>) -> Result<HttpResponse, SessionError> {
        let mut request = self.agent.get(url);
        if let Some(credential) = auth {
            request = request.header("Authorization", basic_auth(credential));
        }
        let response = request.call().map_err(|err| transport_error(url, err))?;
        into_response(url, response)
    }

    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse, SessionError> {
        let response = self
            .agent
            .post(url)
            .send_form(fields.iter().copied())
            .map_err(|err| transport_error(url, err))?;
        into_response(url, response)
    }

    fn post_body(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, SessionError> {
        let mut request = self.agent.post(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request
            .send(body)
            .map_err(|err| transport_error(url, err))?;
        into_response(url, response)
    }
}

fn basic_auth(credential: &Credential) -> String {
    let token = STANDARD.encode(format!("{}:{}", credential.username, credential.password));
    format!("Basic {token}")
}

fn into_response(url: &str, mut response: Response<Body>) -> Result<HttpResponse, SessionError> {
    let status = response.status().as_u16();
    let final_url = response.get_uri().to_string();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|err| transport_error(url, err))?;
    Ok(HttpResponse {
        status,
        url: final_url,
        body,
    })
}

fn transport_error(url: &str, err: ureq::Error) -> SessionError {
    SessionError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}
