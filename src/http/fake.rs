//! In-process transport that replays queued responses.
use super::{HttpResponse, HttpTransport, SessionError};
use crate::model::Credential;
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: &'static str,
    pub(crate) url: String,
    pub(crate) auth: Option<Credential>,
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<(u16, String), String>>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_status(&self, status: u16) {
        self.push_response(status, "");
    }

    pub(crate) fn push_response(&self, status: u16, body: &str) {
        self.responses
            .borrow_mut()
            .push_back(Ok((status, body.to_string())));
    }

    pub(crate) fn push_error(&self, message: &str) {
        self.responses
            .borrow_mut()
            .push_back(Err(message.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    fn respond(&self, request: RecordedRequest) -> Result<HttpResponse, SessionError> {
        let url = request.url.clone();
        self.requests.borrow_mut().push(request);
        let next = self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for {url}"));
        match next {
            Ok((status, body)) => Ok(HttpResponse { status, url, body }),
            Err(message) => Err(SessionError::Transport { url, message }),
        }
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, url: &str, auth: Option<&Credential>) -> Result<HttpResponse, SessionError> {
        self.respond(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            auth: auth.cloned(),
        })
    }

    fn post_form(&self, url: &str, _fields: &[(&str, &str)]) -> Result<HttpResponse, SessionError> {
        self.respond(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            auth: None,
        })
    }

    fn post_body(
        &self,
        url: &str,
        _body: &str,
        _headers: &[(&str, &str)],
    ) -> Result<HttpResponse, SessionError> {
        self.respond(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            auth: None,
        })
    }
}
