use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;

use crate::error::WikiError;
use crate::session::{Transport, WireResponse};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

pub(crate) type RequestLog = Rc<RefCell<Vec<RecordedRequest>>>;

/// Transport fake: serves a scripted queue of responses and records every
/// request. Running out of scripted responses is an error, so a test fails
/// loudly when the client issues more requests than expected.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: VecDeque<WireResponse>,
    log: RequestLog,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&mut self, body: Value) {
        self.responses.push_back(WireResponse {
            status: 200,
            body: body.to_string(),
        });
    }

    pub fn push_response(&mut self, status: u16, body: &str) {
        self.responses.push_back(WireResponse {
            status,
            body: body.to_string(),
        });
    }

    /// Handle onto the request log, usable after the transport is boxed away.
    pub fn log(&self) -> RequestLog {
        Rc::clone(&self.log)
    }

    fn serve(
        &mut self,
        method: &'static str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<WireResponse, WikiError> {
        self.log.borrow_mut().push(RecordedRequest {
            method,
            url: url.to_string(),
            params: params.to_vec(),
        });
        self.responses.pop_front().ok_or_else(|| {
            WikiError::UnexpectedResponse(format!("no scripted response for {method} {url}"))
        })
    }
}

impl Transport for ScriptedTransport {
    fn get(&mut self, url: &str, params: &[(String, String)]) -> Result<WireResponse, WikiError> {
        self.serve("GET", url, params)
    }

    fn post(&mut self, url: &str, params: &[(String, String)]) -> Result<WireResponse, WikiError> {
        self.serve("POST", url, params)
    }
}
