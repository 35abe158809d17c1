//! REST Invoker - One HTTP call in, one decoded document out
//!
//! The trait is transport-agnostic; `hcs-provider` supplies a reqwest-backed
//! implementation bound to a service endpoint and project.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::error::{LifecycleError, LifecycleResult};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Default success codes for this method
    pub fn default_success_codes(&self) -> &'static [u16] {
        match self {
            Method::Get => &[200],
            Method::Post => &[200, 201, 202],
            Method::Put => &[200, 204],
            Method::Delete => &[200, 202, 204],
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved request, ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub method: Method,
    /// Path relative to the service endpoint, with every placeholder substituted
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Status codes treated as success
    pub success_codes: Vec<u16>,
}

impl OperationRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            success_codes: method.default_success_codes().to_vec(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers<'a>(mut self, headers: impl IntoIterator<Item = &'a (String, String)>) -> Self {
        self.headers.extend(headers.into_iter().cloned());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_success_codes(mut self, codes: &[u16]) -> Self {
        self.success_codes = codes.to_vec();
        self
    }

    pub fn is_success(&self, status: u16) -> bool {
        self.success_codes.contains(&status)
    }
}

/// Decoded response of a successful call
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Decoded JSON body; `Null` for empty bodies
    pub body: serde_json::Value,
}

/// Executes a single REST call without retrying
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Send the request and decode the response
    ///
    /// Statuses outside `request.success_codes` surface as
    /// [`LifecycleError::UnexpectedStatus`] carrying the raw body.
    async fn invoke(&self, request: OperationRequest) -> LifecycleResult<Response>;
}

#[async_trait]
impl<T: Invoker + ?Sized> Invoker for std::sync::Arc<T> {
    async fn invoke(&self, request: OperationRequest) -> LifecycleResult<Response> {
        (**self).invoke(request).await
    }
}

/// Decode a raw response body according to the request's allow-list
///
/// Shared by invoker implementations so every transport classifies
/// responses the same way.
pub fn decode_response(
    request: &OperationRequest,
    status: u16,
    raw: &[u8],
) -> LifecycleResult<Response> {
    if !request.is_success(status) {
        return Err(LifecycleError::UnexpectedStatus {
            code: status,
            body: String::from_utf8_lossy(raw).into_owned(),
        });
    }

    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Response {
            status,
            body: serde_json::Value::Null,
        });
    }

    let body = serde_json::from_slice(raw).map_err(|e| {
        LifecycleError::Decode(format!(
            "{} {} returned undecodable body: {}",
            request.method, request.path, e
        ))
    })?;

    Ok(Response { status, body })
}

/// Vendor error envelope
///
/// HCS services answer failures with either `{"error_code", "error_msg"}`
/// or `{"error": {"code", "message"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorEnvelope {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct FlatEnvelope {
    error_code: Option<String>,
    error_msg: Option<String>,
}

#[derive(Deserialize)]
struct NestedEnvelope {
    error: NestedError,
}

#[derive(Deserialize)]
struct NestedError {
    code: Option<String>,
    message: Option<String>,
}

impl ErrorEnvelope {
    /// Parse an envelope from a raw error body; unknown shapes yield an empty envelope
    pub fn parse(body: &str) -> Self {
        if let Ok(nested) = serde_json::from_str::<NestedEnvelope>(body) {
            return Self {
                code: nested.error.code,
                message: nested.error.message,
            };
        }
        if let Ok(flat) = serde_json::from_str::<FlatEnvelope>(body) {
            return Self {
                code: flat.error_code,
                message: flat.error_msg,
            };
        }
        Self::default()
    }
}

impl LifecycleError {
    /// HTTP status and envelope of an `UnexpectedStatus` error
    pub fn status_envelope(&self) -> Option<(u16, ErrorEnvelope)> {
        match self {
            LifecycleError::UnexpectedStatus { code, body } => {
                Some((*code, ErrorEnvelope::parse(body)))
            }
            _ => None,
        }
    }
}

/// Rule deciding whether an error means "the remote object is gone"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundRule {
    pub status_codes: Vec<u16>,
    /// Vendor error codes; empty means any envelope on a matching status
    pub error_codes: Vec<String>,
}

impl Default for NotFoundRule {
    fn default() -> Self {
        Self {
            status_codes: vec![404],
            error_codes: Vec::new(),
        }
    }
}

impl NotFoundRule {
    pub fn with_error_codes(codes: &[&str]) -> Self {
        Self {
            error_codes: codes.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        if !self.status_codes.contains(&status) {
            self.status_codes.push(status);
        }
        self
    }

    pub fn matches(&self, error: &LifecycleError) -> bool {
        let Some((status, envelope)) = error.status_envelope() else {
            return false;
        };
        if !self.status_codes.contains(&status) {
            return false;
        }
        if self.error_codes.is_empty() {
            return true;
        }
        envelope
            .code
            .is_some_and(|code| self.error_codes.iter().any(|c| *c == code))
    }
}

/// Substitute `{placeholder}` segments of a path template
///
/// Every placeholder must be resolved; the first one missing from `params`
/// is reported.
pub fn resolve_path(template: &str, params: &HashMap<String, String>) -> LifecycleResult<String> {
    let mut missing = None;
    let resolved = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match params.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                caps[0].to_string()
            }
        }
    });

    match missing {
        Some(placeholder) => Err(LifecycleError::UnresolvedPlaceholder {
            template: template.to_string(),
            placeholder,
        }),
        None => Ok(resolved.into_owned()),
    }
}
