//! Glue between translated requests, the host's transport and the classifier.
//!
//! # Design
//! `DispatchAdapter` mirrors the host-does-IO split: `prepare` turns a
//! `NormalizedRequest` into the `OutboundRequest` a transport sends, and
//! `complete` folds the transport's outcome into a `DispatchResult`. A host
//! that performs I/O itself (for example across the FFI boundary) calls the
//! two halves directly; `dispatch` wires them around a `Transport` impl.
//!
//! Field mappings always describe the request as the user wrote it, never
//! the response and never the bytes on the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::{
    classify_body, classify_query, is_form_urlencoded, parse_form, FieldMapping, VolatileFields,
};
use crate::config::ProbeConfig;
use crate::curl;
use crate::error::TransportError;
use crate::http::{find_header, HttpResponse, NormalizedRequest, OutboundRequest};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// How the request body is encoded before it reaches the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyMode {
    /// Form-encode when the Content-Type header says so.
    #[default]
    Auto,
    /// Always form-encode, adding the Content-Type header when missing.
    Form,
    /// The body was transformed upstream; send it verbatim.
    Raw,
}

/// Per-request knobs supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Overrides `ProbeConfig::default_body_mode` when set.
    pub body_mode: Option<BodyMode>,

    /// Pre-encoded message bytes that replace the body on the wire.
    pub binary_payload: Option<Vec<u8>>,

    pub volatile_fields: VolatileFields,
}

/// Executes an `OutboundRequest`. Implemented by the host.
pub trait Transport {
    fn send(&self, request: &OutboundRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&OutboundRequest) -> Result<HttpResponse, TransportError>,
{
    fn send(&self, request: &OutboundRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

/// Response-shaped value handed back to the caller.
///
/// For transport failures `status` carries the failure description,
/// `status_code` is `None` and headers/body are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub status: String,
    pub status_code: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl DispatchResponse {
    fn failure(err: &TransportError) -> Self {
        Self {
            status: err.to_string(),
            status_code: None,
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub response: DispatchResponse,
    pub field_mappings: FieldMapping,
    pub query_mappings: FieldMapping,
}

/// Stateless apart from its configuration.
#[derive(Debug, Clone, Default)]
pub struct DispatchAdapter {
    config: ProbeConfig,
}

impl DispatchAdapter {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Build the payload handed to the transport.
    pub fn prepare(&self, request: &NormalizedRequest, options: &DispatchOptions) -> OutboundRequest {
        let mut headers = request.headers.clone();
        let body = match (&options.binary_payload, &request.body) {
            (Some(payload), _) => Some(payload.clone()),
            (None, Some(body)) if self.encodes_form(request, options) => {
                if find_header(&headers, "content-type").is_none() {
                    headers.insert("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string());
                }
                Some(encode_form(body).into_bytes())
            }
            (None, Some(body)) => Some(body.clone().into_bytes()),
            (None, None) => None,
        };

        OutboundRequest {
            method: request.method,
            url: request.url.clone(),
            headers,
            body,
        }
    }

    /// Fold the transport outcome into a result. Mappings are only produced
    /// for 2xx responses.
    pub fn complete(
        &self,
        request: &NormalizedRequest,
        options: &DispatchOptions,
        outcome: Result<HttpResponse, TransportError>,
    ) -> DispatchResult {
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, url = %request.url, "transport failed");
                return DispatchResult {
                    response: DispatchResponse::failure(&err),
                    field_mappings: FieldMapping::new(),
                    query_mappings: FieldMapping::new(),
                };
            }
        };

        let (field_mappings, query_mappings) = if response.is_success() {
            self.mappings(request, options)
        } else {
            debug!(status = response.status, "non-2xx response, skipping field mappings");
            (FieldMapping::new(), FieldMapping::new())
        };

        DispatchResult {
            response: DispatchResponse {
                status: response.status.to_string(),
                status_code: Some(response.status),
                headers: fold_headers(response.headers),
                body: response.body,
            },
            field_mappings,
            query_mappings,
        }
    }

    /// Prepare, send and complete in one call. Never fails: every error is
    /// rendered into the returned response.
    pub fn dispatch<T: Transport + ?Sized>(
        &self,
        transport: &T,
        request: &NormalizedRequest,
        options: &DispatchOptions,
    ) -> DispatchResult {
        let outbound = self.prepare(request, options);
        debug!(method = %outbound.method, url = %outbound.url, "dispatching request");

        let outcome = self
            .check(&outbound)
            .and_then(|()| transport.send(&outbound));
        self.complete(request, options, outcome)
    }

    /// Reject requests that must not reach a transport: no URL, or a body
    /// above `max_body_bytes`.
    pub fn check(&self, outbound: &OutboundRequest) -> Result<(), TransportError> {
        if outbound.url.trim().is_empty() {
            return Err(TransportError::InvalidRequest("empty URL".to_string()));
        }
        let size = outbound.body.as_ref().map_or(0, Vec::len);
        if size > self.config.max_body_bytes {
            return Err(TransportError::PayloadTooLarge {
                size,
                limit: self.config.max_body_bytes,
            });
        }
        Ok(())
    }

    /// Translate a curl command and dispatch it.
    pub fn dispatch_curl<T: Transport + ?Sized>(
        &self,
        transport: &T,
        curl_text: &str,
        options: &DispatchOptions,
    ) -> DispatchResult {
        let request = curl::translate(curl_text);
        self.dispatch(transport, &request, options)
    }

    fn body_mode(&self, options: &DispatchOptions) -> BodyMode {
        options.body_mode.unwrap_or(self.config.default_body_mode)
    }

    fn encodes_form(&self, request: &NormalizedRequest, options: &DispatchOptions) -> bool {
        match self.body_mode(options) {
            BodyMode::Form => true,
            BodyMode::Auto => request.content_type().is_some_and(is_form_urlencoded),
            BodyMode::Raw => false,
        }
    }

    fn mappings(
        &self,
        request: &NormalizedRequest,
        options: &DispatchOptions,
    ) -> (FieldMapping, FieldMapping) {
        let volatile: VolatileFields = self
            .config
            .volatile_fields
            .iter()
            .chain(options.volatile_fields.iter())
            .collect();

        let content_type = if self.body_mode(options) == BodyMode::Form {
            Some(FORM_CONTENT_TYPE)
        } else {
            request.content_type()
        };
        let fields = request
            .body
            .as_deref()
            .map(|body| classify_body(body, content_type, &volatile))
            .unwrap_or_default();

        (fields, classify_query(&request.url))
    }
}

/// Repeated response headers such as `Set-Cookie` are joined with `, `.
fn fold_headers(headers: Vec<(String, String)>) -> BTreeMap<String, String> {
    let mut folded: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        match folded.get_mut(&name) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                folded.insert(name, value);
            }
        }
    }
    folded
}

/// Re-encode a raw `key=value&...` body. Input that is already encoded is
/// decoded first, so encoding twice is harmless.
pub fn encode_form(body: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(parse_form(body))
        .finish()
}
