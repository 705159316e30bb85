//! Curl translation and request field classification for an API-testing
//! client.
//!
//! # Overview
//! Turns a pasted `curl` command into a `NormalizedRequest`, and infers a
//! semantic `FieldType` for every leaf of a request body or query string so
//! test assertions can be generated. The network round-trip is done by a
//! host-supplied `Transport` (host-does-IO pattern), which keeps this crate
//! deterministic and testable.
//!
//! # Design
//! - `curl::translate` and the `classify` functions are pure and never fail;
//!   malformed input degrades to empty or `string` results.
//! - `DispatchAdapter` is split into `prepare` (produces the outbound
//!   request) and `complete` (consumes the transport outcome), so the I/O
//!   boundary is explicit.
//! - Transport failures are rendered into a response-shaped value instead of
//!   being propagated.

pub mod classify;
pub mod config;
pub mod curl;
pub mod dispatch;
pub mod error;
pub mod http;

pub use classify::{
    classify, classify_body, classify_form, classify_query, classify_str, extract_fields,
    FieldMapping, FieldType, VolatileFields,
};
pub use config::ProbeConfig;
pub use curl::translate;
pub use dispatch::{
    BodyMode, DispatchAdapter, DispatchOptions, DispatchResponse, DispatchResult, Transport,
};
pub use error::{ConfigError, TransportError, UnknownMethod};
pub use http::{HttpMethod, HttpResponse, NormalizedRequest, OutboundRequest};
