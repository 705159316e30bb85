//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! enums with explicit discriminants. Conversion functions live here to keep
//! `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use reqprobe_core::{HttpMethod, HttpResponse, NormalizedRequest, TransportError};

use crate::read_str;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
    Head = 5,
    Options = 6,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Patch => FfiHttpMethod::Patch,
            HttpMethod::Delete => FfiHttpMethod::Delete,
            HttpMethod::Head => FfiHttpMethod::Head,
            HttpMethod::Options => FfiHttpMethod::Options,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// A translated curl command as C-compatible plain data.
///
/// `body` is null when the command carried no body. `url` is never null but
/// may be empty, meaning nothing usable was found.
#[repr(C)]
pub struct FfiNormalizedRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiNormalizedRequest {
    /// Convert a core `NormalizedRequest` into a heap-allocated
    /// `FfiNormalizedRequest`. Returns null if any string holds an interior
    /// NUL byte.
    pub(crate) fn from_core(req: NormalizedRequest) -> *mut Self {
        // Build every CString before handing out raw pointers, so a failure
        // midway frees what was already allocated.
        let Ok(url) = CString::new(req.url) else {
            return std::ptr::null_mut();
        };
        let body = match req.body.map(CString::new).transpose() {
            Ok(body) => body,
            Err(_) => return std::ptr::null_mut(),
        };
        let headers: Result<Vec<(CString, CString)>, _> = req
            .headers
            .into_iter()
            .map(|(k, v)| Ok::<_, std::ffi::NulError>((CString::new(k)?, CString::new(v)?)))
            .collect();
        let Ok(headers) = headers else {
            return std::ptr::null_mut();
        };

        let headers_len = headers.len() as u32;
        let headers = if headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: k.into_raw(),
                    value: v.into_raw(),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        let ffi_req = Box::new(FfiNormalizedRequest {
            method: req.method.into(),
            url: url.into_raw(),
            headers,
            headers_len,
            body: body.map_or(std::ptr::null_mut(), CString::into_raw),
        });
        Box::into_raw(ffi_req)
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// How the host's round-trip ended. `None` means a response arrived.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorKind {
    None = 0,
    BrokenPipe = 1,
    PayloadTooLarge = 2,
    Timeout = 3,
    InvalidRequest = 4,
    Network = 5,
}

impl From<&TransportError> for FfiErrorKind {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::BrokenPipe => FfiErrorKind::BrokenPipe,
            TransportError::PayloadTooLarge { .. } => FfiErrorKind::PayloadTooLarge,
            TransportError::Timeout => FfiErrorKind::Timeout,
            TransportError::InvalidRequest(_) => FfiErrorKind::InvalidRequest,
            TransportError::Network(_) => FfiErrorKind::Network,
        }
    }
}

/// The outcome of the host's HTTP round-trip.
///
/// The C caller constructs this on the stack and passes a pointer to
/// `reqprobe_complete`. When `error_kind` is not `None`, `error` may carry a
/// message and the response fields are ignored. A non-null `error` with
/// `error_kind == None` is read as a network failure. `body_limit` is only
/// read for `PayloadTooLarge`; 0 means the transport did not say.
///
/// The FFI layer reads but does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub headers: *const FfiHeader,
    pub headers_len: u32,
    pub body: *const c_char,
    pub error_kind: FfiErrorKind,
    pub error: *const c_char,
    pub body_limit: u64,
}

impl FfiHttpResponse {
    /// Rebuild the transport outcome. `size` is the length of the prepared
    /// body and `limit` the configured one, used when the host reports an
    /// oversized payload without its own limit.
    ///
    /// # Safety
    /// Every non-null pointer must be valid for reads; `headers` must point to
    /// `headers_len` entries.
    pub(crate) unsafe fn to_outcome(
        &self,
        size: usize,
        limit: usize,
    ) -> Result<HttpResponse, TransportError> {
        let message = unsafe { read_str(self.error) }.map(str::to_string);
        match (self.error_kind, message) {
            (FfiErrorKind::None, None) => {}
            (FfiErrorKind::None | FfiErrorKind::Network, message) => {
                return Err(TransportError::Network(message.unwrap_or_default()))
            }
            (FfiErrorKind::BrokenPipe, _) => return Err(TransportError::BrokenPipe),
            (FfiErrorKind::Timeout, _) => return Err(TransportError::Timeout),
            (FfiErrorKind::InvalidRequest, message) => {
                return Err(TransportError::InvalidRequest(message.unwrap_or_default()))
            }
            (FfiErrorKind::PayloadTooLarge, _) => {
                let limit = match usize::try_from(self.body_limit) {
                    Ok(0) | Err(_) => limit,
                    Ok(reported) => reported,
                };
                return Err(TransportError::PayloadTooLarge { size, limit });
            }
        }

        let headers = if self.headers.is_null() {
            &[][..]
        } else {
            unsafe { std::slice::from_raw_parts(self.headers, self.headers_len as usize) }
        };
        let headers = headers
            .iter()
            .filter_map(|h| {
                let key = unsafe { read_str(h.key) }?;
                let value = unsafe { read_str(h.value) }?;
                Some((key.to_string(), value.to_string()))
            })
            .collect();

        Ok(HttpResponse {
            status: self.status,
            headers,
            body: unsafe { read_str(self.body) }.unwrap_or("").to_string(),
        })
    }
}
