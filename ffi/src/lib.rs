//! C-ABI wrapper around `reqprobe-core`.
//!
//! # Overview
//! Exposes curl translation, field classification, dispatch preparation and
//! completion through `extern "C"` functions, so a host written in any language with a
//! C FFI can reuse the core without linking to serde or regex directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Structured results that C would struggle to walk (field mappings,
//!   dispatch results) cross as JSON strings.
//! - The host performs the HTTP round-trip itself: it asks
//!   `reqprobe_prepare` for the bytes to send, sends them, then hands the
//!   outcome to `reqprobe_complete`.
//! - The C caller owns all returned pointers and must call the matching
//!   `reqprobe_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::catch_unwind;

use reqprobe_core::{
    classify_body, classify_query, translate, DispatchAdapter, DispatchOptions, VolatileFields,
};

use types::*;

/// Borrow a C string as UTF-8. Null or invalid UTF-8 yields `None`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Hand a Rust string to C. Interior NULs yield null.
fn into_c_string(s: String) -> *mut c_char {
    CString::new(s).map_or(std::ptr::null_mut(), CString::into_raw)
}

fn to_json<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => into_c_string(json),
        Err(_) => std::ptr::null_mut(),
    }
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translate a curl command line.
///
/// Returns null if `curl_text` is null or not UTF-8.
/// The caller must free the returned pointer with `reqprobe_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn reqprobe_translate_curl(curl_text: *const c_char) -> *mut FfiNormalizedRequest {
    catch_unwind(|| {
        let Some(text) = (unsafe { read_str(curl_text) }) else {
            return std::ptr::null_mut();
        };
        FfiNormalizedRequest::from_core(translate(text))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Translate a curl command line into the JSON form of the normalized
/// request: `{"method","url","headers","body"}`.
///
/// The caller must free the returned string with `reqprobe_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn reqprobe_translate_curl_json(curl_text: *const c_char) -> *mut c_char {
    catch_unwind(|| {
        let Some(text) = (unsafe { read_str(curl_text) }) else {
            return std::ptr::null_mut();
        };
        to_json(&translate(text))
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify the fields of a request body, returned as a JSON object of
/// field path to type tag.
///
/// `content_type` may be null. A body that is neither form data nor valid
/// JSON yields `{}`.
#[unsafe(no_mangle)]
pub extern "C" fn reqprobe_classify_body(
    body: *const c_char,
    content_type: *const c_char,
) -> *mut c_char {
    catch_unwind(|| {
        let Some(body) = (unsafe { read_str(body) }) else {
            return std::ptr::null_mut();
        };
        let content_type = unsafe { read_str(content_type) };
        to_json(&classify_body(body, content_type, &VolatileFields::new()))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Classify the query-string parameters of `url` as a JSON object.
#[unsafe(no_mangle)]
pub extern "C" fn reqprobe_classify_query(url: *const c_char) -> *mut c_char {
    catch_unwind(|| {
        let Some(url) = (unsafe { read_str(url) }) else {
            return std::ptr::null_mut();
        };
        to_json(&classify_query(url))
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Build the request the host should send for `curl_text`, returned as JSON
/// `{"method","url","headers","body","error","errorKind"}`.
///
/// Form bodies are encoded and get a default `Content-Type`. When the request
/// must not be sent (no URL, or a body over the configured limit), `error`
/// holds the reason and `errorKind` the matching `FfiErrorKind` value;
/// otherwise both are null. A body that is not UTF-8 is rendered lossily.
#[unsafe(no_mangle)]
pub extern "C" fn reqprobe_prepare(curl_text: *const c_char) -> *mut c_char {
    catch_unwind(|| {
        let Some(text) = (unsafe { read_str(curl_text) }) else {
            return std::ptr::null_mut();
        };
        let adapter = DispatchAdapter::default();
        let outbound = adapter.prepare(&translate(text), &DispatchOptions::default());
        let error = adapter.check(&outbound).err();
        to_json(&serde_json::json!({
            "method": outbound.method,
            "url": outbound.url,
            "headers": outbound.headers,
            "body": outbound.body.as_deref().map(String::from_utf8_lossy),
            "error": error.as_ref().map(ToString::to_string),
            "errorKind": error.as_ref().map(|err| FfiErrorKind::from(err) as u32),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Fold the host's HTTP outcome for `curl_text` into a dispatch result,
/// returned as JSON `{"response","fieldMappings","queryMappings"}`.
///
/// A request that `reqprobe_prepare` rejected is reported as that failure
/// whatever the host passes in. Returns null if either argument is null.
#[unsafe(no_mangle)]
pub extern "C" fn reqprobe_complete(
    curl_text: *const c_char,
    response: *const FfiHttpResponse,
) -> *mut c_char {
    catch_unwind(|| {
        if response.is_null() {
            return std::ptr::null_mut();
        }
        let Some(text) = (unsafe { read_str(curl_text) }) else {
            return std::ptr::null_mut();
        };
        let adapter = DispatchAdapter::default();
        let options = DispatchOptions::default();
        let request = translate(text);
        let outbound = adapter.prepare(&request, &options);
        let size = outbound.body.as_ref().map_or(0, Vec::len);
        let limit = adapter.config().max_body_bytes;

        let resp = unsafe { &*response };
        let outcome = adapter
            .check(&outbound)
            .and_then(|()| unsafe { resp.to_outcome(size, limit) });
        to_json(&adapter.complete(&request, &options, outcome))
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiNormalizedRequest` returned by `reqprobe_translate_curl`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqprobe_free_request(req: *mut FfiNormalizedRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        if !req.url.is_null() {
            drop(unsafe { CString::from_raw(req.url) });
        }
        if !req.body.is_null() {
            drop(unsafe { CString::from_raw(req.body) });
        }
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                if !h.key.is_null() {
                    drop(unsafe { CString::from_raw(h.key) });
                }
                if !h.value.is_null() {
                    drop(unsafe { CString::from_raw(h.value) });
                }
            }
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqprobe_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
