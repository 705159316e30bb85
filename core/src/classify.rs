//! Semantic field classification for request bodies and query strings.
//!
//! # Design
//! A value is run through an ordered cascade of `(FieldType, predicate)`
//! pairs and the first match wins. Several predicates accept the same
//! strings (`"USD"` is a plausible word and a currency code), so the order of
//! `CASCADE` is part of the contract and must not be rearranged.
//!
//! Field paths use dot notation for object keys and `[i]` for array
//! indices, with no leading separator at the root: `user.addresses[0].city`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Semantic type of a leaf value, used to pick a test assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Email,
    Url,
    FtpUrl,
    Phone,
    Number,
    Boolean,
    Currency,
    DateYyyyMmDd,
    String,
    /// Flagged by the caller as non-deterministic; no assertion is generated.
    #[serde(rename = "do-not-test")]
    DoNotTest,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::FtpUrl => "ftp_url",
            FieldType::Phone => "phone",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Currency => "currency",
            FieldType::DateYyyyMmDd => "date_yyyy_mm_dd",
            FieldType::String => "string",
            FieldType::DoNotTest => "do-not-test",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field path to semantic type.
pub type FieldMapping = BTreeMap<String, FieldType>;

/// Field paths the caller knows to be volatile, such as server-generated ids.
///
/// A flagged path also covers everything beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolatileFields(BTreeSet<String>);

impl VolatileFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>) {
        self.0.insert(path.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn covers(&self, path: &str) -> bool {
        self.0.iter().any(|flagged| {
            path == flagged
                || path
                    .strip_prefix(flagged.as_str())
                    .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
        })
    }
}

impl<S: Into<String>> FromIterator<S> for VolatileFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("classifier pattern is valid")
}

static BOOLEAN: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)^(true|false)$"));
static NUMBER: Lazy<Regex> = Lazy::new(|| pattern(r"^-?[0-9]+(\.[0-9]+)?$"));
static EMAIL: Lazy<Regex> = Lazy::new(|| pattern(r"^[^\s@]+@[^\s@]+\.[^\s@]+$"));
static HTTP_URL: Lazy<Regex> = Lazy::new(|| pattern(r"^https?://\S+$"));
static FTP_URL: Lazy<Regex> = Lazy::new(|| pattern(r"^ftp://\S+$"));
static PHONE: Lazy<Regex> = Lazy::new(|| pattern(r"^\+?[0-9 ()\-]{7,20}$"));
static CURRENCY: Lazy<Regex> = Lazy::new(|| pattern(r"^[A-Z]{3}$"));
static DATE: Lazy<Regex> = Lazy::new(|| pattern(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$"));

type Predicate = fn(&str) -> bool;

const CASCADE: &[(FieldType, Predicate)] = &[
    (FieldType::Boolean, is_boolean),
    (FieldType::Number, is_number),
    (FieldType::Email, is_email),
    (FieldType::Url, is_http_url),
    (FieldType::FtpUrl, is_ftp_url),
    (FieldType::Phone, is_phone),
    (FieldType::Currency, is_currency),
    (FieldType::DateYyyyMmDd, is_date),
];

fn is_boolean(s: &str) -> bool {
    BOOLEAN.is_match(s)
}

fn is_number(s: &str) -> bool {
    NUMBER.is_match(s)
}

fn is_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

fn is_http_url(s: &str) -> bool {
    HTTP_URL.is_match(s)
}

fn is_ftp_url(s: &str) -> bool {
    FTP_URL.is_match(s)
}

// An ISO date is also a run of digits and hyphens.
fn is_phone(s: &str) -> bool {
    PHONE.is_match(s) && !DATE.is_match(s)
}

fn is_currency(s: &str) -> bool {
    CURRENCY.is_match(s)
}

fn is_date(s: &str) -> bool {
    DATE.is_match(s)
}

/// Classify a string value.
pub fn classify_str(value: &str) -> FieldType {
    CASCADE
        .iter()
        .find(|(_, predicate)| predicate(value))
        .map(|(field_type, _)| *field_type)
        .unwrap_or(FieldType::String)
}

/// Classify a JSON value. Native booleans and numbers short-circuit the
/// cascade; `null`, arrays and objects are `string`.
pub fn classify(value: &Value) -> FieldType {
    match value {
        Value::Bool(_) => FieldType::Boolean,
        Value::Number(_) => FieldType::Number,
        Value::String(s) => classify_str(s),
        Value::Null | Value::Array(_) | Value::Object(_) => FieldType::String,
    }
}

/// Walk a JSON tree and classify every leaf.
///
/// A scalar root is recorded under the empty path.
pub fn extract_fields(tree: &Value, volatile: &VolatileFields) -> FieldMapping {
    let mut fields = FieldMapping::new();
    walk(tree, String::new(), volatile, &mut fields);
    fields
}

fn walk(value: &Value, path: String, volatile: &VolatileFields, out: &mut FieldMapping) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                walk(child, child_path, volatile, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk(child, format!("{path}[{i}]"), volatile, out);
            }
        }
        leaf => {
            let field_type = if volatile.covers(&path) {
                FieldType::DoNotTest
            } else {
                classify(leaf)
            };
            out.insert(path, field_type);
        }
    }
}

/// Classify flat form entries under `form.<key>`. Later duplicates win.
pub fn classify_form<I, K, V>(entries: I, volatile: &VolatileFields) -> FieldMapping
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    entries
        .into_iter()
        .map(|(key, value)| {
            let path = format!("form.{}", key.as_ref());
            let field_type = if volatile.covers(&path) {
                FieldType::DoNotTest
            } else {
                classify_str(value.as_ref())
            };
            (path, field_type)
        })
        .collect()
}

/// Classify every query-string parameter of `url`, keyed by parameter name.
///
/// Only the text between the first `?` and any `#` is read, so templated
/// URLs such as `{{base}}/search?q=x` work.
pub fn classify_query(url: &str) -> FieldMapping {
    let Some((_, query)) = url.split_once('?') else {
        return FieldMapping::new();
    };
    let query = query.split_once('#').map_or(query, |(q, _)| q);
    parse_form(query)
        .into_iter()
        .map(|(key, value)| (key, classify_str(&value)))
        .collect()
}

/// Classify a raw request body, choosing form or JSON decoding from the
/// content type. An unparseable JSON body yields no fields.
pub fn classify_body(
    body: &str,
    content_type: Option<&str>,
    volatile: &VolatileFields,
) -> FieldMapping {
    if content_type.is_some_and(is_form_urlencoded) {
        return classify_form(parse_form(body), volatile);
    }
    match serde_json::from_str::<Value>(body) {
        Ok(tree) => extract_fields(&tree, volatile),
        Err(err) => {
            debug!(%err, "request body is not JSON, no fields extracted");
            FieldMapping::new()
        }
    }
}

/// Decode `application/x-www-form-urlencoded` text into key/value pairs.
pub fn parse_form(text: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(text.as_bytes())
        .into_owned()
        .collect()
}

pub fn is_form_urlencoded(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains("application/x-www-form-urlencoded")
}
