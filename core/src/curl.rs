//! Translation of shell `curl` invocations into `NormalizedRequest` values.
//!
//! # Design
//! `translate` is a pure function over the command text. It runs a generic
//! argument parser first (POSIX shell tokenization via `shlex`), then
//! re-scans the raw text for the few things that must survive a failed
//! tokenization: the request body and the cookie flag. Malformed input never
//! produces an error; the result degrades towards an empty `GET` request.
//!
//! Precedence, in order of application:
//! 1. headers from `-H`, with `Set-Cookie` folded into `Cookie`;
//! 2. the `-b`/`--cookie` flag, which always overwrites `Cookie`;
//! 3. an explicit method, unless it is `GET` while a body is present.

use std::collections::BTreeMap;

use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::http::{HttpMethod, NormalizedRequest};

static LINE_CONTINUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\r?\n").expect("line continuation pattern is valid"));

/// Body flags re-scanned from the raw text, in priority order.
static BODY_FALLBACKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["--data-raw", "--data", "--data-binary"]
        .iter()
        .map(|flag| {
            Regex::new(&format!(r#"(?s){flag}\s+(?:'(.*?)'|"(.*?)")"#))
                .expect("body fallback pattern is valid")
        })
        .collect()
});

static DATA_FLAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"--data-raw|--data\b|--data-binary|(?:^|\s)-d(?:\s|['"]|$)"#)
        .expect("data flag pattern is valid")
});

static COOKIE_FLAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)(?:-b|--cookie)(?:\s+|=)(?:'([^']*)'|"([^"]*)"|(\S+))"#)
        .expect("cookie flag pattern is valid")
});

static COOKIE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:set-)?cookie\s*:").expect("cookie prefix pattern is valid"));

/// Translate a curl command line into a normalized request.
///
/// Never fails. Input without any recognizable flag yields
/// `GET ""` with no headers and no body.
pub fn translate(curl_text: &str) -> NormalizedRequest {
    let text = LINE_CONTINUATION.replace_all(curl_text, " ");
    let text = text.trim();

    let args = CurlArgs::parse(text);
    let body = args.body().or_else(|| fallback_body(text));
    let method = resolve_method(args.method.as_deref(), body.is_some(), text);

    let mut headers = BTreeMap::new();
    for (name, value) in &args.headers {
        insert_header(&mut headers, name, value.clone());
    }
    if let Some(user) = &args.user {
        if !has_header(&headers, "authorization") {
            let encoded = base64::engine::general_purpose::STANDARD.encode(user.as_bytes());
            headers.insert("Authorization".to_string(), format!("Basic {encoded}"));
        }
    }
    if args.json {
        if !has_header(&headers, "content-type") {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        if !has_header(&headers, "accept") {
            headers.insert("Accept".to_string(), "application/json".to_string());
        }
    }
    if let Some(cookie) = cookie_flag(text) {
        insert_header(&mut headers, "Cookie", cookie);
    }

    NormalizedRequest {
        method,
        url: args.url.unwrap_or_default(),
        headers,
        body,
    }
}

/// What a flag does to the request being rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Method,
    Head,
    Header,
    Data,
    Json,
    Cookie,
    User,
    UserAgent,
    Referer,
    Url,
    /// Takes a value that does not shape the request.
    Ignored,
    /// Boolean switch, takes no value.
    Switch,
}

impl Flag {
    fn lookup(name: &str) -> Flag {
        match name {
            "-X" | "--request" => Flag::Method,
            "-I" | "--head" => Flag::Head,
            "-H" | "--header" => Flag::Header,
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-ascii"
            | "--data-urlencode" => Flag::Data,
            "--json" => Flag::Json,
            "-b" | "--cookie" => Flag::Cookie,
            "-u" | "--user" => Flag::User,
            "-A" | "--user-agent" => Flag::UserAgent,
            "-e" | "--referer" => Flag::Referer,
            "--url" => Flag::Url,
            // Output and local files.
            "-o" | "--output" | "-c" | "--cookie-jar" | "-D" | "--dump-header" | "-w"
            | "--write-out" | "-K" | "--config" | "-T" | "--upload-file" | "--output-dir"
            | "--stderr" | "--trace" | "--trace-ascii" | "-F" | "--form" | "--form-string" => {
                Flag::Ignored
            }
            // Transfer control.
            "-m" | "--max-time" | "--connect-timeout" | "--retry" | "--retry-delay"
            | "--retry-max-time" | "--max-redirs" | "--limit-rate" | "-r" | "--range" | "-C"
            | "--continue-at" | "-Y" | "--speed-limit" | "-y" | "--speed-time" | "-z"
            | "--time-cond" | "--keepalive-time" | "--expect100-timeout" => Flag::Ignored,
            // Connection, proxy and TLS.
            "-x" | "--proxy" | "-U" | "--proxy-user" | "--noproxy" | "--proxy-header"
            | "--interface" | "--local-port" | "--resolve" | "--connect-to" | "--dns-servers"
            | "--unix-socket" | "--abstract-unix-socket" | "--cacert" | "--capath" | "--cert"
            | "-E" | "--cert-type" | "--key" | "--key-type" | "--pass" | "--ciphers"
            | "--tls-max" => Flag::Ignored,
            // Authentication schemes that need a round-trip to resolve.
            "--oauth2-bearer" | "--aws-sigv4" | "--delegation" | "--login-options" => {
                Flag::Ignored
            }
            _ => Flag::Switch,
        }
    }

    fn takes_value(self) -> bool {
        !matches!(self, Flag::Head | Flag::Switch)
    }
}

/// Result of the generic argument pass.
#[derive(Debug, Default)]
struct CurlArgs {
    url: Option<String>,
    method: Option<String>,
    headers: Vec<(String, String)>,
    data: Vec<String>,
    user: Option<String>,
    json: bool,
}

impl CurlArgs {
    fn parse(text: &str) -> CurlArgs {
        let tokens = shlex::split(text).unwrap_or_else(|| {
            debug!("curl text is not valid shell syntax, closing the open quote");
            shlex::split(&close_open_quote(text))
                .unwrap_or_else(|| text.split_whitespace().map(str::to_string).collect())
        });

        let mut args = CurlArgs::default();
        let mut iter = tokens.into_iter().peekable();
        if iter.peek().is_some_and(|t| t.eq_ignore_ascii_case("curl")) {
            iter.next();
        }

        'tokens: while let Some(token) = iter.next() {
            if !token.starts_with('-') || token == "-" {
                if args.url.is_none() {
                    args.url = Some(token);
                }
                continue;
            }

            for (name, attached) in split_flags(&token) {
                let flag = Flag::lookup(&name);
                let value = if flag.takes_value() {
                    match attached.or_else(|| iter.next()) {
                        Some(value) => value,
                        None => {
                            debug!(flag = %name, "flag is missing its value");
                            break 'tokens;
                        }
                    }
                } else {
                    String::new()
                };
                args.apply(flag, value);
            }
        }
        args
    }

    fn apply(&mut self, flag: Flag, value: String) {
        match flag {
            Flag::Method => self.method = Some(value),
            Flag::Head => self.method = Some("HEAD".to_string()),
            Flag::Header => match parse_header(&value) {
                Some(header) => self.headers.push(header),
                None => debug!(header = %value, "ignoring header without a name"),
            },
            Flag::Data => self.data.push(value),
            Flag::Json => {
                self.data.push(value);
                self.json = true;
            }
            Flag::Cookie => match strip_cookie_prefix(&value) {
                Some(cookie) => self.headers.push(("Cookie".to_string(), cookie)),
                None => debug!("ignoring empty cookie flag"),
            },
            Flag::User => self.user = Some(value),
            Flag::UserAgent => self.headers.push(("User-Agent".to_string(), value)),
            Flag::Referer => self.headers.push(("Referer".to_string(), value)),
            Flag::Url => self.url = Some(value),
            Flag::Ignored | Flag::Switch => {}
        }
    }

    /// Several data flags are joined with `&`, as curl does on the wire.
    fn body(&self) -> Option<String> {
        if self.data.is_empty() {
            None
        } else {
            Some(self.data.join("&"))
        }
    }
}

/// Expand a flag token into `(name, attached value)` pairs.
///
/// Handles `--flag=value`, attached short values such as `-XPUT`, and
/// bundled short options such as `-sSX`: letters are read as switches up
/// to the first one that takes a value, which owns the rest of the token.
fn split_flags(token: &str) -> Vec<(String, Option<String>)> {
    if let Some(long) = token.strip_prefix("--") {
        return vec![match long.split_once('=') {
            Some((name, value)) => (format!("--{name}"), Some(value.to_string())),
            None => (token.to_string(), None),
        }];
    }

    let mut flags = Vec::new();
    for (i, letter) in token.char_indices().skip(1) {
        let name = format!("-{letter}");
        if Flag::lookup(&name).takes_value() {
            let rest = &token[i + letter.len_utf8()..];
            flags.push((name, (!rest.is_empty()).then(|| rest.to_string())));
            break;
        }
        flags.push((name, None));
    }
    flags
}

/// Append the closing quote a truncated command is missing, and drop a
/// dangling escape, so the text tokenizes with quoting intact.
fn close_open_quote(text: &str) -> String {
    let mut open = None;
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match (open, c) {
            (Some('\''), '\'') => open = None,
            (Some('\''), _) => {}
            (_, '\\') => escaped = true,
            (None, '\'' | '"') => open = Some(c),
            (Some('"'), '"') => open = None,
            _ => {}
        }
    }

    let mut repaired = text.to_string();
    if escaped {
        repaired.pop();
    }
    if let Some(quote) = open {
        repaired.push(quote);
    }
    repaired
}

/// `Name: value` or curl's `Name;` for an empty value.
fn parse_header(raw: &str) -> Option<(String, String)> {
    let (name, value) = match raw.split_once(':') {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (raw.trim().strip_suffix(';')?.trim(), ""),
    };
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.to_string()))
}

/// Insert a header, folding `Set-Cookie` into `Cookie` and replacing any
/// earlier value stored under a differently-cased name.
fn insert_header(headers: &mut BTreeMap<String, String>, name: &str, value: String) {
    let name = if name.eq_ignore_ascii_case("set-cookie") || name.eq_ignore_ascii_case("cookie") {
        "Cookie"
    } else {
        name
    };
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}

fn has_header(headers: &BTreeMap<String, String>, name: &str) -> bool {
    headers.keys().any(|k| k.eq_ignore_ascii_case(name))
}

fn fallback_body(text: &str) -> Option<String> {
    BODY_FALLBACKS.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let body = caps.get(1).or_else(|| caps.get(2))?;
        debug!("recovered request body from raw curl text");
        Some(body.as_str().to_string())
    })
}

fn resolve_method(explicit: Option<&str>, has_body: bool, text: &str) -> HttpMethod {
    if let Some(raw) = explicit {
        match raw.parse::<HttpMethod>() {
            Ok(HttpMethod::Get) if has_body => {
                debug!("explicit GET carries a body, promoting to POST");
            }
            Ok(method) => return method,
            Err(err) => debug!(%err, "ignoring explicit method"),
        }
    }
    if has_body || DATA_FLAG.is_match(text) {
        HttpMethod::Post
    } else {
        HttpMethod::Get
    }
}

/// The cookie flag's value, found in the raw text.
fn cookie_flag(text: &str) -> Option<String> {
    let caps = COOKIE_FLAG.captures(text)?;
    let raw = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
    strip_cookie_prefix(raw.as_str())
}

/// Remove any `Cookie:`/`Set-Cookie:` prefix. Empty values yield `None`.
fn strip_cookie_prefix(raw: &str) -> Option<String> {
    let value = COOKIE_PREFIX.replace(raw, "");
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
