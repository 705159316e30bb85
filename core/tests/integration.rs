//! End-to-end dispatch against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives curl commands through
//! `DispatchAdapter` with a `ureq`-backed `Transport`. Validates that the
//! translated request reaches the server intact and that mappings are built
//! from the request, not the response.

use std::net::SocketAddr;

use reqprobe_core::{
    BodyMode, DispatchAdapter, DispatchOptions, FieldType, HttpMethod, HttpResponse,
    OutboundRequest, ProbeConfig, Transport, TransportError,
};

/// Executes requests with ureq.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses come back as data and the adapter decides what they mean.
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn send(&self, req: &OutboundRequest) -> Result<HttpResponse, TransportError> {
        let url = req.url.as_str();
        let result = match req.method {
            HttpMethod::Get | HttpMethod::Head | HttpMethod::Delete | HttpMethod::Options => {
                let mut builder = match req.method {
                    HttpMethod::Get => self.agent.get(url),
                    HttpMethod::Head => self.agent.head(url),
                    HttpMethod::Delete => self.agent.delete(url),
                    _ => self.agent.options(url),
                };
                for (name, value) in &req.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
                let mut builder = match req.method {
                    HttpMethod::Post => self.agent.post(url),
                    HttpMethod::Put => self.agent.put(url),
                    _ => self.agent.patch(url),
                };
                for (name, value) in &req.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match &req.body {
                    Some(body) => builder.send(body.as_slice()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(|err| match err {
            ureq::Error::Io(io) => TransportError::from(io),
            ureq::Error::Timeout(_) => TransportError::Timeout,
            other => TransportError::Network(other.to_string()),
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or("").to_string(),
                )
            })
            .collect();
        let body = response.body_mut().read_to_string().unwrap_or_default();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn echo_body(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap()
}

#[test]
fn json_post_round_trip() {
    let addr = start_server();
    let adapter = DispatchAdapter::default();
    let transport = UreqTransport::new();

    let curl = format!(
        r#"curl 'http://{addr}/api/echo' -H 'Content-Type: application/json' -d '{{"level":5}}'"#
    );
    let result = adapter.dispatch_curl(&transport, &curl, &DispatchOptions::default());

    assert_eq!(result.response.status, "200");
    let echo = echo_body(&result.response.body);
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["body"], r#"{"level":5}"#);
    assert_eq!(echo["headers"]["content-type"], "application/json");

    assert_eq!(result.field_mappings.len(), 1);
    assert_eq!(result.field_mappings["level"], FieldType::Number);
    // The response carries a server-generated id; it must not leak into the
    // request mappings.
    assert!(!result.field_mappings.contains_key("id"));
}

#[test]
fn query_parameters_are_mapped() {
    let addr = start_server();
    let adapter = DispatchAdapter::default();
    let transport = UreqTransport::new();

    let curl = format!("curl 'http://{addr}/api/echo?email=a%40b.io&since=2024-01-05&limit=10'");
    let result = adapter.dispatch_curl(&transport, &curl, &DispatchOptions::default());

    assert_eq!(result.response.status_code, Some(200));
    assert_eq!(echo_body(&result.response.body)["method"], "GET");
    assert!(result.field_mappings.is_empty());
    assert_eq!(result.query_mappings["email"], FieldType::Email);
    assert_eq!(result.query_mappings["since"], FieldType::DateYyyyMmDd);
    assert_eq!(result.query_mappings["limit"], FieldType::Number);
}

#[test]
fn form_body_is_encoded_on_the_wire() {
    let addr = start_server();
    let adapter = DispatchAdapter::default();
    let transport = UreqTransport::new();

    let curl = format!("curl -X PUT http://{addr}/api/echo -d 'name=Ada Lovelace&cur=GBP'");
    let options = DispatchOptions {
        body_mode: Some(BodyMode::Form),
        ..Default::default()
    };
    let result = adapter.dispatch_curl(&transport, &curl, &options);

    let echo = echo_body(&result.response.body);
    assert_eq!(echo["method"], "PUT");
    assert_eq!(echo["body"], "name=Ada+Lovelace&cur=GBP");
    assert_eq!(echo["headers"]["content-type"], "application/x-www-form-urlencoded");
    assert_eq!(result.field_mappings["form.name"], FieldType::String);
    assert_eq!(result.field_mappings["form.cur"], FieldType::Currency);
}

#[test]
fn cookie_flag_reaches_the_server() {
    let addr = start_server();
    let adapter = DispatchAdapter::default();
    let transport = UreqTransport::new();

    let curl = format!("curl http://{addr}/api/echo -H 'Set-Cookie: stale=1' -b 'foo=bar'");
    let result = adapter.dispatch_curl(&transport, &curl, &DispatchOptions::default());

    let echo = echo_body(&result.response.body);
    assert_eq!(echo["headers"]["cookie"], "foo=bar");
    assert!(echo["headers"].get("set-cookie").is_none());
}

#[test]
fn error_status_has_no_mappings() {
    let addr = start_server();
    let adapter = DispatchAdapter::default();
    let transport = UreqTransport::new();

    let curl = format!("curl 'http://{addr}/api/status/404?debug=true'");
    let result = adapter.dispatch_curl(&transport, &curl, &DispatchOptions::default());

    assert_eq!(result.response.status, "404");
    assert!(result.field_mappings.is_empty());
    assert!(result.query_mappings.is_empty());
}

#[test]
fn server_side_size_limit_surfaces_as_status() {
    let addr = start_server();
    let adapter = DispatchAdapter::new(ProbeConfig::default());
    let transport = UreqTransport::new();

    let body = "x".repeat(mock_server::MAX_BODY_BYTES + 1);
    let curl = format!("curl http://{addr}/api/echo --data-raw '{body}'");
    let result = adapter.dispatch_curl(&transport, &curl, &DispatchOptions::default());

    // The server may answer 413 or hang up mid-upload; both must come back
    // as a response-shaped value.
    assert!(matches!(result.response.status_code, Some(413) | None));
    assert!(!result.response.status.is_empty());
    assert!(result.field_mappings.is_empty());
}

#[test]
fn refused_connection_becomes_failure_status() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let adapter = DispatchAdapter::default();
    let transport = UreqTransport::new();

    let curl = format!(r#"curl http://{addr}/api/echo -d '{{"a":1}}'"#);
    let result = adapter.dispatch_curl(&transport, &curl, &DispatchOptions::default());

    assert_eq!(result.response.status_code, None);
    assert!(!result.response.status.is_empty());
    assert!(result.response.body.is_empty());
    assert!(result.field_mappings.is_empty());
}
