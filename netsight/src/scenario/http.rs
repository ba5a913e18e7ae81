//! HTTP request/response cycle.

use serde::{Deserialize, Serialize};

use netsight_common::Category;
use netsight_sequencer::Step;

use super::{Outcome, Playbook, Scenario, StepDetail};
use crate::metrics::MetricSource;

/// Request method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Whether the request carries a body.
    pub fn has_request_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    /// Status code and reason phrase the demo server answers with.
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            HttpMethod::Post => (201, "Created"),
            HttpMethod::Delete | HttpMethod::Options => (204, "No Content"),
            HttpMethod::Get | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Head => {
                (200, "OK")
            }
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    /// Resource returned by the server.
    #[serde(default = "default_resource")]
    pub resource: serde_json::Value,
    #[serde(flatten)]
    pub playbook: Playbook,
}

fn default_resource() -> serde_json::Value {
    serde_json::json!({
        "id": 123,
        "name": "John Doe",
        "email": "john@example.com",
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub name: &'static str,
    pub value: String,
}

impl Header {
    fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Response received at the end of the cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResponse {
    pub method: HttpMethod,
    pub url: String,
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<Header>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Time from the first step to the response, at the configured speed.
    pub elapsed_ms: u64,
}

impl HttpResponse {
    /// Build the response the demo server sends for `method`.
    pub fn for_request(method: HttpMethod, url: &str, resource: &serde_json::Value) -> Self {
        let (status, reason) = method.status();
        let body = match status {
            204 => None,
            _ if method == HttpMethod::Head => None,
            _ => Some(resource.clone()),
        };
        let length = resource.to_string().len();

        let mut headers = vec![
            Header::new("Server", "nginx/1.18.0"),
            Header::new("X-Rate-Limit", "100"),
        ];
        match method {
            HttpMethod::Options => {
                headers.push(Header::new(
                    "Allow",
                    "GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS",
                ));
            }
            HttpMethod::Delete => {}
            _ => {
                headers.push(Header::new("Content-Type", "application/json"));
                headers.push(Header::new("Content-Length", length.to_string()));
                headers.push(Header::new("Cache-Control", "max-age=3600"));
            }
        }
        if method == HttpMethod::Post {
            headers.push(Header::new("Location", request_target(url)));
        }

        Self {
            method,
            url: url.to_string(),
            status,
            reason,
            headers,
            body,
            elapsed_ms: 0,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }
}

impl std::fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} -> HTTP/1.1 {} {} in {} ms",
            self.method, self.url, self.status, self.reason, self.elapsed_ms
        )?;
        for header in &self.headers {
            write!(f, "\n    {}: {}", header.name, header.value)?;
        }
        if let Some(body) = &self.body {
            write!(f, "\n    {body}")?;
        }
        Ok(())
    }
}

/// Path and query of a URL, `/` when it has none.
pub fn request_target(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.find('/').map_or("/", |index| &rest[index..])
}

/// Host part of a URL.
pub fn host(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest)
}

pub struct HttpScenario {
    config: HttpConfig,
    elapsed_ms: u64,
}

impl HttpScenario {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            elapsed_ms: 0,
        }
    }
}

impl Scenario for HttpScenario {
    fn category(&self) -> Category {
        Category::Http
    }

    fn playbook(&self) -> &Playbook {
        &self.config.playbook
    }

    fn begin(&mut self, _metrics: &mut dyn MetricSource) {
        self.elapsed_ms = 0;
    }

    fn on_step(
        &mut self,
        _phase: usize,
        step: &Step<StepDetail>,
        _metrics: &mut dyn MetricSource,
    ) -> Option<String> {
        self.elapsed_ms += step.duration.as_millis() as u64;
        let method = self.config.method;
        let url = &self.config.url;

        let detail = match step.id.as_str() {
            "dns-lookup" => format!("resolve {}", host(url)),
            "tls-handshake" if url.starts_with("http://") => "skipped (plain HTTP)".to_string(),
            "send-request" => {
                let mut line = format!("{method} {} HTTP/1.1", request_target(url));
                if method.has_request_body() {
                    line.push_str(" + JSON body");
                }
                line
            }
            "send-response" => {
                let (status, reason) = method.status();
                format!("HTTP/1.1 {status} {reason}")
            }
            _ => return Some(format!("t+{} ms", self.elapsed_ms)),
        };

        Some(format!("{detail}  t+{} ms", self.elapsed_ms))
    }

    fn outcome(&mut self, _metrics: &mut dyn MetricSource) -> Outcome {
        let mut response =
            HttpResponse::for_request(self.config.method, &self.config.url, &self.config.resource);
        response.elapsed_ms = self.elapsed_ms;
        Outcome::Http(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FixedMetrics;
    use crate::scenario::playbook;

    const URL: &str = "https://api.example.com/users/123";

    fn resource() -> serde_json::Value {
        default_resource()
    }

    #[test]
    fn test_url_parts() {
        assert_eq!(request_target(URL), "/users/123");
        assert_eq!(request_target("https://example.com"), "/");
        assert_eq!(request_target("example.com/a?b=1"), "/a?b=1");
        assert_eq!(host(URL), "api.example.com");
        assert_eq!(host("localhost"), "localhost");
    }

    #[test]
    fn test_get_response() {
        let response = HttpResponse::for_request(HttpMethod::Get, URL, &resource());

        assert_eq!((response.status, response.reason), (200, "OK"));
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.body.as_ref().and_then(|b| b["id"].as_u64()), Some(123));
    }

    #[test]
    fn test_response_per_method() {
        let post = HttpResponse::for_request(HttpMethod::Post, URL, &resource());
        assert_eq!(post.status, 201);
        assert_eq!(post.header("Location"), Some("/users/123"));

        let delete = HttpResponse::for_request(HttpMethod::Delete, URL, &resource());
        assert_eq!(delete.status, 204);
        assert!(delete.body.is_none());
        assert!(delete.header("Content-Type").is_none());

        let head = HttpResponse::for_request(HttpMethod::Head, URL, &resource());
        assert_eq!(head.status, 200);
        assert!(head.body.is_none());
        assert!(head.header("Content-Length").is_some());

        let options = HttpResponse::for_request(HttpMethod::Options, URL, &resource());
        assert!(options.header("Allow").is_some_and(|v| v.contains("PATCH")));
    }

    #[test]
    fn test_elapsed_accumulates() {
        let mut http = HttpScenario::new(HttpConfig {
            method: HttpMethod::Put,
            url: URL.to_string(),
            resource: resource(),
            playbook: playbook(&["dns-lookup", "send-request", "send-response"], 500),
        });
        let mut metrics = FixedMetrics::default();
        http.begin(&mut metrics);

        let steps = http.playbook().phases[0].to_steps(1.0);
        let lines: Vec<_> = steps
            .iter()
            .map(|step| http.on_step(0, step, &mut metrics))
            .collect();

        assert_eq!(lines[0].as_deref(), Some("resolve api.example.com  t+500 ms"));
        assert_eq!(
            lines[1].as_deref(),
            Some("PUT /users/123 HTTP/1.1 + JSON body  t+1000 ms")
        );

        let Outcome::Http(response) = http.outcome(&mut metrics) else {
            panic!("expected an HTTP outcome");
        };
        assert_eq!(response.elapsed_ms, 1500);
        assert_eq!(response.status, 200);
    }
}
