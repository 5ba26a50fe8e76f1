//! HTTP transport to the NeuralLog ingestion server
//!
//! A single record is posted to `{server}/logs/{log_name}`; several records go
//! to `{server}/logs/{log_name}/batch` as a JSON array. Outside the `default`
//! namespace both paths are prefixed with `/{namespace}`. Names are
//! percent-encoded as single path segments.

use crate::core::{
    EffectiveConfig, LogRecord, NeuralLogError, Result, Transport, TransportFactory,
    DEFAULT_NAMESPACE,
};
use flate2::{write::GzEncoder, Compression};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Url;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Request timeout unless configured otherwise
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Client-side settings not covered by [`EffectiveConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpOptions {
    pub timeout: Duration,
    /// Compress request bodies with gzip
    pub gzip: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT,
            gzip: false,
        }
    }
}

/// Posts records as JSON with the configured headers
///
/// # Example
///
/// ```no_run
/// use neurallog::prelude::*;
/// use neurallog::transports::HttpTransport;
/// use std::sync::Arc;
///
/// let config = EffectiveConfig::builder()
///     .server_url("http://logs.internal:3030")
///     .header("Authorization", "Bearer token")
///     .build();
/// let transport = HttpTransport::new(&config).expect("valid headers");
/// let dispatcher = Dispatcher::builder("checkout", Arc::new(transport))
///     .config(Arc::new(config))
///     .build()
///     .expect("dispatcher");
/// dispatcher.info("order placed");
/// ```
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    server_url: Url,
    headers: HeaderMap,
    gzip: bool,
}

impl HttpTransport {
    pub fn new(config: &EffectiveConfig) -> Result<Self> {
        Self::with_options(config, HttpOptions::default())
    }

    pub fn with_options(config: &EffectiveConfig, options: HttpOptions) -> Result<Self> {
        let server_url = Url::parse(config.server_url())
            .map_err(|e| NeuralLogError::config("HttpTransport", format!("server URL '{}': {}", config.server_url(), e)))?;
        if server_url.cannot_be_a_base() {
            return Err(NeuralLogError::config(
                "HttpTransport",
                format!("server URL '{}' cannot carry a path", server_url),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .build()?;

        let mut headers = HeaderMap::new();
        for (name, value) in config.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NeuralLogError::config("HttpTransport", format!("header '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| NeuralLogError::config("HttpTransport", format!("header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if options.gzip {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }

        Ok(Self {
            client,
            server_url,
            headers,
            gzip: options.gzip,
        })
    }

    /// URL for a delivery of one (`batch == false`) or several records
    pub fn endpoint(&self, log_name: &str, namespace: &str, batch: bool) -> Result<Url> {
        let mut url = self.server_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                NeuralLogError::config("HttpTransport", format!("server URL '{}' cannot carry a path", self.server_url))
            })?;
            segments.pop_if_empty();
            if !namespace.is_empty() && namespace != DEFAULT_NAMESPACE {
                segments.push(namespace);
            }
            segments.push("logs").push(log_name);
            if batch {
                segments.push("batch");
            }
        }
        Ok(url)
    }

    fn compress(body: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body)?;
        encoder.finish()
    }
}

impl Transport for HttpTransport {
    fn send(&self, log_name: &str, entries: &[LogRecord], namespace: &str) -> Result<()> {
        let (url, body) = match entries {
            [] => return Ok(()),
            [single] => (self.endpoint(log_name, namespace, false)?, serde_json::to_vec(single)?),
            many => (self.endpoint(log_name, namespace, true)?, serde_json::to_vec(many)?),
        };
        let body = if self.gzip { Self::compress(&body)? } else { body };

        let response = self
            .client
            .post(url.clone())
            .headers(self.headers.clone())
            .body(body)
            .send()
            .map_err(|e| NeuralLogError::dispatch(log_name, entries.len(), format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NeuralLogError::dispatch(
                log_name,
                entries.len(),
                format!("HTTP {} from {}", response.status(), url),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Builds one [`HttpTransport`] per dispatcher
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransportFactory {
    pub options: HttpOptions,
}

impl HttpTransportFactory {
    pub fn new(options: HttpOptions) -> Self {
        Self { options }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn create(&self, config: &EffectiveConfig) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(HttpTransport::with_options(config, self.options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConfigOverrides, LogLevel};
    use flate2::read::GzDecoder;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::io::Read;

    fn transport_for(server: &Server, options: HttpOptions) -> HttpTransport {
        let config = ConfigOverrides::new()
            .server_url(format!("{}/", server.url()))
            .header("X-Api-Key", "secret")
            .build();
        HttpTransport::with_options(&config, options).unwrap()
    }

    #[test]
    fn test_endpoints() {
        let config = ConfigOverrides::new().server_url("http://logs:3030").build();
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(
            transport.endpoint("svc", "default", false).unwrap().as_str(),
            "http://logs:3030/logs/svc"
        );
        assert_eq!(
            transport.endpoint("svc", "prod", true).unwrap().as_str(),
            "http://logs:3030/prod/logs/svc/batch"
        );
    }

    #[test]
    fn test_endpoint_encodes_names() {
        let config = ConfigOverrides::new().server_url("http://logs:3030/ingest/").build();
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(
            transport.endpoint("a/b?c#d", "team/x", false).unwrap().as_str(),
            "http://logs:3030/ingest/team%2Fx/logs/a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn test_name_with_slash_posted_to_single_segment() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/logs/billing%2Finvoices")
            .with_status(200)
            .create();

        let transport = transport_for(&server, HttpOptions::default());
        let record = LogRecord::new("billing/invoices", LogLevel::Info, "sent");
        transport.send("billing/invoices", &[record], "default").unwrap();

        mock.assert();
    }

    #[test]
    fn test_invalid_server_url_rejected() {
        let config = ConfigOverrides::new().server_url("not a url").build();
        assert!(matches!(
            HttpTransport::new(&config),
            Err(NeuralLogError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_single_record_posted_as_object() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/logs/svc")
            .match_header("X-Api-Key", "secret")
            .match_header("Content-Type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "level": "ERROR",
                "message": "bad",
                "logName": "svc"
            })))
            .with_status(201)
            .create();

        let transport = transport_for(&server, HttpOptions::default());
        let record = LogRecord::new("svc", LogLevel::Error, "bad");
        transport.send("svc", &[record], "default").unwrap();

        mock.assert();
    }

    #[test]
    fn test_batch_posted_as_array_under_namespace() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/prod/logs/svc/batch")
            .match_body(Matcher::Regex(r#"^\[\{.*\},\{.*\}\]$"#.to_string()))
            .with_status(200)
            .create();

        let transport = transport_for(&server, HttpOptions::default());
        let records = vec![
            LogRecord::new("svc", LogLevel::Info, "one"),
            LogRecord::new("svc", LogLevel::Info, "two"),
        ];
        transport.send("svc", &records, "prod").unwrap();

        mock.assert();
    }

    #[test]
    fn test_non_success_status_is_dispatch_error() {
        let mut server = Server::new();
        let _mock = server.mock("POST", "/logs/svc").with_status(503).create();

        let transport = transport_for(&server, HttpOptions::default());
        let err = transport
            .send("svc", &[LogRecord::new("svc", LogLevel::Warn, "x")], "default")
            .unwrap_err();

        match err {
            NeuralLogError::Dispatch { count, message, .. } => {
                assert_eq!(count, 1);
                assert!(message.contains("503"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_gzip_body() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/logs/svc")
            .match_header("Content-Encoding", "gzip")
            .match_request(|request| {
                let mut decoded = String::new();
                let body = request.body().expect("body");
                GzDecoder::new(body.as_slice())
                    .read_to_string(&mut decoded)
                    .is_ok()
                    && decoded.contains("\"message\":\"zipped\"")
            })
            .with_status(200)
            .create();

        let transport = transport_for(
            &server,
            HttpOptions {
                gzip: true,
                ..HttpOptions::default()
            },
        );
        transport
            .send("svc", &[LogRecord::new("svc", LogLevel::Info, "zipped")], "default")
            .unwrap();

        mock.assert();
    }

    #[test]
    fn test_invalid_header_rejected() {
        let config = ConfigOverrides::new().header("bad header", "x").build();
        assert!(matches!(
            HttpTransport::new(&config),
            Err(NeuralLogError::InvalidConfiguration { .. })
        ));
    }
}
