use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::utils::parse_headers_with_escapes;

/// Configuration for building the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout covering connect, send and response headers.
    pub request_timeout: Duration,
    pub skip_tls_verify: bool,
    pub resolve_target_addr: Option<String>,
    pub custom_headers: Option<String>,
    /// Maximum idle connections to keep per host.
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            skip_tls_verify: false,
            resolve_target_addr: None,
            custom_headers: None,
            max_idle_per_host: 64,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Result of building the client, includes parsed headers for logging.
pub struct ClientBuildResult {
    pub client: reqwest::Client,
    pub parsed_headers: HeaderMap,
}

/// Builds a reqwest HTTP client with the specified configuration.
pub fn build_client(
    config: &ClientConfig,
) -> Result<ClientBuildResult, Box<dyn std::error::Error + Send + Sync>> {
    let mut client_builder = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(config.idle_timeout);

    if let Some(ref resolve_str) = config.resolve_target_addr {
        if !resolve_str.is_empty() {
            client_builder = configure_dns_override(client_builder, resolve_str)?;
        } else {
            warn!("RESOLVE_TARGET_ADDR is set but empty, no DNS override will be applied");
        }
    }

    let parsed_headers = configure_custom_headers(config.custom_headers.as_deref())?;
    if !parsed_headers.is_empty() {
        client_builder = client_builder.default_headers(parsed_headers.clone());
        info!(count = parsed_headers.len(), "Configured custom default headers");
    }

    let client = if config.skip_tls_verify {
        warn!("Skipping TLS certificate verification");
        client_builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?
    } else {
        client_builder.build()?
    };

    Ok(ClientBuildResult {
        client,
        parsed_headers,
    })
}

fn configure_dns_override(
    client_builder: reqwest::ClientBuilder,
    resolve_str: &str,
) -> Result<reqwest::ClientBuilder, Box<dyn std::error::Error + Send + Sync>> {
    let parts: Vec<&str> = resolve_str.split(':').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!(
            "RESOLVE_TARGET_ADDR ('{}') is not in the expected format 'hostname:ip:port'",
            resolve_str
        )
        .into());
    }

    let (hostname, ip, port_str) = (parts[0], parts[1], parts[2]);
    for (part, name) in [(hostname, "hostname"), (ip, "IP address"), (port_str, "port")] {
        if part.is_empty() {
            return Err(format!(
                "RESOLVE_TARGET_ADDR: {} part cannot be empty. Format: 'hostname:ip:port'",
                name
            )
            .into());
        }
    }

    let port: u16 = port_str.parse().map_err(|e| {
        format!(
            "Failed to parse port '{}' in RESOLVE_TARGET_ADDR: {}",
            port_str, e
        )
    })?;

    let socket_addr: SocketAddr = format!("{}:{}", ip, port).parse().map_err(|e| {
        format!(
            "Failed to parse '{}:{}' as a socket address for RESOLVE_TARGET_ADDR: {}",
            ip, port, e
        )
    })?;

    info!(hostname = hostname, addr = %socket_addr, "Configured DNS override");
    Ok(client_builder.resolve(hostname, socket_addr))
}

/// Parses `Name:Value` pairs separated by commas (`\,` for a literal comma).
pub fn configure_custom_headers(
    custom_headers_str: Option<&str>,
) -> Result<HeaderMap, Box<dyn std::error::Error + Send + Sync>> {
    let mut parsed_headers = HeaderMap::new();

    let headers_str = match custom_headers_str {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(parsed_headers),
    };

    for header_pair_str in parse_headers_with_escapes(headers_str) {
        let pair = header_pair_str.trim();
        if pair.is_empty() {
            continue;
        }

        let (name_str, value_str) = match pair.split_once(':') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => {
                return Err(format!(
                    "Invalid header format in CUSTOM_HEADERS: '{}'. Expected 'Name:Value'.",
                    pair
                )
                .into())
            }
        };

        if name_str.is_empty() {
            return Err(format!(
                "Invalid header format: Header name cannot be empty in '{}'.",
                pair
            )
            .into());
        }

        let header_name = HeaderName::from_str(name_str)
            .map_err(|e| format!("Invalid header name: {}. Name: '{}'", e, name_str))?;
        let header_value = HeaderValue::from_str(value_str).map_err(|e| {
            format!(
                "Invalid header value for '{}': {}. Value: '{}'",
                name_str, e, value_str
            )
        })?;

        parsed_headers.insert(header_name, header_value);
    }

    Ok(parsed_headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let result = build_client(&ClientConfig::default()).unwrap();
        assert!(result.parsed_headers.is_empty());
    }

    #[test]
    fn custom_headers_are_parsed() {
        let headers =
            configure_custom_headers(Some("X-Load-Test:orders,Accept:text/plain\\,application/json"))
                .unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["x-load-test"], "orders");
        assert_eq!(headers["accept"], "text/plain,application/json");
    }

    #[test]
    fn header_without_colon_is_rejected() {
        let err = configure_custom_headers(Some("NoColonHere")).unwrap_err();
        assert!(err.to_string().contains("Expected 'Name:Value'"));
    }

    #[test]
    fn empty_header_string_yields_no_headers() {
        assert!(configure_custom_headers(Some("  ")).unwrap().is_empty());
        assert!(configure_custom_headers(None).unwrap().is_empty());
    }

    #[test]
    fn dns_override_accepts_valid_triple() {
        let config = ClientConfig {
            resolve_target_addr: Some("orders.internal:127.0.0.1:8081".to_string()),
            ..ClientConfig::default()
        };
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn dns_override_rejects_bad_format() {
        for bad in ["orders.internal:127.0.0.1", ":127.0.0.1:80", "host:ip:80", "host:127.0.0.1:port"] {
            let config = ClientConfig {
                resolve_target_addr: Some(bad.to_string()),
                ..ClientConfig::default()
            };
            assert!(build_client(&config).is_err(), "accepted '{}'", bad);
        }
    }
}
