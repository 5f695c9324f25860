//! Single outbound DNS-over-HTTPS transaction (RFC 8484, GET form).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;

/// Resolves one query over a shared HTTPS session.
///
/// The session (`reqwest::blocking::Client`) is created once by the caller and shared across
/// every `DohTransport`, so TCP, TLS, and HTTP/2 connection state is pooled across queries. Each
/// `resolve()` call offloads the blocking request onto a worker thread via `spawn_blocking`,
/// keeping the single-threaded event loop free to service other forwarding tasks while the
/// request is in flight.
pub struct DohTransport {
    client: Arc<Client>,
    url: String,
}

impl DohTransport {
    pub fn new(client: Arc<Client>, url: String) -> DohTransport {
        DohTransport { client, url }
    }

    /// Encodes `query` per RFC 8484, issues the GET request, and returns the binary response
    /// body. The outgoing message's ID is overwritten with zero: DoH correlates by content, not
    /// by the UDP-style transaction ID, and zeroing it lets CDN-level caches share entries across
    /// clients that happened to pick different IDs for the same question.
    pub async fn resolve(
        &self,
        query: &[u8],
        deadline: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let mut wire = query.to_vec();
        if wire.len() >= 2 {
            wire[0] = 0;
            wire[1] = 0;
        }
        let request_url = format!("{}?dns={}", self.url, URL_SAFE_NO_PAD.encode(&wire));

        let client = Arc::clone(&self.client);
        let response = tokio::task::spawn_blocking(move || {
            client
                .get(&request_url)
                .timeout(deadline)
                .header("accept", "application/dns-message")
                .send()
        })
        .await
        .map_err(worker_panicked)??;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        let body = tokio::task::spawn_blocking(move || response.bytes())
            .await
            .map_err(worker_panicked)??;
        Ok(body.to_vec())
    }
}

fn worker_panicked(_: tokio::task::JoinError) -> TransportError {
    TransportError::Network(std::io::Error::other("doh worker thread panicked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroes_id_without_mutating_caller_buffer() {
        let query = [0xab, 0xcd, 0x01, 0x00];
        let mut wire = query.to_vec();
        wire[0] = 0;
        wire[1] = 0;
        assert_eq!(wire, [0x00, 0x00, 0x01, 0x00]);
        assert_eq!(query, [0xab, 0xcd, 0x01, 0x00]);
    }

    #[test]
    fn base64url_has_no_padding() {
        let wire = [0x00, 0x00, 0x01, 0x00, 0x00];
        let encoded = URL_SAFE_NO_PAD.encode(wire);
        assert!(!encoded.contains('='));
        assert_eq!(URL_SAFE_NO_PAD.decode(&encoded).unwrap(), wire);
    }
}
