//! Single outbound UDP transaction to the configured upstream resolver.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::TransportError;

/// Resolves one query over a transient, exclusive UDP endpoint.
///
/// Because the endpoint is bound fresh per transaction and `connect()`-ed to a single peer,
/// there is no need to correlate responses by transaction ID: the first (and only) datagram
/// received on it is the answer, by construction.
pub struct UdpTransport {
    upstream: SocketAddr,
}

impl UdpTransport {
    pub fn new(upstream: SocketAddr) -> UdpTransport {
        UdpTransport { upstream }
    }

    /// Sends `query` to the upstream and waits up to `deadline` for a reply.
    pub async fn resolve(&self, query: &[u8], deadline: Duration) -> Result<Vec<u8>, TransportError> {
        let bind_addr: SocketAddr = if self.upstream.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.upstream).await?;
        socket.send(query).await?;

        let mut buf = vec![0u8; 65535];
        let n = timeout(deadline, socket.recv(&mut buf))
            .await
            .map_err(|_| TransportError::Timeout)??;
        buf.truncate(n);
        Ok(buf)
    }
}
