//! UDP accept loop: binds the listening socket, spawns one task per inbound datagram, and
//! tears everything down on Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinSet;

use crate::error::BindError;
use crate::forwarder::Forwarder;

/// Maximum size of an inbound UDP datagram we'll accept. Matches the common EDNS(0) buffer
/// advertisement ceiling; larger datagrams can't happen over UDP in practice.
const MAX_DATAGRAM: usize = 4096;

pub struct Listener {
    socket: Arc<UdpSocket>,
    forwarder: Arc<Forwarder>,
}

impl Listener {
    /// Binds `addr`, returning a `BindError` if the socket cannot be created.
    pub async fn bind(addr: SocketAddr, forwarder: Forwarder) -> Result<Listener, BindError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| BindError { addr, source })?;
        log::info!("listening on {}", addr);
        Ok(Listener {
            socket: Arc::new(socket),
            forwarder: Arc::new(forwarder),
        })
    }

    /// Runs the accept loop until Ctrl-C is received, then waits for in-flight forwarding
    /// tasks to finish (or be cancelled, since `JoinSet::shutdown` aborts them).
    pub async fn serve(&self) {
        let mut tasks = JoinSet::new();
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, peer)) => {
                            let datagram = buf[..n].to_vec();
                            let socket = Arc::clone(&self.socket);
                            let forwarder = Arc::clone(&self.forwarder);
                            tasks.spawn(async move {
                                handle_datagram(socket, forwarder, peer, datagram).await;
                            });
                        }
                        Err(err) => {
                            log::warn!("recv_from failed: {}", err);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("received shutdown signal, draining in-flight queries");
                    break;
                }
            }
        }

        tasks.shutdown().await;
    }
}

async fn handle_datagram(
    socket: Arc<UdpSocket>,
    forwarder: Arc<Forwarder>,
    peer: SocketAddr,
    datagram: Vec<u8>,
) {
    let Some((reply, summary)) = forwarder.forward(&datagram).await else {
        return;
    };
    if let Some(summary) = summary {
        summary.emit();
    }
    if let Err(err) = socket.send_to(&reply, peer).await {
        log::warn!("failed to reply to {}: {}", peer, err);
    }
}
