//! Retry and transport-selection policy for a single inbound query.

use std::time::{Duration, Instant};

use crate::error::TransportError;
use crate::summary::Summary;
use crate::transport::{DohTransport, UdpTransport};
use crate::wire::Message;

/// Number of upstream attempts made before giving up on a query.
const ATTEMPTS: u32 = 3;
/// Per-attempt deadline: how long a single UDP send/recv or DoH request is allowed to take.
const ATTEMPT_DEADLINE: Duration = Duration::from_secs(3);
/// Delay before retrying after a DoH `Network` failure, to avoid hammering a resolver that is
/// already struggling.
const DOH_NETWORK_BACKOFF: Duration = Duration::from_secs(1);

/// Which upstream transport a `Forwarder` speaks.
pub enum Transport {
    Udp(UdpTransport),
    Doh(DohTransport),
}

/// Orchestrates one query's round trip to the upstream resolver, including retries.
pub struct Forwarder {
    transport: Transport,
    /// Extra delay injected once at task entry, before the first attempt, for exercising
    /// concurrency by hand.
    debug_delay: Option<Duration>,
}

impl Forwarder {
    pub fn new(transport: Transport, debug_delay: Option<Duration>) -> Forwarder {
        Forwarder {
            transport,
            debug_delay,
        }
    }

    /// Forwards `query` upstream with retries and returns the bytes to send back to the client
    /// plus a best-effort summary. Returns `None` on total failure (no reply is sent) or, in DoH
    /// mode, if the inbound datagram does not decode (there is no question template to rebuild a
    /// reply from). In UDP-relay mode decoding is only attempted for logging; a client datagram
    /// that fails to decode is still forwarded verbatim.
    pub async fn forward(&self, query: &[u8]) -> Option<(Vec<u8>, Option<Summary>)> {
        let started = Instant::now();
        self.delay().await;

        let outcome = match &self.transport {
            Transport::Udp(transport) => self.run_udp(transport, query).await.ok().map(|reply| {
                let summary = Message::decode(&reply).ok().as_ref().and_then(Summary::from_message);
                (reply, summary)
            }),
            Transport::Doh(transport) => {
                let client_msg = match Message::decode(query) {
                    Ok(msg) => msg,
                    Err(err) => {
                        log::debug!("dropping unparseable query: {}", err);
                        return None;
                    }
                };
                self.run_doh(transport, query)
                    .await
                    .and_then(|raw_reply| match Message::decode(&raw_reply) {
                        Ok(upstream_msg) => {
                            let wire = Message::encode_reply(&client_msg, &upstream_msg);
                            let summary = Summary::from_message(&upstream_msg);
                            Ok((wire, summary))
                        }
                        Err(err) => {
                            log::warn!("upstream returned an unparseable reply: {}", err);
                            Err(TransportError::Network(std::io::Error::other(
                                err.to_string(),
                            )))
                        }
                    })
                    .ok()
            }
        };

        let elapsed = started.elapsed();
        match outcome {
            Some((wire, summary)) => {
                match &summary {
                    Some(summary) => log::info!(
                        "resolved {} {} in {:.3}s (answer={} authority={} additional={})",
                        summary.first_question_name(),
                        summary.first_question_type(),
                        elapsed.as_secs_f64(),
                        summary.answer_count(),
                        summary.authority_count(),
                        summary.additional_count(),
                    ),
                    None => log::info!(
                        "resolved query ({} bytes) in {:.3}s",
                        wire.len(),
                        elapsed.as_secs_f64()
                    ),
                }
                Some((wire, summary))
            }
            None => {
                log::warn!("giving up after {:.3}s", elapsed.as_secs_f64());
                None
            }
        }
    }

    async fn delay(&self) {
        if let Some(d) = self.debug_delay {
            tokio::time::sleep(d).await;
        }
    }

    async fn run_udp(&self, transport: &UdpTransport, query: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut last_err = TransportError::Timeout;
        for attempt in 1..=ATTEMPTS {
            match transport.resolve(query, ATTEMPT_DEADLINE).await {
                Ok(reply) => return Ok(reply),
                Err(err) => {
                    log::debug!("udp attempt {}/{} failed: {}", attempt, ATTEMPTS, err);
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    async fn run_doh(&self, transport: &DohTransport, query: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut last_err = TransportError::Timeout;
        for attempt in 1..=ATTEMPTS {
            match transport.resolve(query, ATTEMPT_DEADLINE).await {
                Ok(reply) => return Ok(reply),
                Err(TransportError::HttpStatus(status)) if is_retryable_status(status) => {
                    log::debug!(
                        "doh attempt {}/{} failed: http status {}",
                        attempt,
                        ATTEMPTS,
                        status
                    );
                    last_err = TransportError::HttpStatus(status);
                }
                Err(err @ TransportError::HttpStatus(_)) => return Err(err),
                Err(TransportError::Network(io_err)) => {
                    log::debug!(
                        "doh attempt {}/{} failed: network error: {}",
                        attempt,
                        ATTEMPTS,
                        io_err
                    );
                    last_err = TransportError::Network(io_err);
                    if attempt < ATTEMPTS {
                        tokio::time::sleep(DOH_NETWORK_BACKOFF).await;
                    }
                }
                Err(err) => {
                    log::debug!("doh attempt {}/{} failed: {}", attempt, ATTEMPTS, err);
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
