//! Outbound transports: one-shot UDP and DNS-over-HTTPS (RFC 8484).

pub mod doh;
pub mod udp;

pub use doh::DohTransport;
pub use udp::UdpTransport;
