//! Integration tests exercising `Forwarder` in UDP-relay mode against a fake in-process
//! upstream resolver.

use std::time::{Duration, Instant};

use dnsrelay::forwarder::{Forwarder, Transport};
use dnsrelay::transport::UdpTransport;
use tokio::net::UdpSocket;

const QUERY_A_EXAMPLE_COM: &[u8] = &[
    0xab, 0xcd, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, b'e', b'x',
    b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01, 0x00, 0x01,
];

fn a_response() -> Vec<u8> {
    let mut buf = vec![0xab, 0xcd, 0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
    buf.extend_from_slice(&QUERY_A_EXAMPLE_COM[12..]);
    buf.extend_from_slice(&[
        0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01,
        0x00, 0x01, 0x00, 0x00, 0x00, 0x3c, 0x00, 0x04, 93, 184, 216, 34,
    ]);
    buf
}

async fn fake_upstream() -> (UdpSocket, std::net::SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

#[tokio::test]
async fn udp_relay_forwards_response_unchanged() {
    let (upstream, addr) = fake_upstream().await;
    let responder = tokio::spawn(async move {
        let mut buf = [0u8; 512];
        let (n, peer) = upstream.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], QUERY_A_EXAMPLE_COM);
        upstream.send_to(&a_response(), peer).await.unwrap();
    });

    let forwarder = Forwarder::new(Transport::Udp(UdpTransport::new(addr)), None);
    let (reply, summary) = forwarder.forward(QUERY_A_EXAMPLE_COM).await.unwrap();

    assert_eq!(reply, a_response());
    assert_eq!(&reply[0..2], &QUERY_A_EXAMPLE_COM[0..2]);
    assert!(summary.is_some());
    responder.await.unwrap();
}

#[tokio::test]
async fn udp_relay_retries_and_succeeds_on_third_attempt() {
    let (upstream, addr) = fake_upstream().await;
    let responder = tokio::spawn(async move {
        for _ in 0..2 {
            let mut buf = [0u8; 512];
            let (_n, _peer) = upstream.recv_from(&mut buf).await.unwrap();
            // Drop the first two attempts by not replying.
        }
        let mut buf = [0u8; 512];
        let (_n, peer) = upstream.recv_from(&mut buf).await.unwrap();
        upstream.send_to(&a_response(), peer).await.unwrap();
    });

    let forwarder = Forwarder::new(Transport::Udp(UdpTransport::new(addr)), None);
    let started = Instant::now();
    let (reply, _summary) = forwarder.forward(QUERY_A_EXAMPLE_COM).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(reply, a_response());
    assert!(elapsed >= Duration::from_secs(2) * 3 - Duration::from_millis(100));
    responder.await.unwrap();
}

#[tokio::test]
async fn udp_relay_sends_no_reply_when_upstream_never_responds() {
    let (_upstream, addr) = fake_upstream().await;
    // Keep the socket bound (but silent) for the test's duration.
    let upstream_guard = _upstream;

    let forwarder = Forwarder::new(Transport::Udp(UdpTransport::new(addr)), None);
    let result = forwarder.forward(QUERY_A_EXAMPLE_COM).await;
    assert!(result.is_none());
    drop(upstream_guard);
}
