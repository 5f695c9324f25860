use std::sync::Arc;

use dnsrelay::config::{Config, TransportMode};
use dnsrelay::forwarder::{Forwarder, Transport};
use dnsrelay::listener::Listener;
use dnsrelay::transport::{DohTransport, UdpTransport};
use env_logger::Builder;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Verbosity isn't known until args are parsed, so logging starts only after `from_args`.
    let config = match Config::from_args().await {
        Ok(config) => config,
        Err(err) => {
            // env_logger hasn't been initialized yet; this is a startup failure, print directly.
            eprintln!("dnsrelay: {}", err);
            std::process::exit(1);
        }
    };

    Builder::new()
        .filter_module("dnsrelay", config.log_level)
        .init();

    let transport = match config.transport {
        TransportMode::Udp(addr) => {
            log::info!("forwarding over UDP to {}", addr);
            Transport::Udp(UdpTransport::new(addr))
        }
        TransportMode::Doh(url) => {
            log::info!("forwarding over DNS-over-HTTPS to {}", url);
            let client = match reqwest::blocking::Client::builder().build() {
                Ok(client) => Arc::new(client),
                Err(err) => {
                    log::error!("failed to build HTTPS client: {}", err);
                    std::process::exit(1);
                }
            };
            Transport::Doh(DohTransport::new(client, url))
        }
    };
    let forwarder = Forwarder::new(transport, config.debug_delay);

    let listener = match Listener::bind(config.listen_addr, forwarder).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("{}", err);
            std::process::exit(1);
        }
    };
    listener.serve().await;
}
