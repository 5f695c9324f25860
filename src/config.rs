//! Command-line parsing and resolution into a plain configuration value.

use std::net::SocketAddr;

use clap::Parser;
use log::LevelFilter;

/// Default upstream used by UDP-relay mode when `--upstream` is not given.
const DEFAULT_UPSTREAM_HOST: &str = "8.8.8.8";
/// Default upstream used by DoH mode when `--upstream` is left at its default.
const DEFAULT_UPSTREAM_DOH_URL: &str = "https://dns.google/dns-query";
/// Local listen port when `--port` is not given.
const DEFAULT_PORT: u16 = 1053;
/// Artificial per-attempt delay injected by `--debug`.
const DEBUG_DELAY: std::time::Duration = std::time::Duration::from_secs(3);

#[derive(Debug, Parser)]
#[command(name = "dnsrelay", about = "A local DNS forwarder with UDP and DoH upstreams")]
pub struct Args {
    /// Upstream host/IP (UDP mode) or HTTPS URL (DoH mode).
    #[arg(long, default_value = DEFAULT_UPSTREAM_HOST)]
    upstream: String,

    /// Forward over DNS-over-HTTPS instead of classic UDP.
    #[arg(long)]
    doh: bool,

    /// Inject a 3-second delay before each forwarding attempt.
    #[arg(long)]
    debug: bool,

    /// Local port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Which upstream transport to speak, and the resolved address/URL to speak it to.
#[derive(Debug, Clone)]
pub enum TransportMode {
    Udp(SocketAddr),
    Doh(String),
}

/// Fully resolved configuration, ready to hand to the `Listener` and `Forwarder`.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub transport: TransportMode,
    pub debug_delay: Option<std::time::Duration>,
    pub log_level: LevelFilter,
}

/// Failure resolving the configured upstream hostname to an address.
#[derive(Debug, thiserror::Error)]
#[error("could not resolve upstream host {host}: {source}")]
pub struct UpstreamResolveError {
    pub host: String,
    #[source]
    pub source: std::io::Error,
}

impl Config {
    /// Parses `std::env::args()` and resolves the result into a `Config`. Hostname resolution
    /// for UDP-mode upstreams is async (`tokio::net::lookup_host`), so this is itself async.
    pub async fn from_args() -> Result<Config, UpstreamResolveError> {
        Self::from_parsed(Args::parse()).await
    }

    async fn from_parsed(args: Args) -> Result<Config, UpstreamResolveError> {
        let transport = if args.doh {
            let url = if args.upstream == DEFAULT_UPSTREAM_HOST {
                DEFAULT_UPSTREAM_DOH_URL.to_owned()
            } else {
                args.upstream.clone()
            };
            TransportMode::Doh(url)
        } else {
            let addr = resolve_upstream(&args.upstream).await?;
            TransportMode::Udp(addr)
        };

        let log_level = match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        Ok(Config {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], args.port)),
            transport,
            debug_delay: args.debug.then_some(DEBUG_DELAY),
            log_level,
        })
    }
}

async fn resolve_upstream(host: &str) -> Result<SocketAddr, UpstreamResolveError> {
    if let Ok(addr) = host.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(addr, 53));
    }
    tokio::net::lookup_host((host, 53))
        .await
        .map_err(|source| UpstreamResolveError {
            host: host.to_owned(),
            source,
        })?
        .next()
        .ok_or_else(|| UpstreamResolveError {
            host: host.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses returned"),
        })
}
