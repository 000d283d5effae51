//! Startup shim for the proxy binary.
//!
//! Usage: `ldap-tap [LISTEN_ADDR] [UPSTREAM_ADDR]`
//!
//! Configuration comes from environment variables (`LDAP_TAP_LISTEN`,
//! `LDAP_TAP_UPSTREAM`, `LDAP_TAP_LOG_LEVEL`, ...); positional arguments
//! override both addresses.

use ldap_tap::config::ProxyConfig;
use ldap_tap::error::ProxyError;
use ldap_tap::service::acceptor;
use ldap_tap::utils::logging;

#[tokio::main]
async fn main() -> ldap_tap::Result<()> {
    let mut config = ProxyConfig::from_env()?;

    let mut args = std::env::args().skip(1);
    if let Some(listen) = args.next() {
        config.listen_addr = listen;
    }
    if let Some(upstream) = args.next() {
        config.upstream_addr = upstream;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("config error: {error}");
        }
        return Err(ProxyError::Config(errors.join("; ")));
    }

    logging::init(&config.logging);
    acceptor::run(&config).await
}
