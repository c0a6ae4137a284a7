//! HTTP client helper with native-tls support.
//!
//! Both outbound channels (inventory queries and push notifications) go
//! through an agent configured here. Native-tls is selected explicitly so
//! the system TLS library is used (Schannel on Windows, OpenSSL on Linux,
//! Security.framework on macOS), with the platform's built-in root
//! certificates.

use std::time::Duration;

use ureq::tls::{RootCerts, TlsConfig, TlsProvider};
use ureq::Agent;

/// Upper bound on any API response body we are willing to read.
///
/// The fulfillment payload is a few hundred KB at most; anything larger is
/// not a response we know how to interpret.
pub(crate) const MAX_API_RESPONSE_SIZE: u64 = 2 * 1024 * 1024;

/// Create a new HTTP agent with native-tls and the given global timeout.
///
/// The timeout covers the whole request (connect through body read), so a
/// stalled upstream cannot wedge a blocking call past it.
pub fn agent(timeout: Duration) -> Agent {
    let tls_config = TlsConfig::builder()
        .provider(TlsProvider::NativeTls)
        .root_certs(RootCerts::PlatformVerifier)
        .build();

    Agent::config_builder()
        .tls_config(tls_config)
        .timeout_global(Some(timeout))
        .build()
        .into()
}
