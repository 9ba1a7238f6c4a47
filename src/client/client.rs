//! High-level HTTP client.
//!
//! Provides [`HttpClient`], which runs one transport session per request and
//! follows redirects for requests that allow them.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tracing::{info, warn};

use super::session::ClientSession;
use crate::core::{Error, Result, SessionConfig};
use crate::http::{Request, Response};
use crate::transport::{DatagramEndpoint, TransferReport};

/// Result of a completed request chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The final, non-redirect response.
    pub response: Response,
    /// The request that produced it.
    pub request: Request,
    /// Redirects followed on the way.
    pub redirects: u32,
    /// Transfer counters of the final request.
    pub report: TransferReport,
}

/// Builder for creating an [`HttpClient`].
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    config: SessionConfig,
}

impl HttpClientBuilder {
    /// Start from the default session configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for every session.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Route every datagram through `router`.
    pub fn router(mut self, router: SocketAddr) -> Self {
        self.config.router = Some(router);
        self
    }

    /// Set the redirect budget.
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<HttpClient> {
        HttpClient::new(self.config)
    }
}

/// Sends requests over the reliable UDP transport.
///
/// Each request gets a fresh endpoint and session; a redirect tears the
/// session down and starts a new one toward the `Location` target.
///
/// # Example
///
/// ```ignore
/// use courier::client::HttpClient;
/// use courier::http::Request;
///
/// let client = HttpClient::new(Default::default())?;
/// let outcome = client.perform(Request::get("http://127.0.0.1:8080/")?).await?;
/// println!("{}", String::from_utf8_lossy(&outcome.response.body));
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    config: SessionConfig,
}

impl HttpClient {
    /// Create a client; fails on an invalid configuration.
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Start building a client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// The session configuration in use.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Send `request` and return the final response.
    ///
    /// Redirect statuses (301, 302, 307) on a redirectable request are
    /// followed up to `max_redirects` times. A redirect without a usable
    /// `Location` fails with [`Error::RedirectLocationMissing`]; one more redirect than
    /// the budget allows fails with [`Error::RedirectLimitExceeded`].
    #[tracing::instrument(skip_all, fields(method = %request.method, host = %request.host, target = %request.target()))]
    pub async fn perform(&self, request: Request) -> Result<Outcome> {
        let mut request = request;
        let mut redirects = 0;

        loop {
            let (response, report) = self.perform_once(&request).await?;

            if !(response.is_redirect() && request.is_redirectable()) {
                info!(status = response.status, redirects, "request complete");
                return Ok(Outcome {
                    response,
                    request,
                    redirects,
                    report,
                });
            }

            let Some(location) = response.location() else {
                return Err(Error::RedirectLocationMissing {
                    status: response.status,
                });
            };
            if redirects >= self.config.max_redirects {
                return Err(Error::RedirectLimitExceeded {
                    limit: self.config.max_redirects,
                });
            }

            request = match request.redirect_to(location) {
                Ok(next) => next,
                Err(err) => {
                    warn!(status = response.status, location, error = %err, "cannot follow redirect");
                    return Err(Error::RedirectLocationMissing {
                        status: response.status,
                    });
                }
            };
            redirects += 1;
            info!(status = response.status, location, redirects, "following redirect");
        }
    }

    async fn perform_once(&self, request: &Request) -> Result<(Response, TransferReport)> {
        let peer = resolve(&request.host, request.port).await?;
        let endpoint = DatagramEndpoint::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
            .await?
            .with_router(self.config.router);

        let mut session = ClientSession::new(endpoint, peer, self.config.clone());
        let exchange = session.exchange(&request.format()).await?;
        let response = Response::interpret(&exchange.response)?;
        Ok((response, exchange.report))
    }
}

/// Resolve `host` to the first IPv4 address it names.
async fn resolve(host: &str, port: u16) -> Result<SocketAddrV4> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|err| Error::InvalidUrl(format!("{host}: {err}")))?;
    addrs
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| Error::InvalidUrl(format!("{host}: no IPv4 address")))
}
