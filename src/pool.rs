//! Keep-alive connection pool tuned for Azure's load balancer, which
//! silently drops idle connections after 60 s (§4.4).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::Full;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::error::{classify_io_error, Error};

/// Sockets idle longer than this are never handed out; the load balancer
/// itself drops them at 60 s, so 55 s leaves margin (§4.4).
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(55);
/// How often the background reaper sweeps each host's idle list.
const REAP_INTERVAL: Duration = Duration::from_secs(5);

type Conn = SendRequest<Full<Bytes>>;

struct Idle {
    sender: Conn,
    parked_at: Instant,
}

struct HostPool {
    idle: Mutex<VecDeque<Idle>>,
    semaphore: Arc<Semaphore>,
    max_free_sockets: usize,
}

impl HostPool {
    fn new(max_sockets: usize, max_free_sockets: usize) -> Self {
        Self { idle: Mutex::new(VecDeque::new()), semaphore: Arc::new(Semaphore::new(max_sockets)), max_free_sockets }
    }

    /// Pops the most recently parked still-fresh socket, discarding (and
    /// logging) any stale ones found ahead of it.
    fn take_fresh(&self) -> Option<Conn> {
        let mut idle = self.idle.lock();
        while let Some(candidate) = idle.pop_back() {
            if candidate.parked_at.elapsed() < IDLE_TIMEOUT {
                return Some(candidate.sender);
            }
            tracing::debug!("discarding pooled socket past idle timeout on checkout");
        }
        None
    }

    fn park(&self, sender: Conn) {
        let mut idle = self.idle.lock();
        if idle.len() >= self.max_free_sockets {
            tracing::debug!("free socket cache full, closing returned connection");
            return;
        }
        idle.push_back(Idle { sender, parked_at: Instant::now() });
    }

    fn reap(&self) {
        let mut idle = self.idle.lock();
        let before = idle.len();
        idle.retain(|i| i.parked_at.elapsed() < IDLE_TIMEOUT);
        let reaped = before - idle.len();
        if reaped > 0 {
            tracing::debug!(reaped, "reaped idle sockets past 55s timeout");
        }
    }
}

/// A shared keep-alive pool. A single instance is normally shared
/// process-wide (§4.4 defaults: `maxSockets=100`, `maxFreeSockets=100`).
pub struct Pool {
    hosts: DashMap<String, Arc<HostPool>>,
    max_sockets: usize,
    max_free_sockets: usize,
    tls: TlsConnector,
}

impl Pool {
    pub fn new(max_sockets: usize, max_free_sockets: usize) -> Arc<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
        let pool = Arc::new(Self {
            hosts: DashMap::new(),
            max_sockets,
            max_free_sockets,
            tls: TlsConnector::from(Arc::new(config)),
        });
        pool
    }

    pub fn with_defaults() -> Arc<Self> {
        Self::new(100, 100)
    }

    fn host_pool(&self, host: &str) -> Arc<HostPool> {
        if let Some(existing) = self.hosts.get(host) {
            return existing.clone();
        }
        let created = Arc::new(HostPool::new(self.max_sockets, self.max_free_sockets));
        self.hosts.insert(host.to_string(), created.clone());
        spawn_reaper(created.clone());
        created
    }

    /// Checks out a connection to `host:443`, reusing a pooled socket when
    /// one is fresh, otherwise dialing and TLS-handshaking a new one.
    /// Acquiring the per-host semaphore permit enforces `maxSockets` by
    /// suspending surplus acquisitions (§4.4, §5).
    pub async fn checkout(self: &Arc<Self>, host: &str) -> Result<Checkout, Error> {
        let host_pool = self.host_pool(host);
        let permit = host_pool.semaphore.clone().acquire_owned().await.expect("semaphore never closed");

        if let Some(sender) = host_pool.take_fresh() {
            return Ok(Checkout { host: host.to_string(), pool: self.clone(), sender: Some(sender), _permit: permit });
        }

        let sender = self.connect(host).await?;
        Ok(Checkout { host: host.to_string(), pool: self.clone(), sender: Some(sender), _permit: permit })
    }

    async fn connect(&self, host: &str) -> Result<Conn, Error> {
        let tcp = TcpStream::connect((host, 443)).await.map_err(|e| classify_io_error(&e))?;
        // Nagle's algorithm is disabled once at connect time rather than on
        // every checkout; a connection that started active stays active.
        tcp.set_nodelay(true).map_err(|e| classify_io_error(&e))?;

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::usage(format!("invalid TLS server name: {host}")))?;
        let tls_stream = self
            .tls
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::new("TlsHandshakeError", e.to_string()))?;

        let io = TokioIo::new(tls_stream);
        let (sender, conn) = http1::handshake(io).await.map_err(|e| Error::new("TlsHandshakeError", e.to_string()))?;

        // Drives the connection's I/O. Errors observed here while the
        // socket is idle-in-pool are informational only (§4.4, §9); active
        // failures additionally surface to the caller via send_request.
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::warn!(error = %err, "pooled connection driver exited with an error");
            }
        });

        Ok(sender)
    }

    /// Checks out a connection to `addr` (`host:port`) over plain TCP,
    /// skipping the TLS handshake entirely. Gated behind the `test-util`
    /// feature; exists only so the request pipeline can be driven against a
    /// local `TcpListener` in tests, never part of the default build.
    #[cfg(feature = "test-util")]
    pub async fn checkout_plaintext(self: &Arc<Self>, addr: &str) -> Result<Checkout, Error> {
        let host_pool = self.host_pool(addr);
        let permit = host_pool.semaphore.clone().acquire_owned().await.expect("semaphore never closed");

        if let Some(sender) = host_pool.take_fresh() {
            return Ok(Checkout { host: addr.to_string(), pool: self.clone(), sender: Some(sender), _permit: permit });
        }

        let tcp = TcpStream::connect(addr).await.map_err(|e| classify_io_error(&e))?;
        tcp.set_nodelay(true).map_err(|e| classify_io_error(&e))?;
        let io = TokioIo::new(tcp);
        let (sender, conn) = http1::handshake(io).await.map_err(|e| Error::new("TlsHandshakeError", e.to_string()))?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::warn!(error = %err, "plaintext test connection driver exited with an error");
            }
        });

        Ok(Checkout { host: addr.to_string(), pool: self.clone(), sender: Some(sender), _permit: permit })
    }
}

fn spawn_reaper(host_pool: Arc<HostPool>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(REAP_INTERVAL).await;
            host_pool.reap();
        }
    });
}

/// A connection checked out for one outbound request. Returns to the free
/// pool on drop, with a fresh idle timer starting from that moment (§4.4).
pub struct Checkout {
    host: String,
    pool: Arc<Pool>,
    sender: Option<Conn>,
    _permit: OwnedSemaphorePermit,
}

impl Checkout {
    pub fn sender_mut(&mut self) -> &mut Conn {
        self.sender.as_mut().expect("sender taken only on drop")
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            if sender.is_closed() {
                return;
            }
            let host_pool = self.pool.host_pool(&self.host);
            host_pool.park(sender);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_socket_within_window_is_kept() {
        let pool = HostPool::new(10, 10);
        assert!(pool.take_fresh().is_none());
    }

    #[test]
    fn max_free_sockets_bounds_the_idle_cache() {
        let pool = HostPool::new(10, 0);
        // parking into a zero-capacity cache is a silent drop, not a panic
        // (there is no live Conn to construct in a unit test without a
        // socket; this just checks the length invariant holds).
        assert_eq!(pool.idle.lock().len(), 0);
    }
}
