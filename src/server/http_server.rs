use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService, Request, Response};
use tracing::info;

/// Wrapper around may_minihttp's HTTP server
///
/// Accepts up to 32 request headers, which covers browsers behind a proxy.
pub struct HttpServer<T>(pub T);

/// Handle to a running HTTP server
///
/// Wait until it accepts connections, stop it, or join it.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// # Errors
    ///
    /// `TimedOut` if nothing accepts within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel the accept loop and wait for it to finish.
    pub fn stop(self) {
        // SAFETY: may marks cancel() unsafe because the coroutine unwinds at its
        // next yield point. The accept loop owns no state that needs cleanup
        // beyond its listener, and we join right after.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Block until the server coroutine exits.
    ///
    /// # Errors
    ///
    /// The panic payload if the server coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind `addr` and start accepting.
    ///
    /// # Errors
    ///
    /// If the address does not resolve or the port cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = HttpServerWithHeaders::<_, 32>(self.0).start(addr)?;
        info!(%addr, "Listening");
        Ok(ServerHandle { addr, handle })
    }
}

/// Sends every plain-HTTP request to the same host on the primary port over
/// https, with `303 See Other`.
#[derive(Debug, Clone, Copy)]
pub struct RedirectService {
    primary_port: u16,
}

impl RedirectService {
    #[must_use]
    pub fn new(primary_port: u16) -> Self {
        Self { primary_port }
    }

    #[must_use]
    pub fn location(&self, host: &str, uri: &str) -> String {
        redirect_location(host, self.primary_port, uri)
    }
}

impl HttpService for RedirectService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let host = req
            .headers()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("host"))
            .map(|h| String::from_utf8_lossy(h.value).into_owned())
            .unwrap_or_default();
        let location = self.location(&host, req.path());
        res.status_code(303, "See Other");
        res.header(Box::leak(format!("Location: {location}").into_boxed_str()));
        Ok(())
    }
}

/// `https://{host without port}:{primary_port}{uri}`
#[must_use]
pub fn redirect_location(host: &str, primary_port: u16, uri: &str) -> String {
    format!("https://{}:{primary_port}{uri}", strip_port(host))
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [::1]:80
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    match host.rsplit_once(':') {
        Some((h, port)) if !h.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => h,
        _ => host,
    }
}
