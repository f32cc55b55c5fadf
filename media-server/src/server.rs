//! HTTP server exposing local audio files to Cast receivers.

use std::convert::Infallible;
use std::io::{self, SeekFrom};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use warp::http::{header, Method, Response, StatusCode};
use warp::hyper::Body;
use warp::Filter;

use crate::error::{Result, ServerError};
use crate::range::ByteRange;
use crate::resolve::{content_type_for, MediaRoot};

/// HTTP file server for Cast receivers.
///
/// The `MediaServer` binds to the first free port of a range and serves the
/// files below its current root directory. Receivers are handed URLs built
/// with [`MediaServer::url_for`].
///
/// # Example
///
/// ```no_run
/// use media_server::MediaServer;
///
/// #[tokio::main]
/// async fn main() {
///     let server = MediaServer::new((8000, 8100), "/home/me/Music")
///         .await
///         .expect("Failed to start media server");
///
///     println!("Serving at: {}", server.base_url());
/// }
/// ```
pub struct MediaServer {
    /// The port the server is bound to
    port: u16,
    /// Address handed out in URLs
    advertised_ip: RwLock<IpAddr>,
    /// Directory files are served from
    root: Arc<RwLock<MediaRoot>>,
    /// Shutdown signal for the warp server
    shutdown: Arc<Notify>,
    /// Server task handle
    server_handle: Option<JoinHandle<()>>,
}

impl MediaServer {
    /// Create and start a media server.
    ///
    /// This method:
    /// - Binds the first port of `port_range` that is not taken
    /// - Detects the local IP address used for LAN traffic
    /// - Starts serving files below `root`
    ///
    /// Must be called from within a tokio runtime.
    pub async fn new(port_range: (u16, u16), root: impl AsRef<Path>) -> Result<Self> {
        Self::with_advertised_ip(port_range, root, None).await
    }

    /// Create and start a media server that advertises `advertised_ip` in its
    /// URLs instead of the auto-detected address.
    pub async fn with_advertised_ip(
        port_range: (u16, u16),
        root: impl AsRef<Path>,
        advertised_ip: Option<IpAddr>,
    ) -> Result<Self> {
        let root = Arc::new(RwLock::new(MediaRoot::new(root)?));
        let advertised_ip = advertised_ip.unwrap_or_else(Self::detect_local_ip);
        let shutdown = Arc::new(Notify::new());
        let routes = Self::routes(Arc::clone(&root));

        let (start, end) = port_range;
        let mut bound = None;
        for port in start..=end {
            let signal = Arc::clone(&shutdown);
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
            match warp::serve(routes.clone())
                .try_bind_with_graceful_shutdown(addr, async move { signal.notified().await })
            {
                Ok(server) => {
                    bound = Some(server);
                    break;
                }
                Err(e) => debug!("Port {} unavailable: {}", port, e),
            }
        }
        let (addr, server) = bound.ok_or(ServerError::NoAvailablePort { start, end })?;

        let server_handle = tokio::spawn(server);
        info!(
            "Media server listening on {} (advertised as {}:{}), serving {}",
            addr,
            advertised_ip,
            addr.port(),
            root.read().dir().display()
        );

        Ok(Self {
            port: addr.port(),
            advertised_ip: RwLock::new(advertised_ip),
            root,
            shutdown,
            server_handle: Some(server_handle),
        })
    }

    /// Base URL receivers use to reach the server: `http://<ip>:<port>`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.advertised_ip.read(), self.port)
    }

    /// Get the port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Change the address handed out in URLs.
    ///
    /// Used once the target receiver is known, to pick the interface facing it.
    pub fn set_advertised_ip(&self, ip: IpAddr) {
        *self.advertised_ip.write() = ip;
    }

    /// Current root directory.
    pub fn root(&self) -> PathBuf {
        self.root.read().dir().to_path_buf()
    }

    /// Serve files from another directory from now on.
    pub fn set_root(&self, dir: impl AsRef<Path>) -> Result<()> {
        let new_root = MediaRoot::new(dir)?;
        let mut root = self.root.write();
        if *root != new_root {
            debug!("Media server root moved to {}", new_root.dir().display());
            *root = new_root;
        }
        Ok(())
    }

    /// URL of a file inside the current root.
    pub fn url_for(&self, file: impl AsRef<Path>) -> Result<String> {
        let url_path = self.root.read().url_path_for(file)?;
        Ok(format!("{}{}", self.base_url(), url_path))
    }

    /// Re-root the server at the directory containing `file` and return its URL.
    pub fn expose(&self, file: impl AsRef<Path>) -> Result<String> {
        let file = file.as_ref();
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        self.set_root(dir)?;
        self.url_for(file)
    }

    /// Shutdown the server gracefully and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        info!("Media server on port {} stopped", self.port);
    }

    /// Detect the local IP address used for LAN traffic.
    ///
    /// Uses a UDP socket "connection" to a non-routable private address to let
    /// the OS pick the outbound interface. No data is sent. Falls back to
    /// `127.0.0.1` when there is no usable interface.
    pub fn detect_local_ip() -> IpAddr {
        let outbound_ip = || -> Option<IpAddr> {
            let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
            socket.connect("10.255.255.255:1").ok()?;
            Some(socket.local_addr().ok()?.ip())
        };
        outbound_ip()
            .filter(|ip| !ip.is_unspecified())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    /// Local address of the interface that routes to `remote`.
    pub fn local_ip_for(remote: IpAddr) -> Option<IpAddr> {
        let bind_addr = match remote {
            IpAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
            IpAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
        };
        let socket = UdpSocket::bind(bind_addr).ok()?;
        socket.connect(SocketAddr::new(remote, 9)).ok()?;
        socket
            .local_addr()
            .ok()
            .map(|addr| addr.ip())
            .filter(|ip| !ip.is_unspecified())
    }

    fn routes(
        root: Arc<RwLock<MediaRoot>>,
    ) -> impl Filter<Extract = (Response<Body>,), Error = warp::Rejection> + Clone + Send + Sync + 'static
    {
        warp::method()
            .and(warp::path::full())
            .and(warp::header::optional::<String>("range"))
            .and(warp::any().map(move || Arc::clone(&root)))
            .and_then(serve_request)
    }
}

impl Drop for MediaServer {
    fn drop(&mut self) {
        if self.server_handle.is_some() {
            self.shutdown.notify_one();
        }
    }
}

async fn serve_request(
    method: Method,
    path: warp::path::FullPath,
    range: Option<String>,
    root: Arc<RwLock<MediaRoot>>,
) -> std::result::Result<Response<Body>, Infallible> {
    if method != Method::GET && method != Method::HEAD {
        return Ok(status_response(StatusCode::METHOD_NOT_ALLOWED));
    }

    let resolved = root.read().resolve(path.as_str());
    let file_path = match resolved {
        Ok(file_path) => file_path,
        Err(ServerError::OutsideRoot(target)) => {
            warn!(
                "Rejected request outside the served directory: {} -> {}",
                path.as_str(),
                target.display()
            );
            return Ok(status_response(StatusCode::NOT_FOUND));
        }
        Err(e) => {
            debug!("{} {}: {}", method, path.as_str(), e);
            return Ok(status_response(StatusCode::NOT_FOUND));
        }
    };

    match file_response(&method, &file_path, range.as_deref()).await {
        Ok(response) => {
            debug!("{} {} -> {}", method, path.as_str(), response.status());
            Ok(response)
        }
        Err(e) => {
            warn!("Failed to serve {}: {}", file_path.display(), e);
            Ok(status_response(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

async fn file_response(method: &Method, path: &Path, range: Option<&str>) -> io::Result<Response<Body>> {
    let mut file = tokio::fs::File::open(path).await?;
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Ok(status_response(StatusCode::NOT_FOUND));
    }

    let len = metadata.len();
    let byte_range = ByteRange::parse(range, len);
    let builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(path))
        .header(header::ACCEPT_RANGES, "bytes");

    let builder = match byte_range {
        ByteRange::Unsatisfiable => {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", len))
                .body(Body::empty())
                .map_err(io::Error::other);
        }
        ByteRange::Full => builder.status(StatusCode::OK),
        ByteRange::Partial { start, end } => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, len)),
    };

    let content_length = byte_range.content_length(len);
    let body = if *method == Method::HEAD || content_length == 0 {
        Body::empty()
    } else {
        file.seek(SeekFrom::Start(byte_range.offset())).await?;
        Body::wrap_stream(ReaderStream::new(file.take(content_length)))
    };

    builder
        .header(header::CONTENT_LENGTH, content_length)
        .body(body)
        .map_err(io::Error::other)
}

fn status_response(code: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = code;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[tokio::test]
    async fn test_falls_back_to_next_port() {
        let tmp = tempfile::tempdir().unwrap();

        // Hold a port so the server has to move on
        let taken = TcpListener::bind("0.0.0.0:0").unwrap();
        let taken_port = taken.local_addr().unwrap().port();
        let end = taken_port.saturating_add(20);

        let server = MediaServer::new((taken_port, end), tmp.path()).await.unwrap();
        assert_ne!(server.port(), taken_port);
        assert!(server.port() > taken_port && server.port() <= end);

        server.shutdown().await;
        drop(taken);
    }

    #[tokio::test]
    async fn test_no_available_port() {
        let tmp = tempfile::tempdir().unwrap();
        let taken = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = MediaServer::new((port, port), tmp.path()).await;
        assert!(matches!(
            result,
            Err(ServerError::NoAvailablePort { start, end }) if start == port && end == port
        ));
    }

    #[test]
    fn test_detect_local_ip() {
        let ip = MediaServer::detect_local_ip();
        assert!(!ip.is_unspecified());
    }

    #[test]
    fn test_local_ip_for_loopback() {
        let ip = MediaServer::local_ip_for(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(ip, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[tokio::test]
    async fn test_expose_reroots_and_builds_url() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(b.join("My Song.mp3"), b"ID3").unwrap();

        let server = MediaServer::with_advertised_ip(
            (0, 0),
            &a,
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))),
        )
        .await
        .unwrap();

        let url = server.expose(b.join("My Song.mp3")).unwrap();
        assert_eq!(
            url,
            format!("http://192.168.1.10:{}/My%20Song.mp3", server.port())
        );
        assert_eq!(server.root(), b.canonicalize().unwrap());

        server.shutdown().await;
    }
}
