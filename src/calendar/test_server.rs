// Canned HTTP/1.1 server for exercising the sources over real sockets.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

/// Response served for a request matching `method`, `path` and, when set,
/// the `Depth` header.
#[derive(Debug, Clone)]
pub struct Reply {
    method: &'static str,
    path: &'static str,
    depth: Option<&'static str>,
    status: u16,
    body: String,
}

impl Reply {
    pub fn new(method: &'static str, path: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self {
            method,
            path,
            depth: None,
            status,
            body: body.into(),
        }
    }

    pub fn depth(mut self, depth: &'static str) -> Self {
        self.depth = Some(depth);
        self
    }

    fn matches(&self, seen: &SeenRequest) -> bool {
        self.method == seen.method
            && self.path == seen.path
            && self.depth.map_or(true, |d| seen.depth.as_deref() == Some(d))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub depth: Option<String>,
}

pub struct StubServer {
    base: Url,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl StubServer {
    /// Starts serving `replies` on an ephemeral port. Unmatched requests get
    /// a 404.
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let replies = Arc::new(replies);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let replies = Arc::clone(&replies);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let _ = serve(stream, &replies, &log).await;
                });
            }
        });
        Self { base, seen }
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn serve(mut stream: TcpStream, replies: &[Reply], log: &Mutex<Vec<SeenRequest>>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_len = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_len]).into_owned();
    let header = |name: &str| {
        head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim().to_string())
        })
    };
    let body_len: usize = header("content-length").and_then(|v| v.parse().ok()).unwrap_or(0);
    while buf.len() < head_len + body_len {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let seen = SeenRequest {
        method: request_line.next().unwrap_or_default().to_string(),
        path: request_line.next().unwrap_or_default().to_string(),
        depth: header("depth"),
    };
    let (status, body) = replies
        .iter()
        .find(|reply| reply.matches(&seen))
        .map_or((404, ""), |reply| (reply.status, reply.body.as_str()));
    log.lock().unwrap().push(seen);

    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
