use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const PAGE_HTML: &str = r#"<!doctype html>
<html><head><title>Shop</title></head><body>
    <h1 class="title">Hello World</h1>
    <p class="price">100 лв.</p>
    <p class="price">200 лв.</p>
    <span class="x">  spaced  out  </span>
</body></html>"#;

/// How long `/slow` waits before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(30);

/// Minimal HTTP/1.1 server on a random local port.
///
/// Routes: `/page` (200 + [`PAGE_HTML`]), `/slow` (200 after
/// [`SLOW_DELAY`]), `/limited` (429), anything else 404.
/// The listener task lives until the test's runtime shuts down.
pub async fn spawn_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(handle(stream));
        }
    });

    addr
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

async fn handle(mut stream: TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let request = String::from_utf8_lossy(&buf);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let (status, body) = match path {
        "/page" => ("200 OK", PAGE_HTML),
        "/slow" => {
            tokio::time::sleep(SLOW_DELAY).await;
            ("200 OK", PAGE_HTML)
        }
        "/limited" => ("429 Too Many Requests", "slow down"),
        _ => ("404 Not Found", "not found"),
    };

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
