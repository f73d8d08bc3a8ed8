//! HTTP server for the Prometheus metrics endpoint.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{error, info};
use parking_lot::Mutex;
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpSocket;

use crate::pool::RoutePool;

use super::metrics::update_metrics;
use super::REGISTRY;

async fn handle_metrics_request(stream: tokio::net::TcpStream, route_pool: Arc<Mutex<RoutePool>>) {
    let (read_half, write_half) = stream.into_split();
    let mut stream_reader = tokio::io::BufReader::new(read_half);
    let mut connection = tokio::io::BufWriter::new(write_half);
    let mut headers = [0; 1024];

    let n = match tokio::io::AsyncReadExt::read(&mut stream_reader, &mut headers).await {
        Ok(n) => n,
        Err(e) => {
            error!("Failed to read HTTP request: {e}");
            return;
        }
    };

    let headers_str = match std::str::from_utf8(&headers[..n]) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to parse HTTP headers: {e}");
            return;
        }
    };

    let accepts_gzip =
        headers_str.contains("Accept-Encoding") && headers_str.to_lowercase().contains("gzip");

    update_metrics(&route_pool.lock());

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {e}");
        return;
    }

    let content_type = encoder.format_type();

    let (response_body, content_encoding) = if accepts_gzip {
        let mut compressed = Vec::new();
        {
            let mut encoder = GzEncoder::new(&mut compressed, Compression::default());
            if let Err(e) = encoder.write_all(&buffer) {
                error!("Failed to compress metrics data: {e}");
                return;
            }
            if let Err(e) = encoder.finish() {
                error!("Failed to finish gzip compression: {e}");
                return;
            }
        }
        (compressed, "Content-Encoding: gzip\r\n")
    } else {
        (buffer, "")
    };

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\n{}Content-Length: {}\r\n\r\n",
        content_type,
        content_encoding,
        response_body.len()
    );

    if let Err(e) = tokio::io::AsyncWriteExt::write_all(&mut connection, response.as_bytes()).await
    {
        error!("Failed to write HTTP response header: {e}");
        return;
    }

    if let Err(e) = tokio::io::AsyncWriteExt::write_all(&mut connection, &response_body).await {
        error!("Failed to write metrics data: {e}");
        return;
    }

    if let Err(e) = tokio::io::AsyncWriteExt::flush(&mut connection).await {
        error!("Failed to flush connection: {e}");
    }
}

/// Starts the metrics exporter, serving a scrape from the live state of
/// `route_pool` on every request. Runs until the process exits; bind
/// failures here are logged rather than fatal, since a metrics outage
/// should not take the pooler down with it.
pub async fn start_prometheus_server(host: String, route_pool: Arc<Mutex<RoutePool>>) {
    info!("starting prometheus exporter on {host}");
    let addr: SocketAddr = match host.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("failed to parse metrics listen address '{host}': {e}");
            return;
        }
    };
    let listen_socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    };
    let listen_socket = match listen_socket {
        Ok(socket) => socket,
        Err(e) => {
            error!("failed to create metrics socket: {e}");
            return;
        }
    };
    if let Err(e) = listen_socket.set_reuseaddr(true) {
        error!("failed to set SO_REUSEADDR on metrics socket: {e}");
        return;
    }
    if let Err(e) = listen_socket.bind(addr) {
        error!("failed to bind metrics listener to {addr}: {e}");
        return;
    }
    let listener = match listen_socket.listen(1024) {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to listen on metrics socket {addr}: {e}");
            return;
        }
    };

    info!("prometheus exporter listening on {addr}");
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let route_pool = route_pool.clone();
                tokio::spawn(async move {
                    handle_metrics_request(stream, route_pool).await;
                });
            }
            Err(e) => {
                error!("failed to accept metrics connection: {e}");
            }
        }
    }
}
