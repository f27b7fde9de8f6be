//! Async Discipline
//!
//! The client runs entirely on the tokio runtime. Production code must not
//! block a worker thread: no thread sleeps, no blocking HTTP client and no
//! blocking sockets. Timers go through `tokio::time`, sockets through tokio.

use architectural_enforcement::{report, scan, PRODUCTION_DIRS};

#[test]
fn test_no_thread_sleep_in_production_code() {
    let violations = scan(PRODUCTION_DIRS, &["std::thread::sleep", "thread::sleep("]);

    report(
        &violations,
        "Thread-blocking sleep found in production code!",
        &[
            "tokio::time::sleep for reconnect delays and simulation pacing",
            "tokio::time::interval for heartbeats",
            "tokio::time::timeout for connect deadlines",
        ],
    );
}

#[test]
fn test_no_blocking_http_client() {
    let violations = scan(PRODUCTION_DIRS, &["reqwest::blocking"]);

    report(
        &violations,
        "Blocking HTTP client found in production code!",
        &["reqwest::Client with .await"],
    );
}

#[test]
fn test_no_blocking_sockets_in_core() {
    let violations = scan(
        &["counsel/core/src"],
        &["std::net::TcpStream", "std::net::TcpListener", "std::net::UdpSocket"],
    );

    report(
        &violations,
        "Blocking sockets found in the client library!",
        &["tokio::net", "tokio-tungstenite connect_async"],
    );
}
