//! End-to-end scans against loopback UDP responders.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use warpscan::handshake::HandshakeCodec;
use warpscan::input::Opts;
use warpscan::output::export_csv;
use warpscan::scanner::Scanner;

// The reply the WARP service sends for the fixed probe template.
const VALIDATE_REPLY_HEX: &str = "cf000000628748824150e38f5c64b477";

/// Answers every datagram with the canned reply and returns its address.
async fn spawn_responder(reply: Vec<u8>) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        while let Ok((_, peer)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&reply, peer).await;
        }
    });
    addr
}

fn scan_opts() -> Opts {
    Opts {
        routines: 4,
        ping_times: 3,
        ..Opts::default()
    }
}

#[tokio::test]
async fn responsive_endpoint_is_reported_alive() {
    let reply = hex::decode(VALIDATE_REPLY_HEX).unwrap();
    let addr = spawn_responder(reply).await;

    let opts = scan_opts();
    let codec = Arc::new(HandshakeCodec::from_opts(&opts).unwrap());
    let results = Scanner::new(vec![addr], codec, &opts).run().await;

    assert_eq!(results.len(), 1);
    let record = results.iter().next().unwrap();
    assert_eq!(record.endpoint(), addr);
    assert_eq!(record.sent(), 3);
    assert_eq!(record.received(), 3);
    assert!((record.loss_rate() - 0.0).abs() < f32::EPSILON);
    assert!(record.delay() > std::time::Duration::ZERO);
}

#[tokio::test]
async fn garbage_reply_keeps_endpoint_out_of_results() {
    let addr = spawn_responder(b"definitely not a handshake".to_vec()).await;

    let opts = scan_opts();
    let codec = Arc::new(HandshakeCodec::from_opts(&opts).unwrap());
    let results = Scanner::new(vec![addr], codec, &opts).run().await;

    assert!(results.is_empty());
}

#[tokio::test]
async fn mixed_candidates_rank_alive_before_nothing() {
    let reply = hex::decode(VALIDATE_REPLY_HEX).unwrap();
    let alive = spawn_responder(reply).await;

    // Bound but silent: every trial times out.
    let dead_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let dead = dead_socket.local_addr().unwrap();

    let opts = scan_opts();
    let codec = Arc::new(HandshakeCodec::from_opts(&opts).unwrap());
    let results = Scanner::new(vec![dead, alive], codec, &opts).run().await;

    assert_eq!(results.len(), 1);
    assert_eq!(results.iter().next().unwrap().endpoint(), alive);
}

#[tokio::test]
async fn pipeline_writes_csv_for_alive_endpoints() {
    let reply = hex::decode(VALIDATE_REPLY_HEX).unwrap();
    let addr = spawn_responder(reply).await;

    let opts = scan_opts();
    let codec = Arc::new(HandshakeCodec::from_opts(&opts).unwrap());
    let results = Scanner::new(vec![addr], codec, &opts).run().await;
    let results = results
        .filter_delay(opts.min_delay(), opts.max_delay())
        .filter_loss_rate(opts.max_loss_rate);

    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_string_lossy().into_owned();
    export_csv(&results, &path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("IP:Port,Loss,Latency"));
    assert!(content.contains(&addr.to_string()));
}
