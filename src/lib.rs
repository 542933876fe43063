//! This crate exposes the internal functionality of the warpscan endpoint
//! scanner.
//!
//! warpscan discovers which endpoints inside Cloudflare's WARP anycast
//! ranges are reachable and fast. It sends a WireGuard handshake-initiation
//! datagram to each candidate (IP, port) pair, measures whether a valid
//! reply arrives and how long it takes, then ranks the survivors by packet
//! loss and average delay. Only the first handshake round trip is ever
//! evaluated; no session is completed and no data is transported.
//!
//! ## Architecture Overview
//!
//! The probing behaviour is managed by [`Scanner`](crate::scanner::Scanner):
//!
//! 1. **Address expansion**: CIDR/IP input is expanded into concrete
//!    addresses and crossed with the port set into a shuffled, capped
//!    candidate list ([`address`]).
//! 2. **Probe construction**: the outbound handshake datagram is either a
//!    fixed template or built from caller key material ([`handshake`]).
//! 3. **Probing**: a bounded worker pool issues UDP round trips per
//!    endpoint ([`scanner`]).
//! 4. **Aggregation**: alive endpoints are collected, ranked and filtered
//!    ([`report`]), then exported ([`output`]).
//!
//! ## Basic Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use warpscan::address::build_candidates;
//! use warpscan::handshake::HandshakeCodec;
//! use warpscan::input::Opts;
//! use warpscan::scanner::Scanner;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let opts = Opts {
//!         ip: Some("162.159.192.0/24".to_owned()),
//!         ..Opts::default()
//!     };
//!
//!     let codec = Arc::new(HandshakeCodec::from_opts(&opts)?);
//!     let candidates = build_candidates(&opts)?;
//!
//!     let results = Scanner::new(candidates, codec, &opts).run().await;
//!     for record in results.iter().take(10) {
//!         println!("{} {:?}", record.endpoint(), record.delay());
//!     }
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub mod address;

pub mod handshake;

pub mod input;

pub mod output;

pub mod progress;

pub mod report;

pub mod scanner;
