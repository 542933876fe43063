//! Core functionality for actual probing behaviour.
//!
//! Each candidate endpoint is handed to one worker, which performs
//! `ping_times` sequential handshake round trips over a single UDP socket
//! and reports how many valid replies came back and how long they took.
//! A semaphore of width `routines` is the admission gate: no more than that
//! many workers are in flight at once, and the run blocks until every
//! candidate has been processed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

use crate::handshake::HandshakeCodec;
use crate::input::Opts;
use crate::progress::Bar;
use crate::report::{DelaySet, ResultRecord, ResultStore};

/// Per-attempt I/O budget: socket dial and each read deadline.
const UDP_CONNECT_TIMEOUT: Duration = Duration::from_millis(300);

/// Trial tally for one endpoint. Owned by a single worker, so no locking.
#[derive(Debug, Default)]
struct ProbeOutcome {
    sent: usize,
    received: usize,
    total_delay: Duration,
}

/// The probing engine: runs the candidate list through a bounded worker pool
/// and aggregates alive endpoints into a [`ResultStore`].
#[derive(Debug)]
pub struct Scanner {
    candidates: Vec<SocketAddr>,
    routines: usize,
    ping_times: usize,
    timeout: Duration,
    codec: Arc<HandshakeCodec>,
    greppable: bool,
}

impl Scanner {
    #[must_use]
    pub fn new(candidates: Vec<SocketAddr>, codec: Arc<HandshakeCodec>, opts: &Opts) -> Self {
        Self {
            candidates,
            routines: opts.effective_routines(),
            ping_times: opts.effective_ping_times(),
            timeout: UDP_CONNECT_TIMEOUT,
            codec,
            greppable: opts.greppable,
        }
    }

    /// Probes every candidate and returns the alive endpoints ranked by loss
    /// rate, then delay. An empty candidate list returns an empty set
    /// immediately.
    pub async fn run(&self) -> DelaySet {
        if self.candidates.is_empty() {
            return DelaySet::default();
        }

        debug!(
            "Start probing endpoints. \nRoutines {}\nPing times {}\nCandidates {}",
            self.routines,
            self.ping_times,
            self.candidates.len()
        );

        let store = Arc::new(ResultStore::new());
        let bar = Arc::new(if self.greppable {
            Bar::hidden()
        } else {
            Bar::new(self.candidates.len() as u64)
        });
        let gate = Arc::new(Semaphore::new(self.routines));
        let mut workers = JoinSet::new();

        for &endpoint in &self.candidates {
            let permit = gate
                .clone()
                .acquire_owned()
                .await
                .expect("admission gate closed");
            let codec = Arc::clone(&self.codec);
            let store = Arc::clone(&store);
            let bar = Arc::clone(&bar);
            let ping_times = self.ping_times;
            let timeout = self.timeout;

            workers.spawn(async move {
                let _permit = permit;
                let outcome = probe_endpoint(endpoint, &codec, ping_times, timeout).await;
                if outcome.received > 0 {
                    let average = outcome.total_delay / u32::try_from(outcome.received).unwrap_or(1);
                    store.push(ResultRecord::new(
                        endpoint,
                        outcome.sent,
                        outcome.received,
                        average,
                    ));
                }
                bar.grow(1, store.len().to_string());
            });
        }

        while workers.join_next().await.is_some() {}
        bar.done();

        let mut set = store.take();
        set.sort();
        debug!("Alive endpoints found: {}", set.len());
        set
    }
}

/// Runs all trials for one endpoint over a single socket.
///
/// A dial failure ends the endpoint's work with `sent = 0`; within the trial
/// loop, every failure mode (write error, timeout, read error, rejected
/// content) just means the trial does not count.
async fn probe_endpoint(
    endpoint: SocketAddr,
    codec: &HandshakeCodec,
    ping_times: usize,
    timeout: Duration,
) -> ProbeOutcome {
    let Ok(socket) = dial(endpoint, timeout).await else {
        return ProbeOutcome::default();
    };

    let mut outcome = ProbeOutcome {
        sent: ping_times,
        ..ProbeOutcome::default()
    };
    for _ in 0..ping_times {
        if let Some(delay) = ping_once(&socket, codec, timeout).await {
            outcome.received += 1;
            outcome.total_delay += delay;
        }
    }
    outcome
}

/// Binds a connectionless UDP socket towards the endpoint, bounded by the
/// dial timeout.
async fn dial(endpoint: SocketAddr, timeout: Duration) -> std::io::Result<UdpSocket> {
    let local_addr = match endpoint {
        SocketAddr::V4(_) => "0.0.0.0:0".parse::<SocketAddr>().unwrap(),
        SocketAddr::V6(_) => "[::]:0".parse::<SocketAddr>().unwrap(),
    };

    time::timeout(timeout, async move {
        let socket = UdpSocket::bind(local_addr).await?;
        socket.connect(endpoint).await?;
        Ok(socket)
    })
    .await?
}

/// One handshake round trip: send the probe, wait for a reply within the
/// deadline, run it through the accept predicate.
async fn ping_once(
    socket: &UdpSocket,
    codec: &HandshakeCodec,
    timeout: Duration,
) -> Option<Duration> {
    socket.send(codec.packet()).await.ok()?;
    let start = Instant::now();

    let mut buf = [0u8; 1024];
    let n = time::timeout(timeout, socket.recv(&mut buf))
        .await
        .ok()?
        .ok()?;

    codec.accept(&buf[..n]).then(|| start.elapsed())
}
