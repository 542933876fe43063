//! Thread-safe collection of alive probe outcomes, plus post-run ranking
//! and threshold filtering.

use std::cmp::Ordering;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::input::{MAX_DELAY, MAX_LOSS_RATE, MIN_DELAY};

/// One alive endpoint: how many trials were sent, how many valid replies came
/// back, and the average round-trip delay.
#[derive(Debug)]
pub struct ResultRecord {
    endpoint: SocketAddr,
    sent: usize,
    received: usize,
    delay: Duration,
    loss_rate: OnceCell<f32>,
}

impl ResultRecord {
    #[must_use]
    pub fn new(endpoint: SocketAddr, sent: usize, received: usize, delay: Duration) -> Self {
        Self {
            endpoint,
            sent,
            received,
            delay,
            loss_rate: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    #[must_use]
    pub fn sent(&self) -> usize {
        self.sent
    }

    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Average round-trip delay over the trials that received a valid reply.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Fraction of trials with no valid reply, computed on first read and
    /// cached.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn loss_rate(&self) -> f32 {
        *self
            .loss_rate
            .get_or_init(|| (self.sent - self.received) as f32 / self.sent as f32)
    }

    /// The tuple shape the CSV and console layers depend on:
    /// `address:port`, integer percent loss, delay in ms with 2 decimals.
    #[must_use]
    pub fn to_row(&self) -> [String; 3] {
        [
            self.endpoint.to_string(),
            format!("{:.0}%", f64::from(self.loss_rate()) * 100.0),
            format!("{:.2}", self.delay.as_secs_f64() * 1000.0),
        ]
    }
}

/// An ordered set of alive endpoints with ranking and filtering.
#[derive(Debug, Default)]
pub struct DelaySet(Vec<ResultRecord>);

impl DelaySet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRecord> {
        self.0.iter()
    }

    /// Ranks by ascending loss rate, then ascending average delay.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| {
            a.loss_rate()
                .partial_cmp(&b.loss_rate())
                .unwrap_or(Ordering::Equal)
                .then(a.delay().cmp(&b.delay()))
        });
    }

    /// Keeps records whose delay lies within `[min, max]`.
    ///
    /// Evaluated as a per-element predicate over the whole set: the ranking's
    /// primary key is loss rate, so the set is not delay-sorted and early
    /// exit on the first delay above `max` would drop valid records.
    #[must_use]
    pub fn filter_delay(self, min: Duration, max: Duration) -> Self {
        if max > MAX_DELAY {
            return self;
        }
        if max == MAX_DELAY && min == MIN_DELAY {
            return self;
        }
        Self(
            self.0
                .into_iter()
                .filter(|record| record.delay() >= min && record.delay() <= max)
                .collect(),
        )
    }

    /// Keeps records with a loss rate at or below `ceiling` (inclusive).
    #[must_use]
    pub fn filter_loss_rate(self, ceiling: f32) -> Self {
        if ceiling >= MAX_LOSS_RATE {
            return self;
        }
        Self(
            self.0
                .into_iter()
                .filter(|record| record.loss_rate() <= ceiling)
                .collect(),
        )
    }
}

impl IntoIterator for DelaySet {
    type Item = ResultRecord;
    type IntoIter = std::vec::IntoIter<ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Mutex-guarded append-only store shared by the probe workers. One insertion
/// per alive endpoint; dead endpoints never reach it.
#[derive(Debug, Default)]
pub struct ResultStore {
    records: Mutex<Vec<ResultRecord>>,
}

impl ResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: ResultRecord) {
        self.records.lock().expect("result store poisoned").push(record);
    }

    /// Number of alive endpoints collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().expect("result store poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains the store into a set for ranking and filtering. Works through a
    /// shared reference so workers may still hold clones of the surrounding
    /// `Arc`.
    #[must_use]
    pub fn take(&self) -> DelaySet {
        DelaySet(std::mem::take(
            &mut *self.records.lock().expect("result store poisoned"),
        ))
    }
}
