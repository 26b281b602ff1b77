//!
//! Client half of the sync protocol: the pull/push round against one
//! server, and the scheduler pacing it between periodic runs, change
//! notifications and failures.

use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use reqwest::Certificate;

use crate::bucket::LeakyBucket;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::merge;
use crate::store::{LockFile, Store};
use crate::types::OffsetMap;

use super::{PullRequest, PullResponse, PushRequest};

pub const SYNC_PERIODIC_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const SYNC_DELAY: Duration = Duration::from_secs(10);
pub const SYNC_RETRY_DELAY: Duration = Duration::from_secs(30);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Sync attempts per refill interval the bucket lets through.
const BUCKET_CAPACITY: u32 = 3;
const BUCKET_REFILL_INTERVAL: Duration = Duration::from_secs(60);

pub struct SyncClient {
    http: Client,
    config: SyncConfig,
}

impl SyncClient {
    /// Build the HTTP client: pinned trust anchor, fixed request
    /// timeout.
    pub fn new(config: SyncConfig, certificate_pem: &[u8]) -> Result<Self, SyncError> {
        let http = Client::builder()
            .add_root_certificate(Certificate::from_pem(certificate_pem)?)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, op: &str) -> String {
        format!(
            "https://{}:{}/gtd/{}/{}",
            self.config.host, self.config.port, self.config.sync_auth, op
        )
    }

    /// One full round: pull what we lack and graft it, then push what
    /// the server lacks. The exclusive lock is held only around the
    /// graft, never across network I/O; a timeout or connection error
    /// aborts the round with no local mutation.
    pub fn sync(&self, store: &Store, lock: &LockFile) -> Result<(), SyncError> {
        let local_offs = {
            let _guard = lock.shared()?;
            store.offsets()?
        };

        tracing::debug!("sync: pull");
        let response = self
            .http
            .post(self.url("pull"))
            .json(&PullRequest { offs: local_offs })
            .send()?;
        let remote: PullResponse = checked(response)?.json()?;

        if !remote.data.is_empty() {
            tracing::debug!("sync: new data from pull");
            let _guard = lock.exclusive()?;
            let local_offs = store.offsets()?;
            if !merge::is_gapless(&local_offs, &remote.data) {
                return Err(SyncError::Gap);
            }
            merge::insert_data(store, &local_offs, &remote.data)?;
        }

        // fresh snapshot: the graft above moved our offsets
        let missing = {
            let _guard = lock.shared()?;
            let local_offs = store.offsets()?;
            merge::missing_data(store, &local_offs, &remote.offs)?
        };
        if missing.is_empty() {
            tracing::debug!("sync: no push needed");
            return Ok(());
        }

        tracing::debug!("sync: push");
        let response = self
            .http
            .post(self.url("push"))
            .json(&PushRequest { data: missing })
            .send()?;
        checked(response)?;
        Ok(())
    }
}

fn checked(response: Response) -> Result<Response, SyncError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(SyncError::Http(response.status().as_u16()))
    }
}

/// Decides when the next sync attempt runs. Periodic runs every
/// [`SYNC_PERIODIC_INTERVAL`]; a change notification pulls the next run
/// in to the debounce delay, or to immediately when the offsets did not
/// actually move; failures retry after [`SYNC_RETRY_DELAY`]. A leaky
/// bucket keeps notification storms from re-entering sync faster than
/// its refill rate.
#[derive(Debug)]
pub struct Scheduler {
    next_sync: Instant,
    last_offsets: OffsetMap,
    bucket: LeakyBucket,
}

impl Scheduler {
    /// A scheduler whose first sync is due immediately.
    pub fn new(now: Instant) -> Self {
        Self {
            next_sync: now,
            last_offsets: OffsetMap::new(),
            bucket: LeakyBucket::new_at(BUCKET_REFILL_INTERVAL, BUCKET_CAPACITY, now),
        }
    }

    /// Remember the offsets seen at the top of the event loop; change
    /// notifications are judged against them.
    pub fn note_offsets(&mut self, offsets: OffsetMap) {
        self.last_offsets = offsets;
    }

    /// A change notification fired. Notifications carry no trusted
    /// payload; an unchanged snapshot means the event was an echo of a
    /// sync we just did, so run straight away, while fresh bytes wait
    /// out the debounce delay.
    pub fn on_change(&mut self, now: Instant, offsets: &OffsetMap) {
        let delay = if *offsets == self.last_offsets {
            Duration::ZERO
        } else {
            SYNC_DELAY
        };
        self.schedule(now, delay);
    }

    /// Whether an attempt should run now. Consuming from a dry bucket
    /// pushes the attempt out to the retry delay instead.
    pub fn should_sync(&mut self, now: Instant) -> bool {
        if now < self.next_sync {
            return false;
        }
        match self.bucket.consume_at(now) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!("sync rate limited, backing off");
                self.schedule(now, SYNC_RETRY_DELAY);
                false
            }
        }
    }

    /// Record an attempt's outcome and set the next cadence.
    pub fn on_result(&mut self, now: Instant, ok: bool) {
        let delay = if ok {
            SYNC_PERIODIC_INTERVAL
        } else {
            SYNC_RETRY_DELAY
        };
        self.schedule(now, delay);
    }

    /// How long the event loop may sleep before checking in again.
    pub fn timeout(&self, now: Instant) -> Duration {
        self.next_sync.saturating_duration_since(now)
    }

    fn schedule(&mut self, now: Instant, delay: Duration) {
        tracing::debug!(?delay, "scheduling next sync");
        self.next_sync = now + delay;
    }
}
