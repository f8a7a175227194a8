//! Process-wide license state.
//!
//! The held license is an `Arc<License>` behind a reader/writer lock. Reads
//! clone or borrow the whole value; writes swap the `Arc` wholesale, so a
//! reader sees either the old grant or the new one and never a mix.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use time::OffsetDateTime;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::error::VerificationError;
use super::events::LicenseEvent;
use super::model::{Feature, License, Tier};
use super::verifier::Verifier;

const EVENT_CAPACITY: usize = 64;

pub const MIN_REVALIDATION_INTERVAL: Duration = Duration::from_secs(1);

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Settable clock for simulations and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: time::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock()
    }
}

/// Result of one revalidation step.
#[derive(Debug, Clone)]
pub enum Revalidation {
    /// The key still verifies; the fresh grant is now held.
    Renewed(Arc<License>),
    /// The key no longer verifies and the verified grant it backed was
    /// replaced by Community.
    Demoted(VerificationError),
    /// The key no longer verifies but nothing was dropped: Community was
    /// already in effect, or another license was loaded meanwhile.
    Unchanged(VerificationError),
}

pub struct LicenseManager {
    verifier: Verifier,
    clock: Arc<dyn Clock>,
    state: RwLock<Arc<License>>,
    events: broadcast::Sender<LicenseEvent>,
}

impl std::fmt::Debug for LicenseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current();
        f.debug_struct("LicenseManager")
            .field("license_id", &current.id())
            .field("tier", &current.tier())
            .finish_non_exhaustive()
    }
}

impl LicenseManager {
    pub fn new(verifier: Verifier) -> Self {
        Self::with_clock(verifier, Arc::new(SystemClock))
    }

    /// Starts out holding the Community default.
    pub fn with_clock(verifier: Verifier, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            verifier,
            clock,
            state: RwLock::new(Arc::new(License::community())),
            events,
        }
    }

    /// Verify `key` and, on success, make it the held license. On failure the
    /// held license is left untouched and the error is returned to the caller.
    pub fn load_license(&self, key: &str) -> Result<Arc<License>, VerificationError> {
        let license = Arc::new(self.verifier.verify(key, self.clock.now())?);
        self.replace(Arc::clone(&license));
        info!(license_id = %license.id(), tier = %license.tier(), "license loaded");
        self.emit(LicenseEvent::in_effect(&license));
        Ok(license)
    }

    pub fn set_community_edition(&self) {
        let community = Arc::new(License::community());
        self.replace(Arc::clone(&community));
        info!(tier = %community.tier(), "running as Community edition");
        self.emit(LicenseEvent::in_effect(&community));
    }

    /// Snapshot of the held license, for callers that read several fields.
    pub fn current(&self) -> Arc<License> {
        Arc::clone(&self.state.read())
    }

    pub fn has_feature(&self, feature: &Feature) -> bool {
        self.state.read().has_feature(feature)
    }

    pub fn tier(&self) -> Tier {
        self.state.read().tier()
    }

    pub fn check_limit(&self, name: &str, usage: u64) -> bool {
        self.state.read().check_limit(name, usage)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LicenseEvent> {
        self.events.subscribe()
    }

    /// Run a single revalidation of `key` against the current clock.
    ///
    /// A failure demotes to Community only if the license held when the check
    /// started is still held and is not the Community default.
    pub fn revalidate(&self, key: &str) -> Revalidation {
        let held = self.current();
        match self.verifier.verify(key, self.clock.now()) {
            Ok(license) => {
                let license = Arc::new(license);
                let previous = self.replace(Arc::clone(&license));
                if previous.is_community() || previous.id() != license.id() {
                    info!(license_id = %license.id(), tier = %license.tier(), "license loaded");
                    self.emit(LicenseEvent::in_effect(&license));
                } else {
                    debug!(license_id = %license.id(), "license revalidated");
                }
                Revalidation::Renewed(license)
            }
            Err(err) => {
                let demoted = self.demote_if_held(&held);
                let tier = if demoted { Tier::Free } else { self.tier() };
                warn!(
                    license_id = %held.id(),
                    tier = %tier,
                    reason = err.kind(),
                    "license revalidation failed"
                );
                self.emit(LicenseEvent::RevalidationFailed {
                    license_id: held.id().to_string(),
                    tier,
                    reason: err.kind(),
                });
                if demoted {
                    warn!(license_id = %held.id(), tier = %Tier::Free, "license demoted to Community edition");
                    self.emit(LicenseEvent::LicenseDemoted {
                        license_id: held.id().to_string(),
                        tier: Tier::Free,
                    });
                    Revalidation::Demoted(err)
                } else {
                    Revalidation::Unchanged(err)
                }
            }
        }
    }

    /// Re-run [`revalidate`](Self::revalidate) every `interval` on the tokio
    /// runtime until the returned handle is stopped or dropped. The first
    /// check happens one interval from now. Intervals below one second are
    /// raised to one second.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_periodic_revalidation(
        self: &Arc<Self>,
        key: impl Into<String>,
        interval: Duration,
    ) -> RevalidationHandle {
        let interval = interval.max(MIN_REVALIDATION_INTERVAL);
        let key = key.into();
        let manager = Arc::clone(self);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        manager.revalidate(&key);
                    }
                }
            }
            debug!("license revalidation stopped");
        });
        debug!(interval_secs = interval.as_secs(), "license revalidation started");

        RevalidationHandle { stop: stop_tx, task }
    }

    /// Swap in Community if `held` is still the license in effect and is a
    /// verified grant. Returns whether the swap happened.
    fn demote_if_held(&self, held: &Arc<License>) -> bool {
        let mut state = self.state.write();
        if state.is_community() || !Arc::ptr_eq(&*state, held) {
            return false;
        }
        *state = Arc::new(License::community());
        true
    }

    fn replace(&self, license: Arc<License>) -> Arc<License> {
        std::mem::replace(&mut *self.state.write(), license)
    }

    fn emit(&self, event: LicenseEvent) {
        // No subscribers is the normal case outside the audit stream.
        let _ = self.events.send(event);
    }
}

/// Stop handle for the background revalidation task. Dropping it also stops
/// the task; the held license stays in effect either way.
#[derive(Debug)]
pub struct RevalidationHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RevalidationHandle {
    /// Signal the task and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "license revalidation task ended abnormally");
        }
    }
}
