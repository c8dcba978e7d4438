use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::errors::{DartSightError, DartSightResult};
use crate::oracle::{DetectionRequest, ScoringOracle};
use crate::perception::{Frame, FrameCapture, VideoSource};
use crate::poller::event_bus::{EventBus, PollerEvent};
use crate::poller::state::{LoopState, PollerSettings, ScoreSnapshot, TickOutcome};
use crate::scoring::{parser, HistoryEntry, Journal, ScoreHistory};

/// Periodically compares the latest frame against the previous one through
/// the scoring oracle.
///
/// A call still in flight when the loop is disabled runs to completion but
/// its result is discarded: display and history only change for the
/// session that issued the call.
pub struct ScorePoller {
    shared: Arc<Shared>,
    timer: Mutex<Option<TimerHandle>>,
}

struct TimerHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    source: Arc<dyn VideoSource>,
    oracle: Arc<dyn ScoringOracle>,
    capture: FrameCapture,
    settings: PollerSettings,
    state: Mutex<LoopState>,
    journal: Option<Journal>,
    events: EventBus,
}

/// Releases the busy flag however the tick body exits.
struct BusyGuard<'a> {
    shared: &'a Shared,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock_state().busy = false;
    }
}

impl ScorePoller {
    pub fn new(
        source: Arc<dyn VideoSource>,
        oracle: Arc<dyn ScoringOracle>,
        capture: FrameCapture,
        settings: PollerSettings,
        history: ScoreHistory,
        journal: Option<Journal>,
    ) -> Self {
        let state = LoopState::new(&settings, history);
        Self {
            shared: Arc::new(Shared {
                source,
                oracle,
                capture,
                settings,
                state: Mutex::new(state),
                journal,
                events: EventBus::default(),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        source: Arc<dyn VideoSource>,
        oracle: Arc<dyn ScoringOracle>,
    ) -> Self {
        let journal = config.history.journal.then(|| {
            let journal = Journal::new_session();
            tracing::info!(
                session = %journal.session_id,
                path = %journal.path().display(),
                "history journal enabled"
            );
            journal
        });
        Self::new(
            source,
            oracle,
            FrameCapture::from_config(&config.capture),
            PollerSettings::from_config(&config.poller),
            ScoreHistory::new(config.history.capacity),
            journal,
        )
    }

    /// Start polling. The first tick fires right away and seeds the
    /// reference frame. Must be called from within a tokio runtime.
    pub fn enable(&self) -> DartSightResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DartSightError::Poller(format!("enable requires a tokio runtime: {e}")))?;
        let mut timer = self.lock_timer();
        {
            let mut state = self.shared.lock_state();
            if state.active {
                return Ok(());
            }
            state.active = true;
            state.generation += 1;
        }

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_timer(self.shared.clone(), cancel.clone()));
        *timer = Some(TimerHandle { cancel, handle });

        tracing::info!(
            period_ms = self.shared.settings.period.as_millis() as u64,
            oracle = self.shared.oracle.name(),
            "score polling enabled"
        );
        self.shared.events.publish(PollerEvent::Enabled);
        Ok(())
    }

    /// Stop polling and clear the session state. Does not wait for a tick
    /// body that is already running.
    pub fn disable(&self) {
        let _ = self.stop_timer();
    }

    /// Disable and wait for the timer task to finish.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.stop_timer() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "poller timer task failed to join");
            }
        }
    }

    fn stop_timer(&self) -> Option<JoinHandle<()>> {
        let timer = self.lock_timer().take();
        if let Some(t) = &timer {
            t.cancel.cancel();
        }

        let was_active = {
            let mut state = self.shared.lock_state();
            let was_active = state.active;
            state.tear_down();
            was_active
        };
        if was_active {
            tracing::info!("score polling disabled");
            self.shared.events.publish(PollerEvent::Disabled);
        }
        timer.map(|t| t.handle)
    }

    /// Run one tick body now.
    pub async fn tick(&self) -> TickOutcome {
        self.shared.tick_at(Instant::now()).await
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock_state().active
    }

    pub fn snapshot(&self) -> ScoreSnapshot {
        self.shared.lock_state().snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollerEvent> {
        self.shared.events.subscribe()
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<TimerHandle>> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ScorePoller {
    fn drop(&mut self) {
        if let Some(t) = self.lock_timer().take() {
            t.cancel.cancel();
        }
        self.shared.lock_state().tear_down();
    }
}

async fn run_timer(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(shared.settings.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("poller timer cancelled");
                break;
            }
            at = ticker.tick() => {
                let outcome = shared.tick_at(at).await;
                tracing::trace!(?outcome, "tick finished");
            }
        }
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn tick_at(self: &Arc<Self>, now: Instant) -> TickOutcome {
        let generation = {
            let mut state = self.lock_state();
            if !state.active {
                return TickOutcome::Inactive;
            }
            if state.busy {
                return TickOutcome::Busy;
            }
            if !state.throttle.is_ready(now) {
                return TickOutcome::Throttled;
            }
            state.busy = true;
            state.generation
        };
        let _busy = BusyGuard { shared: self.as_ref() };

        let Some(frame) = self.capture_frame().await else {
            tracing::debug!("frame capture unavailable, skipping tick");
            return TickOutcome::CaptureUnavailable;
        };

        // Invocation time is recorded before the oracle resolves so a slow
        // reply cannot let the next tick through.
        let before = {
            let mut state = self.lock_state();
            if state.generation != generation {
                return TickOutcome::Discarded;
            }
            state.throttle.record(now);
            if let Some(prev) = &state.reference {
                if frame.timestamp() < prev.timestamp() {
                    tracing::warn!(
                        previous = prev.timestamp(),
                        current = frame.timestamp(),
                        "frame timestamp went backwards"
                    );
                }
            }
            state.reference.replace(frame.clone())
        };

        let Some(before) = before else {
            tracing::debug!(timestamp = frame.timestamp(), "reference frame seeded");
            self.events.publish(PollerEvent::Seeded {
                timestamp: frame.timestamp(),
            });
            return TickOutcome::Seeded;
        };

        self.score_pair(generation, &before, &frame).await
    }

    async fn capture_frame(self: &Arc<Self>) -> Option<Frame> {
        let shared = Arc::clone(self);
        match tokio::task::spawn_blocking(move || shared.capture.capture(shared.source.as_ref()))
            .await
        {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "capture worker join failed");
                None
            }
        }
    }

    async fn journal_entry(&self, entry: HistoryEntry) {
        let Some(journal) = self.journal.clone() else {
            return;
        };
        match tokio::task::spawn_blocking(move || journal.append(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "history journal write failed"),
            Err(e) => tracing::warn!(error = %e, "journal worker join failed"),
        }
    }

    async fn score_pair(&self, generation: u64, before: &Frame, after: &Frame) -> TickOutcome {
        let request = DetectionRequest::from_frames(before, after, None);
        tracing::debug!(
            before_ts = before.timestamp(),
            after_ts = after.timestamp(),
            "requesting score"
        );
        let reply = self.oracle.detect(request).await;

        let (result, entry) = {
            let mut state = self.lock_state();
            if state.generation != generation {
                tracing::debug!("loop disabled while oracle call was in flight, discarding result");
                return TickOutcome::Discarded;
            }

            match reply {
                Ok(response) => {
                    let result = parser::resolve(&response, self.settings.max_displayed_darts);
                    let entry = state.apply(&result);
                    drop(state);
                    (result, entry)
                }
                Err(e) => {
                    let message = e.to_string();
                    state.display.last_error = Some(message.clone());
                    drop(state);

                    tracing::warn!(error = %message, "score detection failed");
                    self.events.publish(PollerEvent::DetectionFailed {
                        message: message.clone(),
                    });
                    return TickOutcome::OracleFailed { message };
                }
            }
        };

        if let Some(entry) = entry {
            self.journal_entry(entry).await;
        }

        tracing::info!(
            score = result.primary,
            confidence = result.confidence,
            darts = ?result.darts,
            "score updated"
        );
        let primary = result.primary;
        self.events.publish(PollerEvent::ScoreUpdated { result });
        TickOutcome::Scored { primary }
    }
}
