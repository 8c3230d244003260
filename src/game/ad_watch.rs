use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::player::{PlaybackState, PlayerProbe, PlayerSample};
use crate::session::SessionActorMessage;

/// Sampling period of the ad-detection poller.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(100);

/// Time continuously spent in ad-like state before the blur visual kicks in.
pub const BLUR_DELAY: Duration = Duration::from_secs(6);

/// Presentation flags derived from the ad heuristic. `shrink` collapses the
/// player to its small layout, `blur` additionally blurs it after the ad has
/// been running for a while.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdPresentation {
    pub shrink: bool,
    pub blur: bool,
}

/// Best-effort classifier for "the player is showing an ad right now".
///
/// There is no authoritative ad signal; the heuristic is that the player
/// reports `unstarted` while its playback position is already past zero,
/// which is what a pre-roll or mid-roll ad looks like from the outside.
/// Clock and player source are injected so tests can drive the machine with
/// synthetic samples.
#[derive(Debug, Default)]
pub struct AdDetector {
    entered_ad_at: Option<Instant>,
    presentation: AdPresentation,
}

impl AdDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sample: &PlayerSample, now: Instant) -> AdPresentation {
        let ad_like =
            sample.state == PlaybackState::Unstarted && sample.position_seconds > 0.0;

        if ad_like {
            let entered = *self.entered_ad_at.get_or_insert(now);
            self.presentation = AdPresentation {
                shrink: true,
                blur: now.duration_since(entered) >= BLUR_DELAY,
            };
        } else {
            self.entered_ad_at = None;
            self.presentation = AdPresentation::default();
        }

        self.presentation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdWatchEvent {
    PresentationChanged {
        generation: u64,
        presentation: AdPresentation,
    },
    PlaybackEnded {
        generation: u64,
    },
}

/// A running ad-detection poller, scoped to one question's playback.
///
/// At most one watch is alive per session: the session actor drops the
/// previous watch before spawning the next, and dropping aborts the
/// sampling task. Events carry the watch generation so anything still
/// queued from an aborted watch can be discarded.
#[derive(Debug)]
pub struct AdWatch {
    generation: u64,
    task: JoinHandle<()>,
}

impl AdWatch {
    pub fn spawn(
        generation: u64,
        probe: Arc<dyn PlayerProbe>,
        events: mpsc::Sender<SessionActorMessage>,
    ) -> Self {
        let task = tokio::spawn(run_ad_watch(generation, probe, events));
        Self { generation, task }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for AdWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_ad_watch(
    generation: u64,
    probe: Arc<dyn PlayerProbe>,
    events: mpsc::Sender<SessionActorMessage>,
) {
    let mut detector = AdDetector::new();
    let mut last_sent = AdPresentation::default();

    let mut ticker = tokio::time::interval(SAMPLE_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::debug!(watch.generation = generation, "Ad watch started");

    loop {
        ticker.tick().await;

        let sample = match probe.sample().await {
            Ok(sample) => sample,
            Err(err) => {
                // Player not queryable yet; skip this tick, never bail.
                tracing::trace!(
                    watch.generation = generation,
                    error = %err,
                    "Player probe unavailable, skipping tick"
                );
                continue;
            }
        };

        if sample.state == PlaybackState::Ended {
            tracing::debug!(watch.generation = generation, "Playback ended, stopping watch");
            let _ = events
                .send(SessionActorMessage::AdWatch(AdWatchEvent::PlaybackEnded {
                    generation,
                }))
                .await;
            break;
        }

        let presentation = detector.observe(&sample, Instant::now());
        if presentation != last_sent {
            last_sent = presentation;
            let event = AdWatchEvent::PresentationChanged {
                generation,
                presentation,
            };
            if events
                .send(SessionActorMessage::AdWatch(event))
                .await
                .is_err()
            {
                tracing::debug!(
                    watch.generation = generation,
                    "Session actor gone, stopping watch"
                );
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerError;
    use std::sync::Mutex;

    fn sample(state: PlaybackState, position_seconds: f64) -> PlayerSample {
        PlayerSample {
            state,
            position_seconds,
        }
    }

    #[test]
    fn unstarted_with_progress_is_ad_like() {
        let mut detector = AdDetector::new();
        let t0 = Instant::now();

        let presentation = detector.observe(&sample(PlaybackState::Unstarted, 5.0), t0);
        assert_eq!(
            presentation,
            AdPresentation {
                shrink: true,
                blur: false
            }
        );
    }

    #[test]
    fn unstarted_at_position_zero_is_content() {
        let mut detector = AdDetector::new();
        let t0 = Instant::now();

        let presentation = detector.observe(&sample(PlaybackState::Unstarted, 0.0), t0);
        assert_eq!(presentation, AdPresentation::default());
    }

    #[test]
    fn blur_asserts_only_after_six_seconds_in_ad_state() {
        let mut detector = AdDetector::new();
        let t0 = Instant::now();

        // 100 ms ticks, ad-like throughout.
        for tick in 0..60 {
            let now = t0 + SAMPLE_PERIOD * tick;
            let presentation = detector.observe(&sample(PlaybackState::Unstarted, 5.0), now);
            assert!(presentation.shrink);
            assert!(!presentation.blur, "blur asserted too early at tick {tick}");
        }

        let presentation =
            detector.observe(&sample(PlaybackState::Unstarted, 12.0), t0 + BLUR_DELAY);
        assert!(presentation.shrink);
        assert!(presentation.blur);
    }

    #[test]
    fn any_other_state_resets_to_content_and_clears_elapsed() {
        let mut detector = AdDetector::new();
        let t0 = Instant::now();

        for tick in 0..30 {
            detector.observe(&sample(PlaybackState::Unstarted, 5.0), t0 + SAMPLE_PERIOD * tick);
        }
        let presentation =
            detector.observe(&sample(PlaybackState::Playing, 5.0), t0 + SAMPLE_PERIOD * 30);
        assert_eq!(presentation, AdPresentation::default());

        // Re-entering ad-like state starts a fresh elapsed window: no blur
        // right before the six-second mark even though the first stint plus
        // this one exceed it combined.
        let reentry = t0 + SAMPLE_PERIOD * 31;
        detector.observe(&sample(PlaybackState::Unstarted, 7.0), reentry);
        let presentation = detector.observe(
            &sample(PlaybackState::Unstarted, 9.0),
            reentry + BLUR_DELAY - Duration::from_millis(100),
        );
        assert!(presentation.shrink);
        assert!(!presentation.blur);
    }

    struct ScriptedProbe {
        samples: Mutex<Vec<PlayerSample>>,
    }

    impl ScriptedProbe {
        fn new(mut samples: Vec<PlayerSample>) -> Self {
            samples.reverse();
            Self {
                samples: Mutex::new(samples),
            }
        }
    }

    #[async_trait::async_trait]
    impl PlayerProbe for ScriptedProbe {
        async fn sample(&self) -> Result<PlayerSample, PlayerError> {
            let mut samples = self.samples.lock().unwrap();
            match samples.len() {
                0 => Err(PlayerError::NotReady),
                1 => Ok(samples[0]),
                _ => Ok(samples.pop().unwrap()),
            }
        }
    }

    fn expect_ad_event(message: Option<SessionActorMessage>) -> AdWatchEvent {
        match message {
            Some(SessionActorMessage::AdWatch(event)) => event,
            other => panic!("expected an ad watch event, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn watch_emits_shrink_then_blur() {
        let probe = Arc::new(ScriptedProbe::new(vec![sample(
            PlaybackState::Unstarted,
            5.0,
        )]));
        let (tx, mut rx) = mpsc::channel(32);
        let _watch = AdWatch::spawn(1, probe, tx);

        let first = expect_ad_event(rx.recv().await);
        assert_eq!(
            first,
            AdWatchEvent::PresentationChanged {
                generation: 1,
                presentation: AdPresentation {
                    shrink: true,
                    blur: false
                }
            }
        );

        let second = expect_ad_event(rx.recv().await);
        assert_eq!(
            second,
            AdWatchEvent::PresentationChanged {
                generation: 1,
                presentation: AdPresentation {
                    shrink: true,
                    blur: true
                }
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn watch_reports_playback_end_and_stops() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            sample(PlaybackState::Playing, 10.0),
            sample(PlaybackState::Ended, 95.0),
        ]));
        let (tx, mut rx) = mpsc::channel(32);
        let _watch = AdWatch::spawn(2, probe, tx);

        let event = expect_ad_event(rx.recv().await);
        assert_eq!(event, AdWatchEvent::PlaybackEnded { generation: 2 });
        // Task breaks out of its loop afterwards, dropping the sender.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_skip_ticks_without_killing_the_watch() {
        let probe = Arc::new(ScriptedProbe::new(vec![]));
        let (tx, mut rx) = mpsc::channel(32);
        let _watch = AdWatch::spawn(3, probe, tx);

        // Every tick errors; nothing must be emitted and the task must stay
        // alive (the sender is still open after plenty of virtual time).
        let waited = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(waited.is_err(), "no events expected from a mute probe");
    }
}
