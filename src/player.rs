use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Playback states reported by the embedded video player. Mirrors the
/// state set of the YouTube IFrame API, which the browser client relays
/// verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Unstarted,
    Playing,
    Paused,
    Ended,
    Buffering,
    Cued,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSample {
    pub state: PlaybackState,
    pub position_seconds: f64,
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("player has not reported any status yet")]
    NotReady,
}

/// Read-side of the external video player. The ad-detection sampler only
/// ever consumes this surface; playback control stays with the client that
/// owns the actual player instance.
#[async_trait]
pub trait PlayerProbe: Send + Sync {
    async fn sample(&self) -> Result<PlayerSample, PlayerError>;
}

/// Player status as last reported over the session socket. Cleared whenever
/// a new video starts loading so stale reports from the previous question
/// are never sampled.
#[derive(Debug, Default)]
pub struct ReportedPlayer {
    latest: RwLock<Option<PlayerSample>>,
}

impl ReportedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn report(&self, sample: PlayerSample) {
        *self.latest.write().await = Some(sample);
    }

    pub async fn clear(&self) {
        *self.latest.write().await = None;
    }
}

#[async_trait]
impl PlayerProbe for ReportedPlayer {
    async fn sample(&self) -> Result<PlayerSample, PlayerError> {
        (*self.latest.read().await).ok_or(PlayerError::NotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sampling_before_any_report_is_not_ready() {
        let player = ReportedPlayer::new();
        assert!(matches!(player.sample().await, Err(PlayerError::NotReady)));
    }

    #[tokio::test]
    async fn sampling_returns_latest_report() {
        let player = ReportedPlayer::new();
        player
            .report(PlayerSample {
                state: PlaybackState::Playing,
                position_seconds: 12.5,
            })
            .await;
        player
            .report(PlayerSample {
                state: PlaybackState::Paused,
                position_seconds: 13.0,
            })
            .await;

        let sample = player.sample().await.unwrap();
        assert_eq!(sample.state, PlaybackState::Paused);
        assert_eq!(sample.position_seconds, 13.0);
    }

    #[tokio::test]
    async fn clearing_discards_previous_reports() {
        let player = ReportedPlayer::new();
        player
            .report(PlayerSample {
                state: PlaybackState::Playing,
                position_seconds: 1.0,
            })
            .await;
        player.clear().await;
        assert!(matches!(player.sample().await, Err(PlayerError::NotReady)));
    }
}
