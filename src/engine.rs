//! Narration engine contract and the default paced adapter.
//!
//! The engine is event-driven: it acknowledges `speak` immediately and
//! reports utterance lifecycle (started/finished/failed/paused/resumed) on
//! an mpsc channel handed over at construction. Events carry the session id
//! and segment order so the controller can discard late callbacks from
//! superseded sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::voices::VoiceBinding;

/// One segment handed to the engine as an atomic unit.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub session: u64,
    pub order: usize,
    pub text: String,
    pub voice: VoiceBinding,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEventKind {
    Started,
    Finished,
    Failed,
    Paused,
    Resumed,
}

#[derive(Debug, Clone)]
pub struct EngineEvent {
    pub session: u64,
    pub order: usize,
    pub kind: EngineEventKind,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine rejected utterance: {0}")]
    Rejected(String),
}

/// External speech-synthesis backend. `pause`/`resume`/`cancel` act on the
/// currently-speaking utterance only.
#[async_trait]
pub trait NarrationEngine: Send + Sync {
    async fn speak(&self, utterance: Utterance) -> Result<(), EngineError>;
    async fn pause(&self);
    async fn resume(&self);
    async fn cancel(&self);
}

struct ActiveUtterance {
    session: u64,
    order: usize,
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

/// Timing-based engine: emits the full lifecycle without producing audio,
/// pacing itself by text length. Lets the service run headless; platform
/// synthesizers implement the same trait.
pub struct PacedEngine {
    events: mpsc::Sender<EngineEvent>,
    millis_per_char: u64,
    current: Mutex<Option<ActiveUtterance>>,
}

impl PacedEngine {
    pub fn new(events: mpsc::Sender<EngineEvent>, millis_per_char: u64) -> Self {
        Self {
            events,
            millis_per_char,
            current: Mutex::new(None),
        }
    }

    fn take_current(&self) -> Option<ActiveUtterance> {
        self.current.lock().unwrap().take()
    }
}

#[async_trait]
impl NarrationEngine for PacedEngine {
    async fn speak(&self, utterance: Utterance) -> Result<(), EngineError> {
        // One utterance at a time: a new speak supersedes the old one.
        if let Some(previous) = self.take_current() {
            previous.cancelled.store(true, Ordering::Relaxed);
        }

        let paused = Arc::new(AtomicBool::new(false));
        let cancelled = Arc::new(AtomicBool::new(false));
        *self.current.lock().unwrap() = Some(ActiveUtterance {
            session: utterance.session,
            order: utterance.order,
            paused: paused.clone(),
            cancelled: cancelled.clone(),
        });

        let events = self.events.clone();
        let rate = if utterance.rate > 0.0 { utterance.rate } else { 1.0 };
        let chars = utterance.text.chars().count() as u64;
        let total = Duration::from_millis(
            40 + (chars as f64 * self.millis_per_char as f64 / rate as f64) as u64,
        );

        debug!(
            "Pacing segment {} of session {} for {:?} ({chars} chars, voice '{}')",
            utterance.order, utterance.session, total, utterance.voice.voice_name
        );

        tokio::spawn(async move {
            let started = EngineEvent {
                session: utterance.session,
                order: utterance.order,
                kind: EngineEventKind::Started,
            };
            if events.send(started).await.is_err() {
                return;
            }

            let tick = Duration::from_millis(25);
            let mut remaining = total;
            loop {
                if cancelled.load(Ordering::Relaxed) {
                    // Cancellation produces no completion event.
                    return;
                }
                if !paused.load(Ordering::Relaxed) {
                    if remaining <= tick {
                        break;
                    }
                    remaining -= tick;
                }
                tokio::time::sleep(tick).await;
            }

            let finished = EngineEvent {
                session: utterance.session,
                order: utterance.order,
                kind: EngineEventKind::Finished,
            };
            if events.send(finished).await.is_err() {
                warn!("Engine event channel closed mid-utterance");
            }
        });

        Ok(())
    }

    async fn pause(&self) {
        let ids = {
            let current = self.current.lock().unwrap();
            current.as_ref().map(|c| {
                c.paused.store(true, Ordering::Relaxed);
                (c.session, c.order)
            })
        };
        if let Some((session, order)) = ids {
            let _ = self
                .events
                .send(EngineEvent {
                    session,
                    order,
                    kind: EngineEventKind::Paused,
                })
                .await;
        }
    }

    async fn resume(&self) {
        let ids = {
            let current = self.current.lock().unwrap();
            current.as_ref().map(|c| {
                c.paused.store(false, Ordering::Relaxed);
                (c.session, c.order)
            })
        };
        if let Some((session, order)) = ids {
            let _ = self
                .events
                .send(EngineEvent {
                    session,
                    order,
                    kind: EngineEventKind::Resumed,
                })
                .await;
        }
    }

    async fn cancel(&self) {
        if let Some(current) = self.take_current() {
            current.cancelled.store(true, Ordering::Relaxed);
            debug!(
                "Cancelled utterance {} of session {}",
                current.order, current.session
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(session: u64, order: usize, text: &str) -> Utterance {
        Utterance {
            session,
            order,
            text: text.into(),
            voice: VoiceBinding {
                language: "en-US".into(),
                voice_id: "v1".into(),
                voice_name: "Test Voice".into(),
            },
            rate: 1.0,
            pitch: 1.0,
            volume: 0.9,
        }
    }

    #[tokio::test]
    async fn paced_engine_reports_started_then_finished() {
        let (tx, mut rx) = mpsc::channel(8);
        let engine = PacedEngine::new(tx, 1);
        engine.speak(utterance(1, 0, "hi")).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EngineEventKind::Started);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, EngineEventKind::Finished);
        assert_eq!(second.session, 1);
        assert_eq!(second.order, 0);
    }

    #[tokio::test]
    async fn cancel_suppresses_completion() {
        let (tx, mut rx) = mpsc::channel(8);
        let engine = PacedEngine::new(tx, 50);
        engine.speak(utterance(2, 0, &"long text ".repeat(20))).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, EngineEventKind::Started);
        engine.cancel().await;

        // No Finished should arrive for the cancelled utterance.
        let outcome =
            tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(outcome.is_err(), "unexpected event after cancel: {outcome:?}");
    }

    #[tokio::test]
    async fn pause_and_resume_emit_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let engine = PacedEngine::new(tx, 50);
        engine.speak(utterance(3, 1, &"text ".repeat(30))).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, EngineEventKind::Started);

        engine.pause().await;
        assert_eq!(rx.recv().await.unwrap().kind, EngineEventKind::Paused);
        engine.resume().await;
        assert_eq!(rx.recv().await.unwrap().kind, EngineEventKind::Resumed);

        engine.cancel().await;
    }
}
