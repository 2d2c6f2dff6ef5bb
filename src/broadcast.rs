//! Playback controller and session manager.
//!
//! One controller task owns the single current broadcast session and runs a
//! select loop over caller commands, narration engine events, and the
//! pending inter-segment dispatch timer. Starting a new session is the only
//! cancellation mechanism for an old one; late engine callbacks from a
//! superseded or stopped session are discarded by session id.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{BroadcastConfig, SpeechConfig};
use crate::diagnosis::DiagnosisResult;
use crate::engine::{EngineEvent, EngineEventKind, NarrationEngine, Utterance};
use crate::history::{self, BroadcastRecord};
use crate::preparer::{ContentPreparer, PrepareError};
use crate::segmenter::{self, TextSegment};
use crate::voices::{VoiceBinding, VoiceResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Preparing,
    Playing,
    Paused,
    Stopped,
    Completed,
    Error,
}

impl SessionState {
    /// Preparing, Playing or Paused: the session still owns the engine.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Preparing | Self::Playing | Self::Paused)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Preparing => write!(f, "PREPARING"),
            Self::Playing => write!(f, "PLAYING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Observable side effect of a transition: status text, numeric progress,
/// and which control affordance the caller should show.
#[derive(Debug, Clone)]
pub struct BroadcastUpdate {
    pub state: SessionState,
    pub status: String,
    pub current: usize,
    pub total: usize,
    pub show_pause: bool,
    pub show_resume: bool,
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub language: Option<String>,
    pub voice: Option<String>,
    pub current: usize,
    pub total: usize,
}

enum Command {
    Start {
        result: DiagnosisResult,
        language: String,
    },
    Pause,
    Resume,
    Stop,
    Status(oneshot::Sender<StatusSnapshot>),
}

/// Cloneable handle to the controller task. All methods are non-blocking
/// channel sends, safe to call from any task.
#[derive(Clone)]
pub struct BroadcastManager {
    commands: mpsc::Sender<Command>,
}

impl BroadcastManager {
    pub async fn start(&self, result: DiagnosisResult, language: &str) {
        let _ = self
            .commands
            .send(Command::Start {
                result,
                language: language.to_string(),
            })
            .await;
    }

    pub async fn pause(&self) {
        let _ = self.commands.send(Command::Pause).await;
    }

    pub async fn resume(&self) {
        let _ = self.commands.send(Command::Resume).await;
    }

    pub async fn stop(&self) {
        let _ = self.commands.send(Command::Stop).await;
    }

    pub async fn status(&self) -> Option<StatusSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Status(tx)).await.ok()?;
        rx.await.ok()
    }
}

struct Session {
    id: u64,
    language: String,
    segments: Vec<TextSegment>,
    current: usize,
    state: SessionState,
    voice: Option<VoiceBinding>,
    spoken: usize,
    failed: usize,
    started_at: std::time::Instant,
}

impl Session {
    fn idle() -> Self {
        Self {
            id: 0,
            language: String::new(),
            segments: Vec::new(),
            current: 0,
            state: SessionState::Idle,
            voice: None,
            spoken: 0,
            failed: 0,
            started_at: std::time::Instant::now(),
        }
    }
}

struct PendingDispatch {
    session: u64,
    index: usize,
    at: Instant,
}

struct Controller {
    broadcast: BroadcastConfig,
    speech: SpeechConfig,
    preparer: ContentPreparer,
    resolver: VoiceResolver,
    engine: Arc<dyn NarrationEngine>,
    updates: mpsc::Sender<BroadcastUpdate>,
    session: Session,
    pending: Option<PendingDispatch>,
    next_id: u64,
}

/// Spawn the controller task. Returns the caller handle and the stream of
/// status/progress updates.
pub fn spawn(
    broadcast: BroadcastConfig,
    speech: SpeechConfig,
    preparer: ContentPreparer,
    resolver: VoiceResolver,
    engine: Arc<dyn NarrationEngine>,
    engine_events: mpsc::Receiver<EngineEvent>,
) -> (BroadcastManager, mpsc::Receiver<BroadcastUpdate>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (update_tx, update_rx) = mpsc::channel(64);

    let controller = Controller {
        broadcast,
        speech,
        preparer,
        resolver,
        engine,
        updates: update_tx,
        session: Session::idle(),
        pending: None,
        next_id: 0,
    };

    tokio::spawn(controller.run(cmd_rx, engine_events));

    (BroadcastManager { commands: cmd_tx }, update_rx)
}

impl Controller {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<EngineEvent>,
    ) {
        info!("Broadcast controller ready");

        loop {
            // The dispatch timer is only armed while Playing; a pause parks
            // the pending segment until resume.
            let deadline = if self.session.state == SessionState::Playing {
                self.pending.as_ref().map(|p| p.at)
            } else {
                None
            };

            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                event = events.recv() => match event {
                    Some(event) => self.handle_engine_event(event).await,
                    None => {
                        warn!("Engine event channel closed, shutting down controller");
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_pending().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { result, language } => self.start(result, language).await,
            Command::Pause => self.pause().await,
            Command::Resume => self.resume().await,
            Command::Stop => self.stop().await,
            Command::Status(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Begin a fresh session, superseding any active one.
    async fn start(&mut self, result: DiagnosisResult, language: String) {
        if self.session.state.is_active() {
            info!(
                "Session {}: superseded by new broadcast request",
                self.session.id
            );
            self.stop().await;
        }

        self.resolver.clear_cache();
        self.next_id += 1;
        let id = self.next_id;
        self.session = Session {
            id,
            language: language.clone(),
            ..Session::idle()
        };
        self.session.state = SessionState::Preparing;
        self.emit("Preparing narration content").await;
        info!("Session {id}: preparing narration in '{language}'");

        let text = match self.preparer.prepare(&result, &language).await {
            Ok(text) => text,
            Err(PrepareError::EmptyContent) => {
                self.fail("Nothing to narrate: diagnosis result is empty")
                    .await;
                return;
            }
        };

        let segments = segmenter::segment(&text, self.broadcast.max_segment_chars);
        if segments.is_empty() {
            self.fail("Nothing to narrate: diagnosis result is empty")
                .await;
            return;
        }

        let voice = match self.resolver.select(id, &language).await {
            Ok(voice) => voice,
            Err(e) => {
                self.fail(&format!("No synthesis voice available: {e}")).await;
                return;
            }
        };

        info!(
            "Session {id}: {} segment(s), voice '{}'",
            segments.len(),
            voice.voice_name
        );
        self.session.segments = segments;
        self.session.voice = Some(voice);
        self.session.state = SessionState::Playing;
        self.dispatch(0).await;
    }

    async fn pause(&mut self) {
        if self.session.state != SessionState::Playing {
            debug!("pause ignored in state {}", self.session.state);
            return;
        }
        self.engine.pause().await;
        self.session.state = SessionState::Paused;
        self.emit("Narration paused").await;
        info!("Session {}: PLAYING → PAUSED", self.session.id);
    }

    async fn resume(&mut self) {
        if self.session.state != SessionState::Paused {
            debug!("resume ignored in state {}", self.session.state);
            return;
        }
        self.engine.resume().await;
        self.session.state = SessionState::Playing;
        // A segment parked during the inter-segment gap goes out now.
        if let Some(pending) = self.pending.as_mut() {
            pending.at = Instant::now();
        }
        self.emit(&format!(
            "Resuming segment {}/{}",
            self.session.current + 1,
            self.session.segments.len()
        ))
        .await;
        info!("Session {}: PAUSED → PLAYING", self.session.id);
    }

    async fn stop(&mut self) {
        if !self.session.state.is_active() {
            debug!("stop ignored in state {}", self.session.state);
            return;
        }
        self.engine.cancel().await;
        info!("Session {}: stopped", self.session.id);
        self.finish(SessionState::Stopped, "Narration stopped").await;
    }

    /// Hand one segment to the engine. An immediate rejection is treated
    /// like a segment failure: skip and continue.
    async fn dispatch(&mut self, index: usize) {
        self.session.current = index;
        let Some(voice) = self.session.voice.clone() else {
            return;
        };
        let segment = &self.session.segments[index];
        let pitch = if voice.is_quality_voice() {
            self.speech.quality_voice_pitch
        } else {
            self.speech.pitch
        };

        let utterance = Utterance {
            session: self.session.id,
            order: segment.order,
            text: segment.text.clone(),
            voice,
            rate: self.speech.rate,
            pitch,
            volume: self.speech.volume,
        };

        self.emit(&format!(
            "Speaking segment {}/{}",
            index + 1,
            self.session.segments.len()
        ))
        .await;

        if let Err(e) = self.engine.speak(utterance).await {
            warn!(
                "Session {}: engine rejected segment {}: {e}",
                self.session.id,
                index + 1
            );
            self.advance(true).await;
        }
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        if event.session != self.session.id || !self.session.state.is_active() {
            debug!(
                "Discarding late engine callback ({:?}, session {})",
                event.kind, event.session
            );
            return;
        }

        match event.kind {
            EngineEventKind::Started => {
                debug!(
                    "Session {}: segment {}/{} started",
                    self.session.id,
                    self.session.current + 1,
                    self.session.segments.len()
                );
            }
            EngineEventKind::Finished => {
                if event.order != self.session.current {
                    debug!("Discarding stale completion for segment {}", event.order);
                    return;
                }
                self.advance(false).await;
            }
            EngineEventKind::Failed => {
                if event.order != self.session.current {
                    debug!("Discarding stale failure for segment {}", event.order);
                    return;
                }
                warn!(
                    "Session {}: segment {}/{} failed in engine, skipping",
                    self.session.id,
                    event.order + 1,
                    self.session.segments.len()
                );
                self.advance(true).await;
            }
            EngineEventKind::Paused | EngineEventKind::Resumed => {
                debug!("Engine confirmed {:?}", event.kind);
            }
        }
    }

    /// Move past the current segment: complete the session if it was the
    /// last one, otherwise schedule the next dispatch after a pause.
    async fn advance(&mut self, after_failure: bool) {
        if after_failure {
            self.session.failed += 1;
        } else {
            self.session.spoken += 1;
        }

        let next = self.session.current + 1;
        if next >= self.session.segments.len() {
            info!(
                "Session {}: narration complete ({} spoken, {} failed)",
                self.session.id, self.session.spoken, self.session.failed
            );
            self.finish(SessionState::Completed, "Narration complete")
                .await;
            return;
        }

        let pause = if after_failure {
            Duration::from_millis(self.broadcast.failure_skip_pause_ms)
        } else {
            Duration::from_millis(self.broadcast.inter_segment_pause_ms)
        };
        self.pending = Some(PendingDispatch {
            session: self.session.id,
            index: next,
            at: Instant::now() + pause,
        });
    }

    async fn fire_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if pending.session != self.session.id || self.session.state != SessionState::Playing {
            debug!("Discarding stale pending dispatch");
            return;
        }
        self.dispatch(pending.index).await;
    }

    async fn fail(&mut self, status: &str) {
        warn!("Session {}: {status}", self.session.id);
        self.finish(SessionState::Error, status).await;
    }

    /// Enter a terminal state: clear the dispatch timer and voice cache,
    /// notify the caller, record history.
    async fn finish(&mut self, state: SessionState, status: &str) {
        self.pending = None;
        self.session.state = state;
        self.resolver.clear_cache();
        self.emit(status).await;
        if self.broadcast.record_history {
            self.record_history();
        }
    }

    /// Progress updates may be dropped under backpressure; terminal-state
    /// updates (Completed/Stopped/Error) wait for channel capacity so the
    /// caller never misses the end of a session.
    async fn emit(&self, status: &str) {
        let s = &self.session;
        let update = BroadcastUpdate {
            state: s.state,
            status: status.to_string(),
            current: if s.segments.is_empty() { 0 } else { s.current + 1 },
            total: s.segments.len(),
            show_pause: s.state == SessionState::Playing,
            show_resume: s.state == SessionState::Paused,
        };
        if update.state.is_active() {
            if let Err(e) = self.updates.try_send(update) {
                debug!("Dropping status update: {e}");
            }
        } else if self.updates.send(update).await.is_err() {
            debug!("Update receiver dropped");
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        let s = &self.session;
        StatusSnapshot {
            state: s.state,
            language: (s.id != 0).then(|| s.language.clone()),
            voice: s.voice.as_ref().map(|v| v.voice_name.clone()),
            current: if s.segments.is_empty() { 0 } else { s.current + 1 },
            total: s.segments.len(),
        }
    }

    fn record_history(&self) {
        let s = &self.session;
        let record = BroadcastRecord {
            timestamp: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            target_language: s.language.clone(),
            voice: s.voice.as_ref().map(|v| v.voice_name.clone()),
            final_state: s.state.to_string(),
            segments_total: s.segments.len(),
            segments_spoken: s.spoken,
            segments_failed: s.failed,
            duration_ms: s.started_at.elapsed().as_millis() as i64,
        };
        history::save_record(&record);
    }
}
