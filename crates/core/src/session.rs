use crate::Command;
use crate::action::AssistantAction;
use crate::catalogue::Procedure;
use crate::engine::DecisionEngine;
use crate::reducer;
use crate::state::SessionState;
use crate::timefmt::format_duration;
use crate::transcript::{DEFAULT_WINDOW, TranscriptBuffer, TranscriptEntry};
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Finalized entries shown to the engine per evaluation.
    pub window: usize,
    /// Seconds added to the session clock per tick.
    pub tick_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            tick_seconds: 1,
        }
    }
}

enum SessionInput {
    Entry(TranscriptEntry),
    End,
}

/// What is left once a session ends.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub state: SessionState,
    pub notes: Vec<String>,
    pub transcript: String,
}

/// Caller side of a running session.
pub struct SessionHandle {
    inputs: mpsc::Sender<SessionInput>,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<SessionReport>,
}

impl SessionHandle {
    /// Feeds one transcription result to the session.
    pub async fn push(&self, entry: TranscriptEntry) -> Result<()> {
        self.inputs
            .send(SessionInput::Entry(entry))
            .await
            .map_err(|_| anyhow!("Session has already ended"))
    }

    /// Latest committed state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Ends the session, dropping any evaluation still in flight.
    pub async fn end(self) -> Result<SessionReport> {
        // The actor may already be gone if every sender was dropped.
        let _ = self.inputs.send(SessionInput::End).await;
        self.task.await.context("Live session task failed")
    }
}

/// Single owner of one session's state, transcript and notes.
///
/// Inputs, the clock and the one in-flight evaluation are serialized through a
/// `select!` loop, so the reducer and the clock never interleave.
pub struct LiveSession {
    engine: Arc<DecisionEngine>,
    procedure: Arc<Procedure>,
    state: SessionState,
    transcript: TranscriptBuffer,
    notes: Vec<String>,
    commands: mpsc::Sender<Command>,
    state_tx: watch::Sender<SessionState>,
}

impl LiveSession {
    pub fn spawn(
        engine: Arc<DecisionEngine>,
        procedure: Arc<Procedure>,
        initial_state: SessionState,
        config: SessionConfig,
    ) -> (SessionHandle, mpsc::Receiver<Command>) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(initial_state.clone());

        let session = LiveSession {
            engine,
            procedure,
            state: initial_state,
            transcript: TranscriptBuffer::new(config.window),
            notes: Vec::new(),
            commands: command_tx,
            state_tx,
        };
        let task = tokio::spawn(session.run(input_rx, config.tick_seconds.max(1)));

        let handle = SessionHandle {
            inputs: input_tx,
            state: state_rx,
            task,
        };
        (handle, command_rx)
    }

    async fn run(
        mut self,
        mut inputs: mpsc::Receiver<SessionInput>,
        tick_seconds: u64,
    ) -> SessionReport {
        tracing::info!(procedure = %self.procedure.id, "Live session started");
        let mut clock = tokio::time::interval(Duration::from_secs(tick_seconds));
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        clock.tick().await;

        let mut in_flight: Option<JoinHandle<AssistantAction>> = None;
        let mut follow_up = false;

        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(SessionInput::Entry(entry)) => {
                        if !self.transcript.append(entry) {
                            continue;
                        }
                        if in_flight.is_some() {
                            tracing::debug!("Evaluation in flight; buffering utterance");
                            follow_up = true;
                        } else {
                            in_flight = Some(self.start_evaluation());
                        }
                    }
                    Some(SessionInput::End) | None => break,
                },
                joined = async {
                    match in_flight.as_mut() {
                        Some(handle) => handle.await,
                        None => std::future::pending().await,
                    }
                }, if in_flight.is_some() => {
                    in_flight = None;
                    match joined {
                        Ok(action) => self.commit(action).await,
                        Err(e) => tracing::error!("Evaluation task failed: {:?}", e),
                    }
                    if std::mem::take(&mut follow_up) {
                        in_flight = Some(self.start_evaluation());
                    }
                },
                _ = clock.tick() => {
                    self.state.tick(tick_seconds);
                    if in_flight.is_none() {
                        let action = self.engine.check_in(&self.state, &self.procedure);
                        if !action.is_none() {
                            self.commit(action).await;
                            continue;
                        }
                    }
                    self.state_tx.send_replace(self.state.clone());
                },
            }
        }

        if let Some(handle) = in_flight.take() {
            tracing::info!("Session ended with an evaluation in flight; dropping it");
            handle.abort();
        }
        self.finish().await
    }

    fn start_evaluation(&self) -> JoinHandle<AssistantAction> {
        let engine = Arc::clone(&self.engine);
        let procedure = Arc::clone(&self.procedure);
        let window = self.transcript.recent_window().to_vec();
        let state = self.state.clone();
        tokio::spawn(async move { engine.evaluate(&window, &state, &procedure).await })
    }

    async fn commit(&mut self, action: AssistantAction) {
        tracing::info!(action = %action.kind(), "Applying action");
        self.state = reducer::apply(&self.state, &action);
        self.state_tx.send_replace(self.state.clone());

        if let AssistantAction::LogNote { note } = &action {
            self.notes.push(note.clone());
            self.send(Command::LogNote(note.clone())).await;
        }
        if let Some(text) = action.spoken_text() {
            self.send(Command::SpeakText(text.to_string())).await;
        }
    }

    async fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command).await {
            tracing::warn!("Command receiver dropped: {:?}", e.0);
        }
    }

    async fn finish(mut self) -> SessionReport {
        self.state = reducer::complete(&self.state);
        self.state_tx.send_replace(self.state.clone());
        let summary = format!(
            "Session complete after {}.",
            format_duration(self.state.time_elapsed_in_session)
        );
        tracing::info!("{summary}");
        self.send(Command::SessionComplete(summary)).await;

        SessionReport {
            state: self.state,
            notes: self.notes,
            transcript: self.transcript.full_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{ProcedureCatalogue, StaticCatalogue};
    use crate::completion::{CompletionRequest, CompletionService, OfflineCompletion};
    use crate::messages;
    use crate::state::SessionPhase;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chole() -> Arc<Procedure> {
        Arc::new(
            StaticCatalogue::builtin()
                .get_procedure("cholecystectomy")
                .unwrap()
                .clone(),
        )
    }

    fn offline_engine() -> Arc<DecisionEngine> {
        Arc::new(DecisionEngine::new(Arc::new(OfflineCompletion)))
    }

    fn on_port_placement(in_step: u64) -> SessionState {
        SessionState {
            phase: SessionPhase::InProgress,
            current_step_key: "portPlacement".to_string(),
            time_elapsed_in_step: in_step,
            time_elapsed_in_session: in_step,
            attending_verified: true,
            attending_name: Some("Smith".to_string()),
            ..SessionState::default()
        }
    }

    async fn next_speech(rx: &mut mpsc::Receiver<Command>) -> String {
        loop {
            match rx.recv().await {
                Some(Command::SpeakText(text)) => return text,
                Some(_) => continue,
                None => panic!("session closed before speaking"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_the_timeout_and_records_notes() {
        let (handle, mut rx) = LiveSession::spawn(
            offline_engine(),
            chole(),
            SessionState::new(),
            SessionConfig::default(),
        );

        handle.push(TranscriptEntry::session_start()).await.unwrap();
        assert_eq!(next_speech(&mut rx).await, messages::START_TIMEOUT);

        handle
            .push(TranscriptEntry::final_from(
                "attending",
                "I'm Dr. Smith, the attending surgeon.",
            ))
            .await
            .unwrap();
        assert_eq!(
            next_speech(&mut rx).await,
            "Thank you, Dr. Smith. Resident, please state your name and role."
        );

        handle
            .push(TranscriptEntry::interim_from("resident", "My name is"))
            .await
            .unwrap();
        handle
            .push(TranscriptEntry::final_from(
                "resident",
                "My name is Jane Doe, I'm the resident.",
            ))
            .await
            .unwrap();
        assert_eq!(
            next_speech(&mut rx).await,
            "Time-out complete. Starting Port Placement."
        );
        assert_eq!(handle.state().current_step_key, "portPlacement");

        handle
            .push(TranscriptEntry::final_from("attending", "Scalpel, please."))
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(Command::LogNote(note)) if note == "User requested scalpel."
        ));

        let report = handle.end().await.unwrap();
        assert_eq!(report.state.phase, SessionPhase::Complete);
        assert_eq!(report.notes, vec!["User requested scalpel.".to_string()]);
        assert_eq!(report.transcript.lines().count(), 4);
        assert!(matches!(
            rx.recv().await,
            Some(Command::SessionComplete(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn clock_triggers_a_single_check_in() {
        let (handle, mut rx) = LiveSession::spawn(
            offline_engine(),
            chole(),
            on_port_placement(440),
            SessionConfig::default(),
        );

        assert_eq!(
            next_speech(&mut rx).await,
            "Dr. Smith, we're 7 minutes and 30 seconds into Port Placement. How is it going?"
        );
        assert_eq!(handle.state().last_checkin_time, Some(450));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err(), "check-in must not repeat");
        assert!(handle.state().time_elapsed_in_step >= 560);

        handle.end().await.unwrap();
    }

    struct CountingCompletion {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl CompletionService for CountingCompletion {
        async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            let last_line = request.user.lines().last().unwrap_or_default().to_string();
            Ok(serde_json::json!({
                "action": "SPEAK",
                "speak": format!("Reply {n} to {last_line}"),
            })
            .to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn utterances_during_an_evaluation_get_one_follow_up() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Arc::new(DecisionEngine::new(Arc::new(CountingCompletion {
            calls: Arc::clone(&calls),
            delay: Duration::from_secs(3),
        })));
        let (handle, mut rx) =
            LiveSession::spawn(engine, chole(), on_port_placement(10), SessionConfig::default());

        for line in [
            "Hey Veritas, what's your name?",
            "Hey Veritas, are you there?",
            "Hey Veritas, one more thing.",
        ] {
            handle
                .push(TranscriptEntry::final_from("attending", line))
                .await
                .unwrap();
        }

        assert_eq!(
            next_speech(&mut rx).await,
            "Reply 1 to attending: Hey Veritas, what's your name?"
        );
        assert_eq!(
            next_speech(&mut rx).await,
            "Reply 2 to attending: Hey Veritas, one more thing."
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        handle.end().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn ending_drops_the_in_flight_evaluation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Arc::new(DecisionEngine::new(Arc::new(CountingCompletion {
            calls: Arc::clone(&calls),
            delay: Duration::from_secs(5),
        })));
        let (handle, mut rx) =
            LiveSession::spawn(engine, chole(), on_port_placement(10), SessionConfig::default());

        handle
            .push(TranscriptEntry::final_from(
                "attending",
                "Hey Veritas, what's the plan?",
            ))
            .await
            .unwrap();
        tokio::task::yield_now().await;

        let report = handle.end().await.unwrap();
        assert_eq!(report.state.phase, SessionPhase::Complete);
        assert_eq!(report.state.last_spoken, None);

        while let Some(command) = rx.recv().await {
            assert!(
                !matches!(command, Command::SpeakText(_)),
                "late speech after the session ended"
            );
        }
    }
}
