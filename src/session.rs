use axum::extract::ws;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::AppSettings;
use crate::content;
use crate::game::ad_watch::{AdPresentation, AdWatch, AdWatchEvent};
use crate::game::messages::client_message_from_ws_text;
use crate::game::{ClientToServerMessage, QuizEngine, QuizEvent, ServerToClientMessage};
use crate::player::{PlayerProbe, PlayerSample, ReportedPlayer};

#[derive(Debug, Serialize, Clone)]
pub struct SessionDetails {
    pub session_id: Uuid,
}

#[derive(Debug)]
pub enum SessionManagerMessage {
    CreateSession {
        respond_to: oneshot::Sender<Result<SessionDetails, String>>,
    },
    GetSessionHandle {
        session_id: Uuid,
        respond_to: oneshot::Sender<Option<SessionActorHandle>>,
    },
    SessionActorShutdown {
        session_id: Uuid,
    },
}

pub struct SessionManagerActor {
    receiver: mpsc::Receiver<SessionManagerMessage>,
    sessions: HashMap<Uuid, SessionActorHandle>,
    self_sender: mpsc::Sender<SessionManagerMessage>,
    app_settings: Arc<AppSettings>,
}

impl SessionManagerActor {
    fn new(
        receiver: mpsc::Receiver<SessionManagerMessage>,
        self_sender: mpsc::Sender<SessionManagerMessage>,
        app_settings: Arc<AppSettings>,
    ) -> Self {
        SessionManagerActor {
            receiver,
            sessions: HashMap::new(),
            self_sender,
            app_settings,
        }
    }

    #[tracing::instrument(skip(self, msg), fields(
        msg_type = %std::any::type_name_of_val(&msg)
    ))]
    async fn handle_message(&mut self, msg: SessionManagerMessage) {
        match msg {
            SessionManagerMessage::CreateSession { respond_to } => {
                let session_id = Uuid::new_v4();
                let manager_handle = SessionManagerHandle {
                    sender: self.self_sender.clone(),
                };

                let handle = SessionActorHandle::spawn(
                    session_id,
                    32,
                    manager_handle,
                    Arc::clone(&self.app_settings),
                );
                self.sessions.insert(session_id, handle);

                tracing::info!(
                    session.id = %session_id,
                    sessions.active = self.sessions.len(),
                    "Created quiz session"
                );
                let _ = respond_to.send(Ok(SessionDetails { session_id }));
            }
            SessionManagerMessage::GetSessionHandle {
                session_id,
                respond_to,
            } => {
                tracing::debug!(
                    session.id = %session_id,
                    "Received GetSessionHandle request"
                );
                let handle = self.sessions.get(&session_id).cloned();
                let _ = respond_to.send(handle);
            }
            SessionManagerMessage::SessionActorShutdown { session_id } => {
                if self.sessions.remove(&session_id).is_some() {
                    tracing::info!(
                        session.id = %session_id,
                        "Cleaning up session after actor shutdown"
                    );
                } else {
                    tracing::warn!(
                        session.id = %session_id,
                        "Received shutdown for unknown session"
                    );
                }
            }
        }
    }
}

#[tracing::instrument(skip(actor))]
pub async fn run_session_manager_actor(mut actor: SessionManagerActor) {
    tracing::info!("SessionManager actor started");
    while let Some(msg) = actor.receiver.recv().await {
        actor.handle_message(msg).await;
    }
    tracing::info!("SessionManager actor stopped");
}

#[derive(Clone, Debug)]
pub struct SessionManagerHandle {
    sender: mpsc::Sender<SessionManagerMessage>,
}

impl SessionManagerHandle {
    pub fn spawn(buffer_size: usize, app_settings: Arc<AppSettings>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = SessionManagerActor::new(receiver, sender.clone(), app_settings);
        let handle = Self {
            sender: sender.clone(),
        };
        tokio::spawn(run_session_manager_actor(actor));
        handle
    }

    pub async fn create_session(&self) -> Result<SessionDetails, String> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionManagerMessage::CreateSession { respond_to })
            .await
            .map_err(|e| format!("Failed to send CreateSession: {}", e))?;
        rx.await
            .map_err(|e| format!("SessionManager no response: {}", e))?
    }

    pub async fn get_session_handle(&self, session_id: Uuid) -> Option<SessionActorHandle> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SessionManagerMessage::GetSessionHandle {
                session_id,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    pub async fn notify_session_shutdown(&self, session_id: Uuid) -> Result<(), String> {
        self.sender
            .send(SessionManagerMessage::SessionActorShutdown { session_id })
            .await
            .map_err(|e| format!("Failed to send SessionActorShutdown: {}", e))
    }
}

#[derive(Debug)]
pub enum SessionActorMessage {
    ClientEvent {
        client_id: Uuid,
        raw_payload: String,
    },
    ClientConnected {
        client_id: Uuid,
        client_tx: mpsc::Sender<ws::Message>,
    },
    ClientDisconnected {
        client_id: Uuid,
    },
    /// Internal: emitted by the ad-detection poller task.
    AdWatch(AdWatchEvent),
}

pub struct SessionActor {
    receiver: mpsc::Receiver<SessionActorMessage>,
    session_id: Uuid,
    engine: QuizEngine,
    clients: HashMap<Uuid, mpsc::Sender<ws::Message>>,
    manager_handle: SessionManagerHandle,
    app_settings: Arc<AppSettings>,
    self_sender: mpsc::Sender<SessionActorMessage>,
    /// Latest report from the client's video player; the ad watch samples it.
    player: Arc<ReportedPlayer>,
    /// The running ad-detection poller, if any. At most one per session;
    /// replaced via cancel-before-start on every question load.
    ad_watch: Option<AdWatch>,
    ad_watch_generation: u64,
    last_presentation: AdPresentation,
}

impl SessionActor {
    fn new(
        receiver: mpsc::Receiver<SessionActorMessage>,
        session_id: Uuid,
        manager_handle: SessionManagerHandle,
        app_settings: Arc<AppSettings>,
        self_sender: mpsc::Sender<SessionActorMessage>,
    ) -> Self {
        let engine = QuizEngine::new(app_settings.share.clone());
        SessionActor {
            receiver,
            session_id,
            engine,
            clients: HashMap::new(),
            manager_handle,
            app_settings,
            self_sender,
            player: Arc::new(ReportedPlayer::new()),
            ad_watch: None,
            ad_watch_generation: 0,
            last_presentation: AdPresentation::default(),
        }
    }

    #[tracing::instrument(skip(self, msg), fields(
        session.id = %self.session_id,
        msg_type = %std::any::type_name_of_val(&msg)
    ))]
    async fn handle_message(&mut self, msg: SessionActorMessage) -> bool {
        match msg {
            SessionActorMessage::ClientEvent {
                client_id,
                raw_payload,
            } => {
                tracing::trace!(
                    client.id = %client_id,
                    event.raw = %raw_payload,
                    "Raw event from client"
                );

                match client_message_from_ws_text(&raw_payload) {
                    Ok(parsed_message) => {
                        tracing::debug!(
                            client.id = %client_id,
                            event.kind = ?parsed_message,
                            "Processing event from client"
                        );
                        return self.handle_client_command(client_id, parsed_message).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            client.id = %client_id,
                            error = %e,
                            event.raw = %raw_payload,
                            "Failed to deserialize event from client"
                        );
                        self.send_message_to_client(
                            &client_id,
                            ServerToClientMessage::SystemError {
                                message: format!("Invalid message format: {}", e),
                            },
                        )
                        .await;
                    }
                }
            }
            SessionActorMessage::ClientConnected {
                client_id,
                client_tx,
            } => {
                tracing::debug!(
                    client.id = %client_id,
                    "Client connected"
                );
                self.clients.insert(client_id, client_tx);
                self.send_resync_to_client(&client_id).await;
            }
            SessionActorMessage::ClientDisconnected { client_id } => {
                tracing::debug!(
                    client.id = %client_id,
                    "Client disconnected"
                );
                return self.disconnect_client(client_id).await;
            }
            SessionActorMessage::AdWatch(event) => {
                self.handle_ad_watch_event(event).await;
            }
        }
        false
    }

    async fn handle_client_command(
        &mut self,
        client_id: Uuid,
        message: ClientToServerMessage,
    ) -> bool {
        match message {
            ClientToServerMessage::StartQuiz => {
                self.start_quiz().await;
            }
            ClientToServerMessage::SelectOption { index } => {
                let events = self.engine.select_option(index);
                self.broadcast_events(events).await;
            }
            ClientToServerMessage::NextQuestion => {
                let events = self.engine.advance();
                let presents_next = events
                    .iter()
                    .any(|e| matches!(e, QuizEvent::QuestionPresented { .. }));
                let finished = events
                    .iter()
                    .any(|e| matches!(e, QuizEvent::SessionFinished { .. }));
                self.broadcast_events(events).await;

                if presents_next {
                    self.restart_ad_watch().await;
                } else if finished {
                    self.stop_ad_watch().await;
                }
            }
            ClientToServerMessage::BackToStart => {
                self.stop_ad_watch().await;
                let events = self.engine.reset();
                self.broadcast_events(events).await;
            }
            ClientToServerMessage::PlayerStatus {
                state,
                position_seconds,
            } => {
                self.player
                    .report(PlayerSample {
                        state,
                        position_seconds,
                    })
                    .await;
            }
            ClientToServerMessage::LeaveSession => {
                tracing::info!(
                    client.id = %client_id,
                    "Client explicitly leaving session"
                );
                return self.disconnect_client(client_id).await;
            }
            ClientToServerMessage::ConnectToSession { .. } => {
                tracing::warn!(
                    client.id = %client_id,
                    "Received ConnectToSession after handshake (ignored)"
                );
            }
        }
        false
    }

    /// Session start: the question bank fetch is the sole I/O boundary. On
    /// failure the session stays idle and the user sees a blocking notice;
    /// there is no automatic retry.
    async fn start_quiz(&mut self) {
        match content::load_enriched_bank(&self.app_settings.content, &self.app_settings.quiz)
            .await
        {
            Ok(questions) => {
                let events = self.engine.begin(questions);
                self.broadcast_events(events).await;
                self.restart_ad_watch().await;
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "Failed to load question bank; aborting session start"
                );
                self.broadcast_events(vec![QuizEvent::SessionStartFailed {
                    message: "Could not load the question bank. Please check the questions \
                              document and try again."
                        .to_string(),
                }])
                .await;
            }
        }
    }

    async fn handle_ad_watch_event(&mut self, event: AdWatchEvent) {
        let current_generation = self.ad_watch.as_ref().map(AdWatch::generation);
        match event {
            AdWatchEvent::PresentationChanged {
                generation,
                presentation,
            } => {
                if current_generation != Some(generation) {
                    tracing::debug!(
                        watch.generation = generation,
                        "Dropping presentation event from stale ad watch"
                    );
                    return;
                }
                self.last_presentation = presentation;
                self.broadcast_events(vec![QuizEvent::AdPresentationChanged { presentation }])
                    .await;
            }
            AdWatchEvent::PlaybackEnded { generation } => {
                if current_generation != Some(generation) {
                    return;
                }
                tracing::debug!("Clip playback ended; releasing ad watch");
                self.stop_ad_watch().await;
            }
        }
    }

    /// Cancel-before-start: the previous watch (if any) is aborted and its
    /// presentation flags cleared before the next one is spawned, so two
    /// pollers can never race on the same session.
    async fn restart_ad_watch(&mut self) {
        self.stop_ad_watch().await;
        self.player.clear().await;
        self.ad_watch_generation += 1;

        let probe: Arc<dyn PlayerProbe> = self.player.clone();
        self.ad_watch = Some(AdWatch::spawn(
            self.ad_watch_generation,
            probe,
            self.self_sender.clone(),
        ));
    }

    /// Reset-on-stop: dropping the watch aborts its task; any asserted
    /// presentation flags are cleared for the clients.
    async fn stop_ad_watch(&mut self) {
        if let Some(watch) = self.ad_watch.take() {
            tracing::debug!(watch.generation = watch.generation(), "Stopping ad watch");
            drop(watch);
        }
        if self.last_presentation != AdPresentation::default() {
            self.last_presentation = AdPresentation::default();
            self.broadcast_events(vec![QuizEvent::AdPresentationChanged {
                presentation: AdPresentation::default(),
            }])
            .await;
        }
    }

    async fn disconnect_client(&mut self, client_id: Uuid) -> bool {
        self.clients.remove(&client_id);

        if self.clients.is_empty() {
            tracing::info!("Session is now empty. Triggering shutdown");
            self.stop_ad_watch().await;
            if let Err(e) = self
                .manager_handle
                .notify_session_shutdown(self.session_id)
                .await
            {
                tracing::error!(
                    error = %e,
                    "Failed to notify SessionManager of shutdown"
                );
            }
            return true;
        }
        false
    }

    async fn send_resync_to_client(&self, client_id: &Uuid) {
        let mut events = self.engine.resync_events();
        if self.last_presentation != AdPresentation::default() {
            events.push(QuizEvent::AdPresentationChanged {
                presentation: self.last_presentation,
            });
        }
        for event in events {
            self.send_message_to_client(client_id, ServerToClientMessage::from_event(event))
                .await;
        }
    }

    async fn broadcast_events(&self, events: Vec<QuizEvent>) {
        for event in events {
            self.broadcast_message(ServerToClientMessage::from_event(event))
                .await;
        }
    }

    async fn broadcast_message(&self, message: ServerToClientMessage) {
        if self.clients.is_empty() {
            return;
        }
        match message.to_ws_text() {
            Ok(ws_msg) => {
                for (id, tx) in &self.clients {
                    if tx.send(ws_msg.clone()).await.is_err() {
                        tracing::warn!(
                            client.id = %id,
                            "Failed to broadcast to client"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to serialize server message for broadcast"
                );
            }
        }
    }

    async fn send_message_to_client(&self, client_id: &Uuid, message: ServerToClientMessage) {
        if let Some(tx) = self.clients.get(client_id) {
            if let Ok(ws_msg) = message.to_ws_text() {
                if tx.send(ws_msg).await.is_err() {
                    tracing::warn!(
                        client.id = %client_id,
                        "Failed to send to client"
                    );
                }
            }
        }
    }
}

#[tracing::instrument(skip(actor), fields(session.id = %actor.session_id))]
pub async fn run_session_actor(mut actor: SessionActor) {
    tracing::info!("Session actor started");

    let client_ws_inactivity_timeout_duration = StdDuration::from_secs(60 * 60);
    let mut last_client_ws_activity = Instant::now();

    loop {
        tokio::select! {
            maybe_msg = actor.receiver.recv() => {
                match maybe_msg {
                    Some(msg) => {
                        if matches!(msg, SessionActorMessage::ClientEvent { .. }) {
                            last_client_ws_activity = Instant::now();
                        }
                        let should_shutdown = actor.handle_message(msg).await;
                        if should_shutdown {
                            tracing::info!("Session shutdown requested by message handler");
                            break;
                        }
                    }
                    None => {
                        tracing::info!("Session actor channel closed. Shutting down");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(last_client_ws_activity + client_ws_inactivity_timeout_duration), if !actor.clients.is_empty() => {
                tracing::info!("Session inactivity timeout. Notifying manager for shutdown");
                if let Err(e) = actor.manager_handle.notify_session_shutdown(actor.session_id).await {
                    tracing::error!(
                        error = %e,
                        "Failed to notify SessionManager of shutdown"
                    );
                }
                break;
            }
        }
    }

    // Dropping the actor aborts any live ad watch with it.
    tracing::info!("Session actor stopping");
}

#[derive(Clone, Debug)]
pub struct SessionActorHandle {
    pub sender: mpsc::Sender<SessionActorMessage>,
    pub session_id: Uuid,
}

impl SessionActorHandle {
    pub fn spawn(
        session_id: Uuid,
        buffer_size: usize,
        manager_handle: SessionManagerHandle,
        app_settings: Arc<AppSettings>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = SessionActor::new(
            receiver,
            session_id,
            manager_handle,
            app_settings,
            sender.clone(),
        );
        tokio::spawn(run_session_actor(actor));
        Self { sender, session_id }
    }

    pub async fn forward_client_event(
        &self,
        client_id: Uuid,
        raw_payload: String,
    ) -> Result<(), String> {
        self.sender
            .send(SessionActorMessage::ClientEvent {
                client_id,
                raw_payload,
            })
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    pub async fn client_connected(&self, client_id: Uuid, client_tx: mpsc::Sender<ws::Message>) {
        if self
            .sender
            .send(SessionActorMessage::ClientConnected {
                client_id,
                client_tx,
            })
            .await
            .is_err()
        {
            tracing::error!("Failed to send ClientConnected");
        }
    }

    pub async fn client_disconnected(&self, client_id: Uuid) {
        if self
            .sender
            .send(SessionActorMessage::ClientDisconnected { client_id })
            .await
            .is_err()
        {
            tracing::error!("Failed to send ClientDisconnected");
        }
    }
}
