use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use duet_core::{
    AdvanceDecision, ChatPolicy, MatchResult, QuestionProvider, RoomRules, RoundEngine,
    ScoringEngine, normalize_room_code,
};
use duet_persistence::RoomRepository;
use duet_types::{
    ChatMessage, ClientMessage, ErrorClass, MAX_PLAYERS, Room, RoomCode, RoomError,
    RoomSettings, RoomStatus, RoundStatus, ServerMessage,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::scheduler::{PhaseScheduler, PhaseTimer, TimerKind};
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use crate::websocket::rate_limiter::ChatThrottle;

const DEFAULT_CATEGORY: &str = "general";
const REASON_PLAYER_LEFT: &str = "The other player left the game";
const REASON_PLAYER_DISCONNECTED: &str = "The other player disconnected";
const REASON_INCONSISTENT_ROUND: &str = "The round could not be scored and the game was reset";

/// Exclusive access to one room. The lock entry is dropped on release once
/// no other task holds or awaits it.
struct RoomGuard<'a> {
    locks: &'a DashMap<RoomCode, Arc<Mutex<()>>>,
    code: RoomCode,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RoomGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.code, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Drives room lifecycle and round progression.
///
/// Every load-mutate-store sequence on a room, including timer handlers,
/// runs under that room's lock. Timers never trust captured state: they
/// reload the room and check the round they were armed for.
pub struct SessionCoordinator {
    connection_manager: Arc<ConnectionManager>,
    repository: RoomRepository,
    questions: Arc<dyn QuestionProvider>,
    chat_policy: ChatPolicy,
    chat_throttle: ChatThrottle,
    scheduler: PhaseScheduler,
    config: SessionConfig,
    room_locks: DashMap<RoomCode, Arc<Mutex<()>>>,
    self_ref: Weak<SessionCoordinator>,
}

impl SessionCoordinator {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        repository: RoomRepository,
        questions: Arc<dyn QuestionProvider>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            connection_manager,
            repository,
            questions,
            chat_policy: ChatPolicy::new(config.chat_max_length),
            chat_throttle: ChatThrottle::new(config.chat_min_interval),
            scheduler: PhaseScheduler::new(),
            config,
            room_locks: DashMap::new(),
            self_ref: self_ref.clone(),
        })
    }

    pub fn repository(&self) -> &RoomRepository {
        &self.repository
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.scheduler
    }

    /// Runs one client command and reports any failure to the sender
    pub async fn handle_command(&self, player_id: &str, message: ClientMessage) {
        let result = match message {
            ClientMessage::CreateRoom {
                name,
                avatar,
                category,
            } => self
                .create_room(player_id, &name, &avatar, &category)
                .await
                .map(drop),
            ClientMessage::JoinRoom { code, name, avatar } => self
                .join_room(player_id, &code, &name, &avatar)
                .await
                .map(drop),
            ClientMessage::GetRoom { code } => self.get_room(player_id, &code).await.map(drop),
            ClientMessage::StartGame { code } => self.start_game(player_id, &code).await.map(drop),
            ClientMessage::SubmitAnswer {
                question_id,
                answer,
            } => self.submit_answer(player_id, &question_id, &answer).await,
            ClientMessage::KickPlayer { code, target_id } => {
                self.kick_player(player_id, &code, &target_id).await
            }
            ClientMessage::LeaveRoom { code } => self.leave_room(player_id, &code).await,
            ClientMessage::SendMessage { code, text } => {
                self.send_chat(player_id, &code, &text).await
            }
            ClientMessage::RegisterUser { external_id } => {
                self.register_user(player_id, &external_id).await;
                Ok(())
            }
        };

        if let Err(err) = result {
            self.report_error(player_id, &err).await;
        }
    }

    pub async fn create_room(
        &self,
        player_id: &str,
        name: &str,
        avatar: &str,
        category: &str,
    ) -> Result<Room, RoomError> {
        self.leave_current_room(player_id, None).await?;

        let category = match category.trim() {
            "" => DEFAULT_CATEGORY,
            category => category,
        };
        let settings = RoomSettings {
            max_players: MAX_PLAYERS,
            total_questions: self.config.total_questions,
            category: category.to_string(),
            answer_duration_ms: self.config.timings.answer_duration.as_millis() as u64,
            result_display_ms: self.config.timings.result_display.as_millis() as u64,
        };

        let owner = RoomRules::new_player(player_id, name, avatar);
        let room = self.repository.create_room(owner, settings).await?;
        let host = room.players[0].clone();

        self.send(
            player_id,
            ServerMessage::RoomCreated {
                room: room.clone(),
                player: host,
            },
        )
        .await;
        Ok(room)
    }

    pub async fn join_room(
        &self,
        player_id: &str,
        code: &str,
        name: &str,
        avatar: &str,
    ) -> Result<Room, RoomError> {
        let code = normalize_room_code(code);
        self.leave_current_room(player_id, Some(code.as_str())).await?;

        let _guard = self.lock_room(&code).await;

        let player = RoomRules::new_player(player_id, name, avatar);
        let (player, room) = self.repository.join_room(&code, player).await?;

        self.send(
            player_id,
            ServerMessage::RoomJoined {
                room: room.clone(),
                player: player.clone(),
            },
        )
        .await;
        self.broadcast_except(
            &room,
            player_id,
            ServerMessage::PlayerJoined {
                room: room.clone(),
                player,
            },
        )
        .await;
        Ok(room)
    }

    pub async fn get_room(&self, player_id: &str, code: &str) -> Result<Room, RoomError> {
        let code = normalize_room_code(code);
        let room = self
            .repository
            .get_room(&code)
            .await?
            .ok_or(RoomError::RoomNotFound { code })?;

        self.send(player_id, ServerMessage::RoomData { room: room.clone() })
            .await;
        Ok(room)
    }

    pub async fn start_game(&self, player_id: &str, code: &str) -> Result<Room, RoomError> {
        let code = normalize_room_code(code);
        let _guard = self.lock_room(&code).await;

        let mut room = self.repository.load_room(&code).await?;
        if !room.has_player(player_id) {
            return Err(RoomError::PlayerNotInRoom);
        }
        if !room.is_host(player_id) {
            return Err(RoomError::NotHost);
        }
        if room.status != RoomStatus::Waiting {
            return Err(RoomError::RoomAlreadyStarted);
        }
        if room.players.len() < MAX_PLAYERS {
            return Err(RoomError::InsufficientPlayers);
        }

        let questions = self
            .questions
            .fetch_questions(&room.settings.category, room.settings.total_questions)
            .await?;
        RoundEngine::begin_game(&mut room, questions)?;
        self.repository.update_room(&room).await?;

        info!(
            room_code = %code,
            category = %room.settings.category,
            total_questions = room.settings.total_questions,
            "Game started"
        );

        self.announce_question(&room, true).await;
        self.arm(
            &code,
            TimerKind::QuestionTimeout,
            room.current_question_index,
            self.config.timings.question_timeout(),
        );
        Ok(room)
    }

    pub async fn submit_answer(
        &self,
        player_id: &str,
        question_id: &str,
        answer: &str,
    ) -> Result<(), RoomError> {
        let code = self
            .repository
            .get_player_room(player_id)
            .await?
            .ok_or(RoomError::PlayerNotInRoom)?;
        let _guard = self.lock_room(&code).await;

        let mut room = self.repository.load_room(&code).await?;
        let outcome = RoundEngine::submit_answer(&mut room, player_id, question_id, answer)?;

        if !outcome.round_complete {
            self.repository.update_room(&room).await?;
            self.broadcast(
                &room,
                ServerMessage::PlayerAnswered {
                    player_id: player_id.to_string(),
                },
            )
            .await;
            return Ok(());
        }

        match RoundEngine::evaluate_round(&mut room) {
            Ok(result) => {
                self.repository.update_room(&room).await?;
                self.broadcast(
                    &room,
                    ServerMessage::PlayerAnswered {
                        player_id: player_id.to_string(),
                    },
                )
                .await;
                self.complete_round(&room, result).await;
                Ok(())
            }
            Err(err) => {
                error!(
                    room_code = %code,
                    error = %err,
                    "Round invariant violated, resetting room"
                );
                self.cancel_game(&mut room, REASON_INCONSISTENT_ROUND).await?;
                Err(err)
            }
        }
    }

    pub async fn kick_player(
        &self,
        player_id: &str,
        code: &str,
        target_id: &str,
    ) -> Result<(), RoomError> {
        let code = normalize_room_code(code);
        let _guard = self.lock_room(&code).await;

        let room = self.repository.load_room(&code).await?;
        if !room.has_player(player_id) {
            return Err(RoomError::PlayerNotInRoom);
        }
        if !room.is_host(player_id) {
            return Err(RoomError::NotHost);
        }
        if target_id == player_id {
            return Err(RoomError::CannotKickSelf);
        }
        if room.status == RoomStatus::Playing {
            return Err(RoomError::KickDuringGame);
        }
        if !room.has_player(target_id) {
            return Err(RoomError::PlayerNotInRoom);
        }

        let removal = self.repository.remove_player_from(&code, target_id).await?;
        info!(room_code = %code, player_id = %target_id, "Player kicked");

        self.send(target_id, ServerMessage::KickedFromRoom { code: code.clone() })
            .await;
        if let Some(room) = removal.room {
            self.broadcast(
                &room,
                ServerMessage::PlayerKicked {
                    player_id: target_id.to_string(),
                    room: room.clone(),
                },
            )
            .await;
        }
        Ok(())
    }

    pub async fn leave_room(&self, player_id: &str, code: &str) -> Result<(), RoomError> {
        let code = normalize_room_code(code);
        self.depart(&code, player_id, REASON_PLAYER_LEFT).await?;
        self.send(player_id, ServerMessage::RoomLeft { code }).await;
        Ok(())
    }

    pub async fn send_chat(&self, player_id: &str, code: &str, text: &str) -> Result<(), RoomError> {
        let code = normalize_room_code(code);
        let room = self
            .repository
            .get_room(&code)
            .await?
            .ok_or(RoomError::RoomNotFound { code: code.clone() })?;
        let sender = room.player(player_id).ok_or(RoomError::PlayerNotInRoom)?;

        if !self.chat_throttle.check(player_id) {
            debug!(room_code = %code, player_id = %player_id, "Chat throttled");
            return Err(RoomError::ChatRejected {
                reason: "sending messages too quickly".to_string(),
            });
        }
        let text = self.chat_policy.check(text).inspect_err(|err| {
            debug!(room_code = %code, player_id = %player_id, "Chat rejected: {}", err);
        })?;

        let message = ChatMessage {
            player_id: player_id.to_string(),
            name: sender.name.clone(),
            avatar: sender.avatar.clone(),
            text,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.broadcast(&room, ServerMessage::ChatMessage(message))
            .await;
        Ok(())
    }

    /// Binds the connection to an external identity for out-of-band notices
    pub async fn register_user(&self, player_id: &str, external_id: &str) {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            warn!(player_id = %player_id, "Ignoring register-user without an id");
            return;
        }
        let Ok(connection_id) = player_id.parse::<ConnectionId>() else {
            warn!(player_id = %player_id, "Cannot register user for unknown connection");
            return;
        };

        match self
            .connection_manager
            .register_user(connection_id, external_id.to_string())
            .await
        {
            Ok(()) => info!(player_id = %player_id, external_id = %external_id, "User registered"),
            Err(err) => warn!(player_id = %player_id, "User registration failed: {}", err),
        }
    }

    /// Pushes a credit balance to a registered user, if connected
    pub async fn notify_credits(&self, external_id: &str, credits: u32) -> bool {
        match self
            .connection_manager
            .notify_user(external_id, ServerMessage::CreditsUpdated { credits })
            .await
        {
            Ok(()) => true,
            Err(err) => {
                debug!(external_id = %external_id, "Credit notification not delivered: {}", err);
                false
            }
        }
    }

    pub async fn handle_disconnect(&self, player_id: &str) {
        self.chat_throttle.forget(player_id);

        match self.repository.get_player_room(player_id).await {
            Ok(Some(code)) => {
                if let Err(err) = self
                    .depart(&code, player_id, REASON_PLAYER_DISCONNECTED)
                    .await
                {
                    warn!(
                        room_code = %code,
                        player_id = %player_id,
                        "Failed to remove disconnected player: {}",
                        err
                    );
                }
            }
            Ok(None) => {}
            Err(err) => error!(player_id = %player_id, "Failed to look up room on disconnect: {}", err),
        }
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, RoomError> {
        self.repository.list_rooms().await
    }

    pub async fn room_snapshot(&self, code: &str) -> Result<Option<Room>, RoomError> {
        self.repository.get_room(&normalize_room_code(code)).await
    }

    /// Entry point for fired timers. A room that vanished or moved past the
    /// timer's round is left alone.
    pub async fn on_timer(&self, code: &str, timer: PhaseTimer) {
        if let Err(err) = self.run_timer(code, timer).await {
            error!(room_code = %code, kind = ?timer.kind, "Timer handler failed: {}", err);
        }
    }

    async fn run_timer(&self, code: &str, timer: PhaseTimer) -> Result<(), RoomError> {
        let _guard = self.lock_room(code).await;

        let Some(mut room) = self.repository.get_room(code).await? else {
            debug!(room_code = %code, kind = ?timer.kind, "Timer fired for a deleted room");
            return Ok(());
        };
        if room.current_question_index != timer.question_index {
            debug!(
                room_code = %code,
                kind = ?timer.kind,
                armed_for = timer.question_index,
                current = room.current_question_index,
                "Timer is stale"
            );
            return Ok(());
        }

        debug!(room_code = %code, kind = ?timer.kind, "Timer fired");
        match timer.kind {
            TimerKind::QuestionTimeout => self.expire_question(&mut room).await,
            TimerKind::Advance => self.advance_room(&mut room).await,
            TimerKind::AnnounceFinish => {
                self.announce_finish(&room).await;
                Ok(())
            }
            TimerKind::AutoReset => self.auto_reset(&mut room).await,
        }
    }

    async fn expire_question(&self, room: &mut Room) -> Result<(), RoomError> {
        let waiting = room
            .current_round
            .as_ref()
            .is_some_and(|round| round.status == RoundStatus::WaitingAnswers);
        if room.status != RoomStatus::Playing || !waiting {
            debug!(room_code = %room.room_code, "Question already closed, ignoring timeout");
            return Ok(());
        }

        let result = RoundEngine::expire_round(room)?;
        self.repository.update_room(room).await?;
        self.complete_round(room, result).await;
        Ok(())
    }

    async fn advance_room(&self, room: &mut Room) -> Result<(), RoomError> {
        let completed = room
            .current_round
            .as_ref()
            .is_some_and(|round| round.status == RoundStatus::Completed);
        if room.status != RoomStatus::Playing || !completed {
            debug!(room_code = %room.room_code, "Room is not between rounds, ignoring advance");
            return Ok(());
        }

        match RoundEngine::advance(room) {
            AdvanceDecision::NextQuestion(index) => {
                RoundEngine::start_question(room, index)?;
                self.repository.update_room(room).await?;
                self.announce_question(room, false).await;
                self.arm(
                    &room.room_code,
                    TimerKind::QuestionTimeout,
                    index,
                    self.config.timings.question_timeout(),
                );
            }
            AdvanceDecision::GameFinished => {
                let summary = RoundEngine::finish(room);
                self.repository.update_room(room).await?;
                info!(
                    room_code = %room.room_code,
                    match_score = summary.match_score,
                    percentage = summary.percentage,
                    "Game finished"
                );
                self.arm(
                    &room.room_code,
                    TimerKind::AnnounceFinish,
                    room.current_question_index,
                    self.config.timings.finish_delay,
                );
            }
            AdvanceDecision::Cancelled => {
                self.cancel_game(room, REASON_PLAYER_LEFT).await?;
            }
        }
        Ok(())
    }

    async fn announce_finish(&self, room: &Room) {
        if room.status != RoomStatus::Finished {
            debug!(room_code = %room.room_code, "Room no longer finished, skipping announcement");
            return;
        }

        self.broadcast(
            room,
            ServerMessage::GameFinished {
                match_score: room.match_score,
                total_questions: room.settings.total_questions,
                percentage: ScoringEngine::percentage(
                    room.match_score,
                    room.total_questions_answered,
                ),
                completed_rounds: room.completed_rounds.clone(),
            },
        )
        .await;
        self.arm(
            &room.room_code,
            TimerKind::AutoReset,
            room.current_question_index,
            self.config.timings.auto_reset,
        );
    }

    async fn auto_reset(&self, room: &mut Room) -> Result<(), RoomError> {
        if room.status != RoomStatus::Finished {
            debug!(room_code = %room.room_code, "Room already reset");
            return Ok(());
        }

        self.reset_for_replay(room);
        self.repository.update_room(room).await?;
        info!(room_code = %room.room_code, "Room reset for a rematch");
        self.broadcast(room, ServerMessage::RoomData { room: room.clone() })
            .await;
        Ok(())
    }

    async fn complete_round(&self, room: &Room, result: MatchResult) {
        let Some(round) = room.current_round.as_ref() else {
            return;
        };

        self.broadcast(
            room,
            ServerMessage::RoundCompleted {
                question_id: round.question.id.clone(),
                answers: round.answers.clone(),
                is_matched: result.is_matched,
                match_score: result.match_score,
                total_questions_answered: result.total_questions_answered,
                percentage: result.percentage,
                timed_out: round.timed_out,
                is_last_question: RoundEngine::is_last_question(room),
            },
        )
        .await;
        self.arm(
            &room.room_code,
            TimerKind::Advance,
            room.current_question_index,
            self.config.timings.result_display,
        );
    }

    async fn announce_question(&self, room: &Room, first: bool) {
        let Some(round) = room.current_round.as_ref() else {
            return;
        };

        let question = round.question.clone();
        let question_index = room.current_question_index;
        let total_questions = room.settings.total_questions;
        let server_time = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let answer_duration_ms = room.settings.answer_duration_ms;

        let message = if first {
            ServerMessage::GameStarted {
                room: room.clone(),
                question,
                question_index,
                total_questions,
                server_time,
                answer_duration_ms,
            }
        } else {
            ServerMessage::NextQuestion {
                room: room.clone(),
                question,
                question_index,
                total_questions,
                server_time,
                answer_duration_ms,
            }
        };
        self.broadcast(room, message).await;
    }

    /// Resets a room whose game cannot continue. Caller holds the room lock.
    async fn cancel_game(&self, room: &mut Room, reason: &str) -> Result<(), RoomError> {
        self.scheduler.cancel(&room.room_code);
        self.reset_for_replay(room);
        self.repository.update_room(room).await?;

        warn!(room_code = %room.room_code, reason = %reason, "Game cancelled");
        self.broadcast(
            room,
            ServerMessage::GameCancelled {
                reason: reason.to_string(),
                room: room.clone(),
            },
        )
        .await;
        Ok(())
    }

    /// Removes a player from a room, cancelling a running game and deleting
    /// the room once empty.
    async fn depart(&self, code: &str, player_id: &str, reason: &str) -> Result<(), RoomError> {
        let _guard = self.lock_room(code).await;

        let Some(room) = self.repository.get_room(code).await? else {
            // Drops a dangling index entry
            self.repository.remove_player_from(code, player_id).await?;
            self.forget_room(code);
            return Ok(());
        };
        if !room.has_player(player_id) {
            self.repository.clear_player_index(player_id, code).await?;
            return Err(RoomError::PlayerNotInRoom);
        }

        let was_playing = room.status == RoomStatus::Playing;
        let removal = self.repository.remove_player_from(code, player_id).await?;
        let Some(mut remaining) = removal.room else {
            self.forget_room(code);
            return Ok(());
        };

        if was_playing {
            self.cancel_game(&mut remaining, reason).await?;
        }
        self.broadcast(
            &remaining,
            ServerMessage::PlayerLeft {
                player_id: player_id.to_string(),
                room: remaining.clone(),
            },
        )
        .await;
        Ok(())
    }

    async fn leave_current_room(&self, player_id: &str, keep: Option<&str>) -> Result<(), RoomError> {
        let Some(code) = self.repository.get_player_room(player_id).await? else {
            return Ok(());
        };
        if keep == Some(code.as_str()) {
            return Ok(());
        }

        match self.depart(&code, player_id, REASON_PLAYER_LEFT).await {
            Ok(()) | Err(RoomError::PlayerNotInRoom) => {}
            Err(err) => return Err(err),
        }
        self.send(player_id, ServerMessage::RoomLeft { code }).await;
        Ok(())
    }

    fn arm(&self, code: &str, kind: TimerKind, question_index: usize, delay: Duration) {
        let timer = PhaseTimer::new(kind, question_index);
        let coordinator = self.self_ref.clone();
        let room_code = code.to_string();

        debug!(room_code = %code, kind = ?kind, delay_ms = delay.as_millis() as u64, "Arming timer");
        self.scheduler.schedule(code, delay, async move {
            if let Some(coordinator) = coordinator.upgrade() {
                coordinator.on_timer(&room_code, timer).await;
            }
        });
    }

    /// Back to waiting with the configured game length. A short question
    /// draw only shortens the game it was drawn for.
    fn reset_for_replay(&self, room: &mut Room) {
        RoomRules::reset(room);
        room.settings.total_questions = self.config.total_questions;
    }

    async fn lock_room(&self, code: &str) -> RoomGuard<'_> {
        let lock = self.room_locks.entry(code.to_string()).or_default().clone();
        RoomGuard {
            locks: &self.room_locks,
            code: code.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Rooms with a held or awaited lock
    pub fn room_lock_count(&self) -> usize {
        self.room_locks.len()
    }

    fn forget_room(&self, code: &str) {
        self.scheduler.cancel(code);
    }

    async fn report_error(&self, player_id: &str, err: &RoomError) {
        match err.class() {
            ErrorClass::Infrastructure => error!(player_id = %player_id, "Request failed: {}", err),
            ErrorClass::Desync => warn!(player_id = %player_id, "Client out of sync: {}", err),
            ErrorClass::Validation | ErrorClass::NotFound => {
                debug!(player_id = %player_id, "Request rejected: {}", err)
            }
        }

        let message = if err.is_critical() {
            ServerMessage::CriticalError {
                message: err.client_message(),
            }
        } else {
            ServerMessage::RoomError {
                message: err.client_message(),
            }
        };
        self.send(player_id, message).await;
    }

    async fn send(&self, player_id: &str, message: ServerMessage) {
        let event = message.event_name();
        if let Err(err) = self.connection_manager.send_to_player(player_id, message).await {
            debug!(player_id = %player_id, event, "Dropped outbound event: {}", err);
        }
    }

    async fn broadcast(&self, room: &Room, message: ServerMessage) {
        for player in &room.players {
            self.send(&player.id, message.clone()).await;
        }
    }

    async fn broadcast_except(&self, room: &Room, except: &str, message: ServerMessage) {
        for player in room.players.iter().filter(|p| p.id != except) {
            self.send(&player.id, message.clone()).await;
        }
    }
}
