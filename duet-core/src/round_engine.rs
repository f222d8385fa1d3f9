use std::collections::BTreeMap;

use duet_types::{
    MAX_PLAYERS, Question, QuestionRound, Room, RoomError, RoomStatus, RoundStatus,
};
use tracing::{info, warn};

use crate::ScoringEngine;

/// Result of recording one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Every player slot of the round now holds an answer
    pub round_complete: bool,
}

/// Scoreboard after a round was evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub is_matched: bool,
    pub match_score: u32,
    pub total_questions_answered: u32,
    pub percentage: u32,
}

impl MatchResult {
    fn from_room(room: &Room, is_matched: bool) -> Self {
        Self {
            is_matched,
            match_score: room.match_score,
            total_questions_answered: room.total_questions_answered,
            percentage: ScoringEngine::percentage(room.match_score, room.total_questions_answered),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceDecision {
    NextQuestion(usize),
    GameFinished,
    Cancelled,
}

/// State transitions over a room's round fields. Callers own loading and
/// persisting the room.
pub struct RoundEngine;

impl RoundEngine {
    /// Draws the game: stores the questions and arms round one.
    pub fn begin_game(room: &mut Room, questions: Vec<Question>) -> Result<(), RoomError> {
        if room.players.len() < MAX_PLAYERS {
            return Err(RoomError::InsufficientPlayers);
        }
        let first = questions
            .first()
            .cloned()
            .ok_or_else(|| RoomError::NoQuestionsAvailable {
                category: room.settings.category.clone(),
            })?;

        room.settings.total_questions = questions.len();
        room.questions = questions;
        room.current_question_index = 0;
        room.completed_rounds.clear();
        room.match_score = 0;
        room.total_questions_answered = 0;
        room.status = RoomStatus::Playing;

        Self::start_round(room, first)
    }

    pub fn start_round(room: &mut Room, question: Question) -> Result<(), RoomError> {
        if room.players.len() < MAX_PLAYERS {
            return Err(RoomError::InsufficientPlayers);
        }

        let answers: BTreeMap<_, _> = room.players.iter().map(|p| (p.id.clone(), None)).collect();
        for player in &mut room.players {
            player.has_answered = false;
        }

        room.current_round = Some(QuestionRound {
            question,
            answers,
            is_matched: None,
            status: RoundStatus::WaitingAnswers,
            timed_out: false,
        });
        Ok(())
    }

    pub fn submit_answer(
        room: &mut Room,
        player_id: &str,
        question_id: &str,
        raw_answer: &str,
    ) -> Result<SubmitOutcome, RoomError> {
        if !room.has_player(player_id) {
            return Err(RoomError::PlayerNotInRoom);
        }

        let round = room.current_round.as_mut().ok_or(RoomError::StaleRound)?;
        if round.question.id != question_id {
            return Err(RoomError::QuestionMismatch {
                expected: round.question.id.clone(),
                submitted: question_id.to_string(),
            });
        }
        if round.status == RoundStatus::Completed {
            return Err(RoomError::AlreadyAnswered);
        }

        let slot = round
            .answers
            .get_mut(player_id)
            .ok_or(RoomError::PlayerNotInRoom)?;
        if slot.is_some() {
            return Err(RoomError::AlreadyAnswered);
        }

        *slot = Some(ScoringEngine::canonicalize_answer(&round.question, raw_answer));
        let round_complete = round.all_answered();

        if let Some(player) = room.player_mut(player_id) {
            player.has_answered = true;
        }

        Ok(SubmitOutcome { round_complete })
    }

    /// Scores a fully answered round and moves it into the history.
    ///
    /// Anything other than exactly two answers is an invariant violation;
    /// the caller is expected to reset the room.
    pub fn evaluate_round(room: &mut Room) -> Result<MatchResult, RoomError> {
        let round = room.current_round.as_mut().ok_or(RoomError::StaleRound)?;

        let submitted: Vec<_> = round.answers.values().flatten().collect();
        if round.answers.len() != MAX_PLAYERS || submitted.len() != MAX_PLAYERS {
            return Err(RoomError::InvalidAnswerCount {
                count: submitted.len(),
            });
        }

        let is_matched = ScoringEngine::answers_match(submitted[0], submitted[1]);
        round.is_matched = Some(is_matched);
        round.status = RoundStatus::Completed;
        let finished_round = round.clone();

        room.total_questions_answered += 1;
        if is_matched {
            room.match_score += 1;
        }
        for player in &mut room.players {
            player.has_answered = false;
        }
        room.completed_rounds.push(finished_round);

        info!(
            room_code = %room.room_code,
            question_index = room.current_question_index,
            is_matched,
            match_score = room.match_score,
            "Round completed"
        );

        Ok(MatchResult::from_room(room, is_matched))
    }

    /// Closes a round whose answer window ran out. Missing answers count as
    /// a miss.
    pub fn expire_round(room: &mut Room) -> Result<MatchResult, RoomError> {
        let round = room.current_round.as_mut().ok_or(RoomError::StaleRound)?;
        if round.status == RoundStatus::Completed {
            return Err(RoomError::StaleRound);
        }

        round.is_matched = Some(false);
        round.status = RoundStatus::Completed;
        round.timed_out = true;
        let finished_round = round.clone();

        room.total_questions_answered += 1;
        for player in &mut room.players {
            player.has_answered = false;
        }
        room.completed_rounds.push(finished_round);

        warn!(
            room_code = %room.room_code,
            question_index = room.current_question_index,
            "Round timed out before both answers arrived"
        );

        Ok(MatchResult::from_room(room, false))
    }

    pub fn advance(room: &Room) -> AdvanceDecision {
        if room.questions.is_empty() || room.current_question_index + 1 >= room.questions.len() {
            return AdvanceDecision::GameFinished;
        }

        let next = room.current_question_index + 1;
        if room.questions.get(next).is_none() {
            return AdvanceDecision::GameFinished;
        }
        if room.players.len() < MAX_PLAYERS {
            return AdvanceDecision::Cancelled;
        }
        AdvanceDecision::NextQuestion(next)
    }

    /// Moves the cursor to `index` and arms its round
    pub fn start_question(room: &mut Room, index: usize) -> Result<Question, RoomError> {
        let question = room
            .questions
            .get(index)
            .cloned()
            .ok_or(RoomError::StaleRound)?;
        room.current_question_index = index;
        Self::start_round(room, question.clone())?;
        Ok(question)
    }

    pub fn finish(room: &mut Room) -> MatchResult {
        room.status = RoomStatus::Finished;
        room.current_round = None;
        for player in &mut room.players {
            player.has_answered = false;
        }

        let is_matched = room
            .completed_rounds
            .last()
            .and_then(|r| r.is_matched)
            .unwrap_or(false);
        MatchResult::from_room(room, is_matched)
    }

    pub fn is_last_question(room: &Room) -> bool {
        room.current_question_index + 1 >= room.questions.len()
    }
}
