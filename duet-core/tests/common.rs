use duet_core::{RoomRules, RoundEngine};
use duet_types::{AnswerChoices, MAX_PLAYERS, Question, QuestionText, Room, RoomSettings};

/// Creates a fixed-choice question with aligned locale lists
pub fn choice_question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        text: QuestionText::Plain(format!("Pick one ({})", id)),
        category: "pets".to_string(),
        have_answers: true,
        answers: Some(AnswerChoices {
            en: vec!["Cat".to_string(), "Dog".to_string(), "Bird".to_string()],
            tr: vec!["Kedi".to_string(), "Köpek".to_string(), "Kuş".to_string()],
            es: vec!["Gato".to_string(), "Perro".to_string(), "Pájaro".to_string()],
        }),
    }
}

/// Creates a free-form yes/no question
pub fn yes_no_question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        text: QuestionText::Plain(format!("Yes or no? ({})", id)),
        category: "pets".to_string(),
        have_answers: false,
        answers: None,
    }
}

pub fn test_settings(total_questions: usize) -> RoomSettings {
    RoomSettings {
        max_players: MAX_PLAYERS,
        total_questions,
        category: "pets".to_string(),
        answer_duration_ms: 30_000,
        result_display_ms: 3_000,
    }
}

/// Creates a waiting room with Alice (host) and Bob
pub fn create_two_player_room(total_questions: usize) -> Room {
    let mut room = RoomRules::new_room(
        "KT7Q".to_string(),
        RoomRules::new_player("alice", "Alice", "fox"),
        test_settings(total_questions),
    );
    RoomRules::add_player(&mut room, RoomRules::new_player("bob", "Bob", "owl"))
        .expect("second player joins");
    room
}

/// Creates a room that already started with the given questions
pub fn create_started_room(questions: Vec<Question>) -> Room {
    let mut room = create_two_player_room(questions.len());
    RoundEngine::begin_game(&mut room, questions).expect("game starts");
    room
}

/// Submits both answers for the active question and evaluates the round
pub fn play_round(room: &mut Room, alice: &str, bob: &str) -> duet_core::MatchResult {
    let question_id = room
        .current_round
        .as_ref()
        .expect("round active")
        .question
        .id
        .clone();
    RoundEngine::submit_answer(room, "alice", &question_id, alice).expect("alice answers");
    let outcome = RoundEngine::submit_answer(room, "bob", &question_id, bob).expect("bob answers");
    assert!(outcome.round_complete);
    RoundEngine::evaluate_round(room).expect("round evaluates")
}
