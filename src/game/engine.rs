use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ShareConfig;
use crate::content::EnrichedQuestion;
use crate::game::ad_watch::AdPresentation;
use crate::game::share;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Start screen; no questions loaded.
    Idle,
    /// A question is on screen, its clip playing.
    InQuestion,
    /// Result screen with the final summary.
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCue {
    pub video_id: String,
    pub start_seconds: u32,
}

/// Everything the client may reveal once a question is answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerReveal {
    pub correct_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Render-intent events. The server never touches a DOM; clients turn these
/// into whatever presentation they like.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum QuizEvent {
    QuestionPresented {
        /// 1-based display number.
        number: usize,
        total: usize,
        score: u32,
        prompt: String,
        options: Vec<String>,
        video: VideoCue,
    },
    AnswerJudged {
        selected_index: usize,
        correct_index: usize,
        correct: bool,
        score: u32,
        reveal: AnswerReveal,
    },
    /// Also tells the client to stop playback.
    SessionFinished {
        score: u32,
        total: usize,
        accuracy: u32,
        message: String,
        share_url: String,
        finished_at: DateTime<Utc>,
    },
    SessionReset,
    SessionStartFailed {
        message: String,
    },
    AdPresentationChanged {
        presentation: AdPresentation,
    },
}

/// The quiz session controller: question progression, scoring and summary.
///
/// Pure and synchronous; every mutation returns the render-intent events it
/// produced and the owning actor broadcasts them. One instance per session,
/// reset wholesale when the user returns to the start screen.
#[derive(Debug)]
pub struct QuizEngine {
    share: ShareConfig,
    phase: SessionPhase,
    questions: Vec<EnrichedQuestion>,
    position: usize,
    score: u32,
    answered: bool,
    last_selection: Option<usize>,
}

impl QuizEngine {
    pub fn new(share: ShareConfig) -> Self {
        Self {
            share,
            phase: SessionPhase::Idle,
            questions: Vec::new(),
            position: 0,
            score: 0,
            answered: false,
            last_selection: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Installs a freshly loaded question sequence and presents the first
    /// question. Any previous run's state is discarded.
    pub fn begin(&mut self, questions: Vec<EnrichedQuestion>) -> Vec<QuizEvent> {
        self.questions = questions;
        self.position = 0;
        self.score = 0;
        self.answered = false;
        self.last_selection = None;
        self.phase = SessionPhase::InQuestion;

        tracing::info!(
            questions.total = self.questions.len(),
            "Quiz session started"
        );
        vec![self.present_current()]
    }

    /// Judges a selection. Only the first selection per question counts;
    /// anything after that is a no-op, as is selecting outside a question.
    pub fn select_option(&mut self, index: usize) -> Vec<QuizEvent> {
        if self.phase != SessionPhase::InQuestion || self.answered {
            return Vec::new();
        }
        let Some(question) = self.questions.get(self.position) else {
            return Vec::new();
        };
        if index >= question.options.len() {
            tracing::warn!(
                selection.index = index,
                options.count = question.options.len(),
                "Ignoring out-of-range option selection"
            );
            return Vec::new();
        }

        self.answered = true;
        self.last_selection = Some(index);
        let correct = index == question.correct_index;
        if correct {
            self.score += 1;
        }

        tracing::debug!(
            question.number = self.position + 1,
            selection.index = index,
            selection.correct = correct,
            session.score = self.score,
            "Answer judged"
        );
        vec![self.judgement_event(index, question_reveal(question))]
    }

    /// Moves to the next question, or finalizes after the last one. Ignored
    /// until the current question has been answered (the advance control is
    /// only offered alongside feedback).
    pub fn advance(&mut self) -> Vec<QuizEvent> {
        if self.phase != SessionPhase::InQuestion || !self.answered {
            return Vec::new();
        }

        self.position += 1;
        if self.position < self.questions.len() {
            self.answered = false;
            self.last_selection = None;
            vec![self.present_current()]
        } else {
            self.phase = SessionPhase::Summary;
            tracing::info!(
                session.score = self.score,
                questions.total = self.questions.len(),
                "Quiz session finished"
            );
            vec![self.summary_event()]
        }
    }

    /// Back to the start screen; the whole run is discarded.
    pub fn reset(&mut self) -> Vec<QuizEvent> {
        self.phase = SessionPhase::Idle;
        self.questions.clear();
        self.position = 0;
        self.score = 0;
        self.answered = false;
        self.last_selection = None;
        vec![QuizEvent::SessionReset]
    }

    /// Events that rebuild the current view for a client that (re)connects
    /// mid-session.
    pub fn resync_events(&self) -> Vec<QuizEvent> {
        match self.phase {
            SessionPhase::Idle => Vec::new(),
            SessionPhase::InQuestion => {
                let mut events = vec![self.present_current()];
                if let (true, Some(selected), Some(question)) = (
                    self.answered,
                    self.last_selection,
                    self.questions.get(self.position),
                ) {
                    events.push(self.judgement_event(selected, question_reveal(question)));
                }
                events
            }
            SessionPhase::Summary => vec![self.summary_event()],
        }
    }

    fn present_current(&self) -> QuizEvent {
        let question = &self.questions[self.position];
        QuizEvent::QuestionPresented {
            number: self.position + 1,
            total: self.questions.len(),
            score: self.score,
            prompt: question.record.question.clone(),
            options: question.options.clone(),
            video: VideoCue {
                video_id: question.record.video_id.clone(),
                start_seconds: question.record.start_time.unwrap_or(0),
            },
        }
    }

    fn judgement_event(&self, selected_index: usize, reveal: AnswerReveal) -> QuizEvent {
        let question = &self.questions[self.position];
        QuizEvent::AnswerJudged {
            selected_index,
            correct_index: question.correct_index,
            correct: selected_index == question.correct_index,
            score: self.score,
            reveal,
        }
    }

    fn summary_event(&self) -> QuizEvent {
        let total = self.questions.len();
        let accuracy = accuracy_percent(self.score, total);
        QuizEvent::SessionFinished {
            score: self.score,
            total,
            accuracy,
            message: feedback_message(accuracy).to_string(),
            share_url: share::share_url(&self.share, self.score, total, accuracy),
            finished_at: Utc::now(),
        }
    }
}

fn question_reveal(question: &EnrichedQuestion) -> AnswerReveal {
    let record = &question.record;
    AnswerReveal {
        correct_answer: record.correct_answer.clone(),
        video_url: record
            .video_title
            .as_ref()
            .map(|_| format!("https://www.youtube.com/watch?v={}", record.video_id)),
        video_title: record.video_title.clone(),
        song_title: record.song_title.clone(),
        original_artist: record.original_artist.clone(),
        explanation: record.explanation.clone(),
    }
}

pub fn accuracy_percent(score: u32, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((score as f64 / total as f64) * 100.0).round() as u32
}

pub fn feedback_message(accuracy: u32) -> &'static str {
    if accuracy == 100 {
        "Perfect! You identified every single clip!"
    } else if accuracy >= 80 {
        "Excellent! You really know these clips!"
    } else if accuracy >= 60 {
        "Nice work! A little more and you're an expert!"
    } else if accuracy >= 40 {
        "Not bad! Give it another spin!"
    } else {
        "Keep at it! You can retry as often as you like!"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::QuestionRecord;

    fn share_config() -> ShareConfig {
        ShareConfig {
            page_url: String::new(),
            hashtag: "#clipquiz".to_string(),
        }
    }

    fn question(n: usize, correct_index: usize) -> EnrichedQuestion {
        let options: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        EnrichedQuestion {
            record: QuestionRecord {
                question: format!("Question {n}"),
                correct_answer: options[correct_index].clone(),
                video_id: "dQw4w9WgXcQ".to_string(),
                start_time: Some(30),
                video_title: Some(format!("Video {n}")),
                song_title: None,
                original_artist: None,
                explanation: None,
            },
            options,
            correct_index,
        }
    }

    fn questions(count: usize) -> Vec<EnrichedQuestion> {
        (0..count).map(|n| question(n, n % 4)).collect()
    }

    fn engine_with(count: usize) -> QuizEngine {
        let mut engine = QuizEngine::new(share_config());
        engine.begin(questions(count));
        engine
    }

    #[test]
    fn begin_presents_the_first_question() {
        let mut engine = QuizEngine::new(share_config());
        let events = engine.begin(questions(3));

        assert_eq!(engine.phase(), SessionPhase::InQuestion);
        assert_eq!(engine.total_questions(), 3);
        match &events[..] {
            [QuizEvent::QuestionPresented { number, total, score, options, video, .. }] => {
                assert_eq!(*number, 1);
                assert_eq!(*total, 3);
                assert_eq!(*score, 0);
                assert_eq!(options.len(), 4);
                assert_eq!(video.start_seconds, 30);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn three_of_five_scores_sixty_percent() {
        let mut engine = engine_with(5);

        // Correct on questions 1-3, wrong on 4-5.
        for round in 0..5 {
            let correct_index = round % 4;
            let selection = if round < 3 {
                correct_index
            } else {
                (correct_index + 1) % 4
            };
            let judged = engine.select_option(selection);
            assert_eq!(judged.len(), 1);
            let events = engine.advance();

            if round < 4 {
                assert!(matches!(
                    events[..],
                    [QuizEvent::QuestionPresented { .. }]
                ));
            } else {
                match &events[..] {
                    [QuizEvent::SessionFinished { score, total, accuracy, message, share_url, .. }] => {
                        assert_eq!(*score, 3);
                        assert_eq!(*total, 5);
                        assert_eq!(*accuracy, 60);
                        assert_eq!(*message, feedback_message(60));
                        assert!(share_url.contains("60%25"));
                    }
                    other => panic!("unexpected events: {other:?}"),
                }
            }
        }

        assert_eq!(engine.phase(), SessionPhase::Summary);
        assert_eq!(engine.score(), 3);
    }

    #[test]
    fn second_selection_on_the_same_question_is_ignored() {
        let mut engine = engine_with(2);

        let first = engine.select_option(0);
        assert_eq!(first.len(), 1);
        assert_eq!(engine.score(), 1);

        // Neither a repeat nor a different option changes anything.
        assert!(engine.select_option(0).is_empty());
        assert!(engine.select_option(2).is_empty());
        assert_eq!(engine.score(), 1);
    }

    #[test]
    fn advance_before_answering_is_a_no_op() {
        let mut engine = engine_with(2);
        assert!(engine.advance().is_empty());
        assert_eq!(engine.phase(), SessionPhase::InQuestion);
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let mut engine = engine_with(1);
        assert!(engine.select_option(99).is_empty());
        assert_eq!(engine.score(), 0);

        // The question is still answerable afterwards.
        assert_eq!(engine.select_option(0).len(), 1);
    }

    #[test]
    fn selection_outside_a_question_is_ignored() {
        let mut engine = QuizEngine::new(share_config());
        assert!(engine.select_option(0).is_empty());

        engine.begin(questions(1));
        engine.select_option(0);
        engine.advance();
        assert_eq!(engine.phase(), SessionPhase::Summary);
        assert!(engine.select_option(0).is_empty());
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut engine = engine_with(3);
        engine.select_option(0);

        let events = engine.reset();
        assert!(matches!(events[..], [QuizEvent::SessionReset]));
        assert_eq!(engine.phase(), SessionPhase::Idle);
        assert_eq!(engine.total_questions(), 0);
        assert_eq!(engine.score(), 0);
    }

    #[test]
    fn begin_discards_a_previous_run() {
        let mut engine = engine_with(2);
        engine.select_option(0);
        engine.advance();

        let events = engine.begin(questions(4));
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.total_questions(), 4);
        assert!(matches!(
            events[..],
            [QuizEvent::QuestionPresented { number: 1, total: 4, .. }]
        ));
    }

    #[test]
    fn resync_replays_the_current_view() {
        let mut engine = QuizEngine::new(share_config());
        assert!(engine.resync_events().is_empty());

        engine.begin(questions(2));
        assert!(matches!(
            engine.resync_events()[..],
            [QuizEvent::QuestionPresented { .. }]
        ));

        engine.select_option(1);
        let events = engine.resync_events();
        assert!(matches!(
            events[..],
            [
                QuizEvent::QuestionPresented { .. },
                QuizEvent::AnswerJudged { selected_index: 1, .. }
            ]
        ));

        engine.advance();
        engine.select_option(0);
        engine.advance();
        assert!(matches!(
            engine.resync_events()[..],
            [QuizEvent::SessionFinished { .. }]
        ));
    }

    #[test]
    fn accuracy_rounds_to_nearest_integer() {
        assert_eq!(accuracy_percent(0, 0), 0);
        assert_eq!(accuracy_percent(1, 3), 33);
        assert_eq!(accuracy_percent(2, 3), 67);
        assert_eq!(accuracy_percent(5, 5), 100);
    }

    #[test]
    fn feedback_tiers_match_their_thresholds() {
        assert_eq!(feedback_message(100), feedback_message(100));
        assert_ne!(feedback_message(100), feedback_message(99));
        assert_eq!(feedback_message(80), feedback_message(99));
        assert_eq!(feedback_message(60), feedback_message(79));
        assert_eq!(feedback_message(40), feedback_message(59));
        assert_eq!(feedback_message(0), feedback_message(39));
        assert_ne!(feedback_message(40), feedback_message(60));
    }
}
