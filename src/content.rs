use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::{ContentConfig, ContentSourceType, QuizConfig};
use crate::error::ContentError;
use crate::game::options;

/// One entry of the externally supplied question bank. Field names follow
/// the camelCase convention of the bank document itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub question: String,
    pub correct_answer: String,
    pub video_id: String,
    #[serde(default)]
    pub start_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBankDocument {
    pub questions: Vec<QuestionRecord>,
}

/// A bank entry with its generated answer set attached.
///
/// Invariant: `options[correct_index]` equals `record.correct_answer`, and
/// no other element does.
#[derive(Debug, Clone)]
pub struct EnrichedQuestion {
    pub record: QuestionRecord,
    pub options: Vec<String>,
    pub correct_index: usize,
}

pub struct QuestionBankParser {
    video_id_re: Regex,
}

impl QuestionBankParser {
    pub fn new() -> Self {
        Self {
            video_id_re: Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id regex is valid"),
        }
    }

    #[tracing::instrument(skip(self, content), fields(content.length = content.len()))]
    pub fn parse(&self, content: &str) -> Result<Vec<QuestionRecord>, ContentError> {
        let document: QuestionBankDocument = serde_json::from_str(content)
            .map_err(|e| ContentError::Parse(format!("invalid question bank JSON: {e}")))?;

        let records: Vec<QuestionRecord> = document
            .questions
            .into_iter()
            .filter(|record| {
                !record.question.trim().is_empty() && !record.correct_answer.trim().is_empty()
            })
            .collect();

        if records.is_empty() {
            return Err(ContentError::EmptyBank);
        }

        for record in &records {
            if !self.video_id_re.is_match(&record.video_id) {
                return Err(ContentError::InvalidVideoId {
                    question: record.question.clone(),
                    video_id: record.video_id.clone(),
                });
            }
        }

        Ok(records)
    }
}

impl Default for QuestionBankParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Distinct correct-answer labels across the bank, first-seen order. This
/// is the wrong-answer pool the option generator samples from.
pub fn distinct_correct_answers(records: &[QuestionRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut pool = Vec::new();
    for record in records {
        if seen.insert(record.correct_answer.clone()) {
            pool.push(record.correct_answer.clone());
        }
    }
    pool
}

/// Attaches a generated option list to every record and shuffles question
/// order. Fails loudly if an option list ever misses its correct answer;
/// the session must not start on a broken bank.
pub fn enrich_bank(
    records: Vec<QuestionRecord>,
    quiz: &QuizConfig,
    rng: &mut impl Rng,
) -> Result<Vec<EnrichedQuestion>, ContentError> {
    let pool = distinct_correct_answers(&records);

    let mut enriched = Vec::with_capacity(records.len());
    for record in records {
        let options = options::build_options(
            quiz.option_policy,
            quiz.option_count,
            &record.correct_answer,
            &pool,
            rng,
        );
        let correct_index = options::correct_index(&options, &record.correct_answer).ok_or_else(
            || ContentError::CorrectOptionMissing {
                answer: record.correct_answer.clone(),
            },
        )?;
        enriched.push(EnrichedQuestion {
            record,
            options,
            correct_index,
        });
    }

    Ok(options::shuffled(&enriched, rng))
}

#[tracing::instrument(skip(config), fields(
    content.source_type = ?config.source_type,
    content.file_path = ?config.file_path,
    content.http_url = ?config.http_url
))]
async fn load_raw_content(config: &ContentConfig) -> Result<String, ContentError> {
    match config.source_type {
        ContentSourceType::File => {
            let file_path = config.file_path.as_ref().ok_or_else(|| {
                ContentError::Config("File path required for file source".to_string())
            })?;
            tracing::debug!(file.path = %file_path, "Loading question bank from file");
            tokio::fs::read_to_string(file_path)
                .await
                .map_err(|e| ContentError::FileRead {
                    path: file_path.clone(),
                    source: e,
                })
        }
        ContentSourceType::Http => {
            let url = config.http_url.as_ref().ok_or_else(|| {
                ContentError::Config("HTTP URL required for http source".to_string())
            })?;
            tracing::debug!(http.url = %url, "Fetching question bank from URL");
            let response = reqwest::get(url)
                .await
                .map_err(|e| ContentError::HttpFetch {
                    url: url.clone(),
                    source: e,
                })?;

            response.text().await.map_err(|e| ContentError::HttpFetch {
                url: url.clone(),
                source: e,
            })
        }
    }
}

/// The single I/O boundary of a quiz session: fetch the bank, enrich every
/// question with options, shuffle question order. Called once per session
/// start; any error aborts the start and is surfaced to the user.
#[tracing::instrument(skip(content, quiz))]
pub async fn load_enriched_bank(
    content: &ContentConfig,
    quiz: &QuizConfig,
) -> Result<Vec<EnrichedQuestion>, ContentError> {
    let raw = load_raw_content(content).await?;
    let records = QuestionBankParser::new().parse(&raw)?;

    let mut rng = rand::thread_rng();
    let enriched = enrich_bank(records, quiz, &mut rng)?;

    tracing::info!(
        questions.count = enriched.len(),
        "Question bank loaded and enriched"
    );
    Ok(enriched)
}
