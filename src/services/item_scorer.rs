//! Diagnostic item scoring.
//!
//! Turns raw learner answers (a selected option, a short text, an audio
//! transcript from the speech collaborator) into item scores in [0,1] using
//! the scoring rule attached to each item of the assessment bank.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Domain, ItemResponse, ItemType};

const BUILTIN_BANK: &str = include_str!("../../data/assessment_v1.yaml");

/// One rule of a single-choice item; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRule {
    /// Exact option id
    #[serde(default)]
    pub option: Option<String>,
    /// Any of these option ids
    #[serde(default)]
    pub any_of: Vec<String>,
    /// Any non-empty selection (profile questions)
    #[serde(default)]
    pub any_selection: bool,
    pub score: f64,
}

impl ChoiceRule {
    fn matches(&self, response: &str) -> bool {
        if self.option.as_deref() == Some(response) {
            return true;
        }
        if self.any_selection && !response.is_empty() {
            return true;
        }
        self.any_of.iter().any(|o| o == response)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfIntroParams {
    #[serde(default = "default_min_sentences")]
    pub min_sentences: usize,
    #[serde(default)]
    pub basic_verbs: Vec<String>,
    #[serde(default)]
    pub topic_words: Vec<String>,
    #[serde(default)]
    pub weights: SelfIntroWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfIntroWeights {
    pub sentences: f64,
    pub basic_verbs: f64,
    pub topic_words: f64,
    /// Bonus for a long answer that also meets the sentence count
    pub length_bonus: f64,
}

impl Default for SelfIntroWeights {
    fn default() -> Self {
        Self {
            sentences: 0.3,
            basic_verbs: 0.3,
            topic_words: 0.2,
            length_bonus: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastRoutineParams {
    #[serde(default = "default_min_sentences")]
    pub min_sentences: usize,
    #[serde(default = "default_past_tense_regex")]
    pub past_tense_regex: String,
    #[serde(default)]
    pub content_words: Vec<String>,
    #[serde(default = "default_min_content_words")]
    pub min_content_words: usize,
    #[serde(default)]
    pub weights: PastRoutineWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastRoutineWeights {
    pub sentences: f64,
    pub past_tense: f64,
    pub content_words: f64,
}

impl Default for PastRoutineWeights {
    fn default() -> Self {
        Self {
            sentences: 0.3,
            past_tense: 0.4,
            content_words: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliteRewriteParams {
    #[serde(default = "default_address_terms")]
    pub address_terms: Vec<String>,
    #[serde(default = "default_apology_terms")]
    pub apology_terms: Vec<String>,
    #[serde(default = "default_polite_endings_regex")]
    pub polite_endings_regex: String,
    #[serde(default)]
    pub request_keywords: Vec<String>,
    #[serde(default = "default_casual_endings_regex")]
    pub casual_endings_regex: String,
    #[serde(default)]
    pub weights: PoliteRewriteWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliteRewriteWeights {
    pub address: f64,
    pub apology: f64,
    pub polite_endings: f64,
    pub request_content: f64,
    /// Added (negative) when casual endings remain
    pub casual_penalty: f64,
}

impl Default for PoliteRewriteWeights {
    fn default() -> Self {
        Self {
            address: 0.2,
            apology: 0.2,
            polite_endings: 0.4,
            request_content: 0.2,
            casual_penalty: -0.3,
        }
    }
}

const fn default_min_sentences() -> usize {
    2
}

const fn default_min_content_words() -> usize {
    3
}

fn default_past_tense_regex() -> String {
    "(았|었|했)".to_string()
}

fn default_address_terms() -> Vec<String> {
    vec!["교수님".to_string()]
}

fn default_apology_terms() -> Vec<String> {
    vec!["죄송".to_string(), "실례".to_string()]
}

fn default_polite_endings_regex() -> String {
    "(요|습니다)".to_string()
}

fn default_casual_endings_regex() -> String {
    r"(어\?|어\.|했어|냈어|돼\?)".to_string()
}

/// Scoring rule attached to an assessment item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ScoringRule {
    SingleChoice { rules: Vec<ChoiceRule> },
    SelfIntro(SelfIntroParams),
    PastRoutine(PastRoutineParams),
    PoliteRewrite(PoliteRewriteParams),
    /// Audio read of isolated words, scored on the transcript
    WordList { target_words: Vec<String> },
    /// Audio read of full sentences, scored on the transcript
    SentenceRead { target_sentences: Vec<String> },
}

impl ScoringRule {
    pub fn item_type(&self) -> ItemType {
        match self {
            Self::SingleChoice { .. } => ItemType::MultipleChoice,
            Self::SelfIntro(_) | Self::PastRoutine(_) | Self::PoliteRewrite(_) => ItemType::FreeText,
            Self::WordList { .. } | Self::SentenceRead { .. } => ItemType::AudioRead,
        }
    }
}

/// A diagnostic item and the domains it informs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentItem {
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    /// Domain shares; an item may inform several domains
    pub domains: BTreeMap<Domain, f64>,
    pub scoring: ScoringRule,
}

/// Versioned bank of diagnostic items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentBank {
    pub version: u32,
    pub items: Vec<AssessmentItem>,
}

impl AssessmentBank {
    /// The bank shipped with the crate.
    pub fn builtin() -> DomainResult<Self> {
        Self::from_yaml(BUILTIN_BANK)
    }

    pub fn from_yaml(yaml: &str) -> DomainResult<Self> {
        let bank: Self = serde_yaml::from_str(yaml)?;
        for item in &bank.items {
            if item.domains.values().any(|share| !share.is_finite() || *share < 0.0) {
                return Err(DomainError::InvalidInput(format!(
                    "item {} has a negative or non-finite domain share",
                    item.id
                )));
            }
        }
        Ok(bank)
    }

    pub fn item(&self, id: &str) -> Option<&AssessmentItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Score raw answers keyed by item id.
    ///
    /// Unanswered or blank items are skipped rather than scored as zero, so a
    /// domain whose items were all skipped ends up unassessed. Answers to
    /// unknown items are ignored.
    pub fn score_responses(
        &self,
        responses: &BTreeMap<String, String>,
    ) -> DomainResult<Vec<ItemResponse>> {
        for id in responses.keys() {
            if self.item(id).is_none() {
                warn!(item_id = %id, "ignoring response to unknown assessment item");
            }
        }

        let mut scored = Vec::new();
        for item in &self.items {
            let Some(answer) = responses.get(&item.id).map(|a| a.trim()) else {
                continue;
            };
            if answer.is_empty() {
                continue;
            }

            let score = score_item(&item.scoring, answer)?;
            debug!(item_id = %item.id, score, "scored assessment item");

            for (domain, share) in &item.domains {
                if *share > 0.0 {
                    scored.push(
                        ItemResponse::new(item.id.clone(), item.scoring.item_type(), *domain, score)
                            .with_share(*share),
                    );
                }
            }
        }
        Ok(scored)
    }
}

/// Score one answer against a rule. Always returns a value in [0,1].
pub fn score_item(rule: &ScoringRule, response: &str) -> DomainResult<f64> {
    let score = match rule {
        ScoringRule::SingleChoice { rules } => rules
            .iter()
            .find(|r| r.matches(response))
            .map_or(0.0, |r| r.score),
        ScoringRule::SelfIntro(params) => score_self_intro(response, params),
        ScoringRule::PastRoutine(params) => score_past_routine(response, params)?,
        ScoringRule::PoliteRewrite(params) => score_polite_rewrite(response, params)?,
        ScoringRule::WordList { target_words } => score_word_list(response, target_words),
        ScoringRule::SentenceRead { target_sentences } => {
            score_sentence_read(response, target_sentences)
        }
    };
    Ok(score.clamp(0.0, 1.0))
}

/// Count sentences by terminal punctuation; non-empty text has at least one.
pub fn count_sentences(text: &str) -> usize {
    if text.trim().is_empty() {
        return 0;
    }
    let endings = text.chars().filter(|c| matches!(c, '.' | '?' | '!' | '。')).count();
    endings.max(1)
}

fn count_present(text: &str, words: &[String]) -> usize {
    words.iter().filter(|w| text.contains(w.as_str())).count()
}

/// Full weight at `full` hits, half weight at one hit.
fn tiered(hits: usize, full: usize, weight: f64) -> f64 {
    if hits >= full {
        weight
    } else if hits >= 1 {
        weight * 0.5
    } else {
        0.0
    }
}

fn compile(pattern: &str) -> DomainResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| DomainError::InvalidInput(format!("invalid pattern '{pattern}': {e}")))
}

fn score_self_intro(text: &str, params: &SelfIntroParams) -> f64 {
    let w = &params.weights;
    let sentences = count_sentences(text);

    let mut score = tiered(sentences, params.min_sentences, w.sentences);
    score += tiered(count_present(text, &params.basic_verbs), 2, w.basic_verbs);
    score += tiered(count_present(text, &params.topic_words), 2, w.topic_words);

    if text.chars().count() > 50 && sentences >= params.min_sentences {
        score += w.length_bonus;
    }
    score
}

fn score_past_routine(text: &str, params: &PastRoutineParams) -> DomainResult<f64> {
    let w = &params.weights;
    let sentences = count_sentences(text);
    let mut score = tiered(sentences, params.min_sentences, w.sentences);

    let past = compile(&params.past_tense_regex)?.find_iter(text).count();
    if past >= 2 {
        score += w.past_tense;
    } else if past == 1 {
        score += w.past_tense * 0.6;
    }

    let content = count_present(text, &params.content_words);
    let min_content = params.min_content_words.max(1);
    if content >= min_content {
        score += w.content_words;
    } else {
        score += w.content_words * (content as f64 / min_content as f64);
    }
    Ok(score)
}

fn score_polite_rewrite(text: &str, params: &PoliteRewriteParams) -> DomainResult<f64> {
    let w = &params.weights;
    let mut score = 0.0;

    if count_present(text, &params.address_terms) > 0 {
        score += w.address;
    }
    if count_present(text, &params.apology_terms) > 0 {
        score += w.apology;
    }
    if compile(&params.polite_endings_regex)?.is_match(text) {
        score += w.polite_endings;
    }
    if count_present(text, &params.request_keywords) >= 2 {
        score += w.request_content;
    }
    if compile(&params.casual_endings_regex)?.is_match(text) {
        score += w.casual_penalty;
    }
    Ok(score)
}

/// Map a transcript match ratio onto the coarse audio score scale.
fn ratio_to_score(ratio: f64) -> f64 {
    if ratio >= 0.85 {
        1.0
    } else if ratio >= 0.7 {
        0.7
    } else if ratio >= 0.5 {
        0.4
    } else {
        0.2
    }
}

fn score_word_list(transcript: &str, target_words: &[String]) -> f64 {
    if target_words.is_empty() {
        return ratio_to_score(0.0);
    }
    let ratio = count_present(transcript, target_words) as f64 / target_words.len() as f64;
    ratio_to_score(ratio)
}

fn score_sentence_read(transcript: &str, target_sentences: &[String]) -> f64 {
    let total: usize = target_sentences
        .iter()
        .map(|s| s.chars().filter(|c| !c.is_whitespace()).count())
        .sum();
    if total == 0 {
        return ratio_to_score(0.0);
    }

    let overlap = transcript
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter(|c| target_sentences.iter().any(|s| s.contains(*c)))
        .count();
    ratio_to_score(overlap as f64 / total as f64)
}
