//! Rule-based news sentiment
//!
//! Scoring follows the VADER approach: per-token lexicon valence, adjusted for
//! boosters, ALL-CAPS emphasis, negation and contrastive "but", then summed and
//! squashed into a compound score in [-1, 1]. The compound score is reduced to
//! a three-way label with fixed thresholds.

use crate::analysis::lexicon::Lexicon;
use crate::models::NewsItem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Compound score above which text is labelled [`SentimentLabel::Good`]
pub const POSITIVE_THRESHOLD: f64 = 0.05;
/// Compound score below which text is labelled [`SentimentLabel::Bad`]
pub const NEGATIVE_THRESHOLD: f64 = -0.05;
/// Number of most recent news items scored per instrument
pub const DEFAULT_NEWS_WINDOW: usize = 10;

const BOOSTER_INCR: f64 = 0.293;
const BOOSTER_DECR: f64 = -0.293;
const CAPS_INCR: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const NORMALIZATION_ALPHA: f64 = 15.0;

const NEGATIONS: &[&str] = &[
    "aint", "arent", "cannot", "cant", "couldnt", "darent", "didnt", "doesnt", "dont", "hadnt",
    "hasnt", "havent", "isnt", "mightnt", "mustnt", "neednt", "oughtnt", "shant", "shouldnt",
    "wasnt", "werent", "wont", "wouldnt", "neither", "never", "no", "none", "nope", "nor", "not",
    "nothing", "nowhere", "without", "rarely", "seldom", "despite", "uhuh", "uh-uh",
];

const BOOSTERS_UP: &[&str] = &[
    "absolutely", "amazingly", "awfully", "completely", "considerably", "decidedly", "deeply",
    "enormously", "entirely", "especially", "exceptionally", "extremely", "greatly", "highly",
    "hugely", "incredibly", "intensely", "majorly", "more", "most", "particularly", "purely",
    "quite", "really", "remarkably", "sharply", "significantly", "so", "substantially",
    "thoroughly", "totally", "tremendously", "unbelievably", "unusually", "utterly", "very",
];

const BOOSTERS_DOWN: &[&str] = &[
    "almost", "barely", "hardly", "kinda", "less", "little", "marginally", "modestly",
    "occasionally", "partly", "scarcely", "slightly", "somewhat", "sorta",
];

/// Three-way sentiment decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    Good,
    Bad,
    Neutral,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SentimentLabel::Good => "Good",
            SentimentLabel::Bad => "Bad",
            SentimentLabel::Neutral => "Neutral",
        })
    }
}

/// Map a compound score to a label. Both thresholds are strict.
pub fn label_for(compound: f64) -> SentimentLabel {
    if compound > POSITIVE_THRESHOLD {
        SentimentLabel::Good
    } else if compound < NEGATIVE_THRESHOLD {
        SentimentLabel::Bad
    } else {
        SentimentLabel::Neutral
    }
}

/// A scored news item, kept for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineSentiment {
    pub title: String,
    pub compound: f64,
    pub label: SentimentLabel,
}

/// Lexicon-driven sentiment classifier
///
/// Cheap to clone; the lexicon is shared.
#[derive(Debug, Clone)]
pub struct SentimentClassifier {
    lexicon: Arc<Lexicon>,
}

impl Default for SentimentClassifier {
    fn default() -> Self {
        Self::new(Arc::new(Lexicon::builtin()))
    }
}

impl SentimentClassifier {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Classify free text
    pub fn classify(&self, text: &str) -> SentimentLabel {
        label_for(self.polarity(text))
    }

    /// Compound polarity score in [-1, 1]; empty text scores 0
    pub fn polarity(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return 0.0;
        }

        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let caps_count = tokens.iter().filter(|t| is_all_caps(t)).count();
        let cap_differential = caps_count > 0 && caps_count < tokens.len();

        let mut valences: Vec<f64> = (0..tokens.len())
            .map(|i| self.token_valence(&tokens, &lowered, i, cap_differential))
            .collect();

        apply_but_rule(&lowered, &mut valences);

        let mut sum: f64 = valences.iter().sum();
        let emphasis = punctuation_emphasis(text);
        if sum > 0.0 {
            sum += emphasis;
        } else if sum < 0.0 {
            sum -= emphasis;
        }

        normalize(sum)
    }

    /// Labels for the last `window` items, scored by summary, in stream order
    pub fn analyze_news_stream(&self, items: &[NewsItem], window: usize) -> Vec<SentimentLabel> {
        tail(items, window)
            .iter()
            .map(|item| self.classify(&item.summary))
            .collect()
    }

    /// Same selection as [`Self::analyze_news_stream`], keeping titles and scores
    pub fn score_news_stream(&self, items: &[NewsItem], window: usize) -> Vec<HeadlineSentiment> {
        tail(items, window)
            .iter()
            .map(|item| {
                let compound = self.polarity(&item.summary);
                HeadlineSentiment {
                    title: item.title.clone(),
                    compound,
                    label: label_for(compound),
                }
            })
            .collect()
    }

    fn token_valence(
        &self,
        tokens: &[&str],
        lowered: &[String],
        i: usize,
        cap_differential: bool,
    ) -> f64 {
        let word = lowered[i].as_str();
        if booster_scalar(word).is_some() {
            return 0.0;
        }
        let Some(mut valence) = self.lexicon.valence(word) else {
            return 0.0;
        };

        if cap_differential && is_all_caps(tokens[i]) {
            valence += CAPS_INCR.copysign(valence);
        }

        for distance in 0..3 {
            if i <= distance {
                break;
            }
            let prev = i - distance - 1;
            if self.lexicon.contains(&lowered[prev]) {
                continue;
            }

            let mut scalar =
                scalar_inc_dec(tokens[prev], &lowered[prev], valence, cap_differential);
            match distance {
                1 => scalar *= 0.95,
                2 => scalar *= 0.9,
                _ => {}
            }
            valence += scalar;
            valence = negation_check(valence, lowered, distance, i);
        }

        valence
    }
}

fn tail(items: &[NewsItem], window: usize) -> &[NewsItem] {
    &items[items.len().saturating_sub(window)..]
}

/// Split on whitespace and strip surrounding punctuation, unless stripping
/// would leave two characters or fewer (keeps emoticons like `:)`).
fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|raw| {
            let stripped = raw.trim_matches(|c: char| c.is_ascii_punctuation());
            if stripped.chars().count() <= 2 { raw } else { stripped }
        })
        .filter(|token| token.chars().count() > 1)
        .collect()
}

fn is_all_caps(token: &str) -> bool {
    token.chars().any(char::is_alphabetic)
        && token.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase)
}

fn booster_scalar(word: &str) -> Option<f64> {
    if BOOSTERS_UP.contains(&word) {
        Some(BOOSTER_INCR)
    } else if BOOSTERS_DOWN.contains(&word) {
        Some(BOOSTER_DECR)
    } else {
        None
    }
}

fn scalar_inc_dec(token: &str, word: &str, valence: f64, cap_differential: bool) -> f64 {
    let Some(mut scalar) = booster_scalar(word) else {
        return 0.0;
    };
    if valence < 0.0 {
        scalar = -scalar;
    }
    if cap_differential && is_all_caps(token) {
        scalar += if valence > 0.0 { CAPS_INCR } else { -CAPS_INCR };
    }
    scalar
}

fn is_negated(word: &str) -> bool {
    NEGATIONS.contains(&word) || word.contains("n't")
}

fn negation_check(valence: f64, lowered: &[String], distance: usize, i: usize) -> f64 {
    let word = |offset: usize| lowered[i - offset].as_str();
    match distance {
        0 => {
            if is_negated(word(1)) {
                return valence * NEGATION_SCALAR;
            }
        }
        1 => {
            if word(2) == "never" && matches!(word(1), "so" | "this") {
                return valence * 1.25;
            }
            if word(2) == "without" && word(1) == "doubt" {
                return valence;
            }
            if is_negated(word(2)) {
                return valence * NEGATION_SCALAR;
            }
        }
        _ => {
            if word(3) == "never"
                && (matches!(word(2), "so" | "this") || matches!(word(1), "so" | "this"))
            {
                return valence * 1.25;
            }
            if word(3) == "without" && (word(2) == "doubt" || word(1) == "doubt") {
                return valence;
            }
            if is_negated(word(3)) {
                return valence * NEGATION_SCALAR;
            }
        }
    }
    valence
}

/// Valence before "but" is dampened, after it amplified
fn apply_but_rule(lowered: &[String], valences: &mut [f64]) {
    let Some(pivot) = lowered.iter().position(|w| w == "but") else {
        return;
    };
    for (i, valence) in valences.iter_mut().enumerate() {
        if i < pivot {
            *valence *= 0.5;
        } else if i > pivot {
            *valence *= 1.5;
        }
    }
}

fn punctuation_emphasis(text: &str) -> f64 {
    let exclamations = text.chars().filter(|&c| c == '!').count().min(4);
    let questions = text.chars().filter(|&c| c == '?').count();

    let question_boost = match questions {
        0 | 1 => 0.0,
        2 | 3 => questions as f64 * 0.18,
        _ => 0.96,
    };

    exclamations as f64 * 0.292 + question_boost
}

fn normalize(score: f64) -> f64 {
    let normalized = score / (score * score + NORMALIZATION_ALPHA).sqrt();
    normalized.clamp(-1.0, 1.0)
}
