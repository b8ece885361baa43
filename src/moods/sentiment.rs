//! Word-list sentiment scoring for journal entries.
//!
//! Each known word carries a weight in -5..=5 (AFINN scale). An entry's raw score
//! is the sum of its word weights; the stored score is `raw / 10` clamped to
//! [-1, 1], and the label is derived from that.

const NEUTRAL_BAND: f64 = 0.05;

const LEXICON: &[(&str, i32)] = &[
    ("amazing", 4),
    ("angry", -3),
    ("annoyed", -2),
    ("anxious", -2),
    ("awesome", 4),
    ("awful", -3),
    ("bad", -3),
    ("beautiful", 3),
    ("best", 3),
    ("better", 2),
    ("bored", -2),
    ("calm", 2),
    ("cheerful", 2),
    ("confident", 2),
    ("crying", -2),
    ("depressed", -2),
    ("disappointed", -2),
    ("down", -1),
    ("excited", 3),
    ("exhausted", -2),
    ("fantastic", 4),
    ("fine", 2),
    ("frustrated", -2),
    ("fun", 4),
    ("glad", 3),
    ("good", 3),
    ("grateful", 3),
    ("great", 3),
    ("happy", 3),
    ("hate", -3),
    ("hopeful", 2),
    ("hopeless", -2),
    ("horrible", -3),
    ("hurt", -2),
    ("joy", 3),
    ("lonely", -2),
    ("love", 3),
    ("loved", 3),
    ("mad", -3),
    ("miserable", -3),
    ("nervous", -2),
    ("nice", 3),
    ("ok", 0),
    ("okay", 0),
    ("overwhelmed", -2),
    ("peaceful", 2),
    ("proud", 2),
    ("relaxed", 2),
    ("sad", -2),
    ("scared", -2),
    ("sick", -2),
    ("stressed", -2),
    ("terrible", -3),
    ("thankful", 2),
    ("tired", -2),
    ("upset", -2),
    ("wonderful", 4),
    ("worried", -3),
    ("worst", -3),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Positive,
    Negative,
    Neutral,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Negative => "negative",
            Label::Neutral => "neutral",
        }
    }

    /// Scores inside the neutral band around zero are neutral.
    pub fn for_score(score: f64) -> Self {
        if score > NEUTRAL_BAND {
            Label::Positive
        } else if score < -NEUTRAL_BAND {
            Label::Negative
        } else {
            Label::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    pub label: Label,
    pub score: f64,
}

fn weight(word: &str) -> i32 {
    LEXICON
        .binary_search_by(|(w, _)| (*w).cmp(word))
        .map(|i| LEXICON[i].1)
        .unwrap_or(0)
}

pub fn analyze(text: &str) -> Sentiment {
    let raw: i32 = text
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(|w| weight(&w.to_lowercase()))
        .sum();
    let score = (f64::from(raw) / 10.0).clamp(-1.0, 1.0);
    Sentiment {
        label: Label::for_score(score),
        score,
    }
}
