//! Journal summaries: label counts, average score, the current day streak and a
//! per-day score trend. Days are calendar days in UTC.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Serializer};
use time::{Date, UtcOffset};

use super::sentiment::Label;
use crate::db::Mood;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoodCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayScore {
    #[serde(serialize_with = "as_display")]
    pub day: Date,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub mood_counts: MoodCounts,
    pub total_entries: usize,
    pub current_streak: u32,
    pub avg_sentiment: f64,
    pub mood_trend: Vec<DayScore>,
}

fn as_display<S: Serializer>(day: &Date, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(day)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn day_of(mood: &Mood) -> Date {
    mood.timestamp.to_offset(UtcOffset::UTC).date()
}

pub fn summarize(moods: &[Mood]) -> Insights {
    let mut mood_counts = MoodCounts::default();
    for mood in moods {
        match Label::for_score(mood.score) {
            Label::Positive => mood_counts.positive += 1,
            Label::Neutral => mood_counts.neutral += 1,
            Label::Negative => mood_counts.negative += 1,
        }
    }

    let avg_sentiment = if moods.is_empty() {
        0.0
    } else {
        round2(moods.iter().map(|m| m.score).sum::<f64>() / moods.len() as f64)
    };

    Insights {
        mood_counts,
        total_entries: moods.len(),
        current_streak: current_streak(moods),
        avg_sentiment,
        mood_trend: daily_trend(moods),
    }
}

/// Consecutive days with at least one entry, counted back from the day of the
/// most recent entry.
pub fn current_streak(moods: &[Mood]) -> u32 {
    let days: BTreeSet<Date> = moods.iter().map(day_of).collect();
    let mut newest_first = days.into_iter().rev();
    let Some(latest) = newest_first.next() else {
        return 0;
    };

    let mut streak = 1;
    let mut expected = latest.previous_day();
    for day in newest_first {
        if Some(day) != expected {
            break;
        }
        streak += 1;
        expected = day.previous_day();
    }
    streak
}

/// Mean score per day, oldest day first.
pub fn daily_trend(moods: &[Mood]) -> Vec<DayScore> {
    let mut days: BTreeMap<Date, (f64, u32)> = BTreeMap::new();
    for mood in moods {
        let (sum, n) = days.entry(day_of(mood)).or_default();
        *sum += mood.score;
        *n += 1;
    }
    days.into_iter()
        .map(|(day, (sum, n))| DayScore {
            day,
            score: round2(sum / f64::from(n)),
        })
        .collect()
}
