use crate::{
    job::Outcome,
    sentiment::{Sentiment, SentimentTally},
    table::FrequencyEntry,
};
use std::{fmt, time::Duration};

pub const DEFAULT_TOP_N: usize = 20;

/// Final summary of a run. Built from the global tables, which are dropped
/// once their top entries are taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub top_words: Vec<FrequencyEntry>,
    pub unique_words: usize,
    pub top_artists: Vec<FrequencyEntry>,
    pub unique_artists: usize,
    pub sentiment: SentimentTally,
    pub records: u64,
    pub malformed: u64,
    pub truncated: u64,
    pub elapsed: Duration,
}

impl Report {
    pub fn build(outcome: Outcome, top_n: usize, elapsed: Duration) -> Self {
        let Outcome {
            words,
            artists,
            sentiment,
            stats,
        } = outcome;
        Self {
            top_words: words.top(top_n),
            unique_words: words.len(),
            top_artists: artists.top(top_n),
            unique_artists: artists.len(),
            sentiment,
            records: stats.records,
            malformed: stats.malformed,
            truncated: stats.truncated,
            elapsed,
        }
    }

    /// Valid records per second, 0 for an instantaneous run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.records as f64 / secs
        } else {
            0.0
        }
    }
}

fn write_ranking(f: &mut fmt::Formatter<'_>, title: &str, unique: usize, entries: &[FrequencyEntry]) -> fmt::Result {
    writeln!(f, "== top {} {} ({} unique) ==", entries.len(), title, unique)?;
    let width = entries.iter().map(|e| e.key.chars().count()).max().unwrap_or(0);
    for (i, entry) in entries.iter().enumerate() {
        writeln!(f, "{:>3}. {:<width$}  {}", i + 1, entry.key, entry.count, width = width)?;
    }
    Ok(())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ranking(f, "words", self.unique_words, &self.top_words)?;
        writeln!(f)?;
        write_ranking(f, "artists", self.unique_artists, &self.top_artists)?;
        writeln!(f)?;

        writeln!(f, "== sentiment ==")?;
        for sentiment in Sentiment::ALL.iter().copied() {
            writeln!(
                f,
                "{:<9} {:>8}  {:>6.2}%",
                sentiment.to_string(),
                self.sentiment.count(sentiment),
                self.sentiment.percentage(sentiment)
            )?;
        }
        writeln!(
            f,
            "classified {}, failed {}",
            self.sentiment.total_classified(),
            self.sentiment.failed
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "{} records ({} malformed skipped, {} truncated) in {:.3}s, {:.1} records/s",
            self.records,
            self.malformed,
            self.truncated,
            self.elapsed.as_secs_f64(),
            self.throughput()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{job::ShardStats, table::FrequencyTable};

    fn outcome() -> Outcome {
        Outcome {
            words: vec![("love", 5), ("baby", 5), ("night", 2), ("sad", 1)]
                .into_iter()
                .collect(),
            artists: vec![("ABBA", 3), ("Queen", 4)].into_iter().collect::<FrequencyTable>(),
            sentiment: SentimentTally {
                positive: 3,
                neutral: 0,
                negative: 1,
                failed: 2,
            },
            stats: ShardStats {
                chunks: 2,
                records: 7,
                malformed: 1,
                truncated: 0,
            },
        }
    }

    #[test]
    fn builds_rankings() {
        let report = Report::build(outcome(), 3, Duration::from_secs(2));
        let words = report.top_words.iter().map(|e| e.key.as_str()).collect::<Vec<_>>();
        assert_eq!(words, ["baby", "love", "night"]);
        assert_eq!(report.unique_words, 4);
        assert_eq!(report.top_artists[0].key, "Queen");
        assert_eq!(report.unique_artists, 2);
        assert!((report.throughput() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_has_zero_throughput() {
        let report = Report::build(Outcome::default(), DEFAULT_TOP_N, Duration::default());
        assert_eq!(report.throughput(), 0.0);
        assert!(report.top_words.is_empty());
        assert_eq!(report.sentiment.percentage(Sentiment::Neutral), 0.0);
    }

    #[test]
    fn summary_mentions_every_bucket() {
        let text = Report::build(outcome(), 2, Duration::from_millis(500)).to_string();
        assert!(text.contains("positive"));
        assert!(text.contains("75.00%"));
        assert!(text.contains("25.00%"));
        assert!(text.contains("classified 4, failed 2"));
        assert!(text.contains("14.0 records/s"));
        assert!(!text.contains("night"));
    }
}
