use crate::{
    distribution::Policy,
    reader::Chunk,
    record::{Dialect, FieldLimits, ParseError},
    sentiment::SentimentTally,
    table::{FrequencyTable, Merge},
    Result,
};
use eyre::eyre;
use std::{fmt, mem, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Words,
    Artists,
    Sentiment,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Words, Phase::Artists, Phase::Sentiment];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn produces_table(self) -> bool {
        !matches!(self, Phase::Sentiment)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Words => write!(f, "words"),
            Phase::Artists => write!(f, "artists"),
            Phase::Sentiment => write!(f, "sentiment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentMode {
    /// Every worker classifies its own shard.
    Distributed,
    /// Only rank 0 classifies, serially, from the first record, up to the sample cap.
    CoordinatorOnly,
}

impl fmt::Display for SentimentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentMode::Distributed => write!(f, "distributed"),
            SentimentMode::CoordinatorOnly => write!(f, "coordinator"),
        }
    }
}

impl FromStr for SentimentMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "distributed" => Ok(SentimentMode::Distributed),
            "coordinator" | "coordinator-only" => Ok(SentimentMode::CoordinatorOnly),
            _ => Err(ParseError::new("sentiment mode", s)),
        }
    }
}

/// Everything every worker must agree on to compute its shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlan {
    pub dialect: Dialect,
    pub chunk_size: u64,
    pub words: Policy,
    pub artists: Policy,
    pub sentiment: Policy,
    pub sentiment_mode: SentimentMode,
    /// Record ceiling of the sampled sentiment path. A capped classifier may lower it.
    pub sentiment_sample: u64,
    pub limits: FieldLimits,
}

impl Default for JobPlan {
    fn default() -> Self {
        Self {
            dialect: Dialect::QuotedComma,
            chunk_size: 1000,
            words: Policy::RoundRobin,
            artists: Policy::Static,
            sentiment: Policy::RoundRobin,
            sentiment_mode: SentimentMode::Distributed,
            sentiment_sample: 100,
            limits: FieldLimits::default(),
        }
    }
}

impl JobPlan {
    pub fn policy(&self, phase: Phase) -> Policy {
        match phase {
            Phase::Words => self.words,
            Phase::Artists => self.artists,
            Phase::Sentiment => self.sentiment,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
    pub chunks: u64,
    pub records: u64,
    pub malformed: u64,
    pub truncated: u64,
}

impl ShardStats {
    pub fn absorb(&mut self, chunk: &Chunk) {
        self.chunks += 1;
        self.records += chunk.actual_count() as u64;
        self.malformed += chunk.malformed;
        self.truncated += chunk.truncated;
    }
}

impl Merge for ShardStats {
    fn merge(self, other: Self) -> Self {
        Self {
            chunks: self.chunks + other.chunks,
            records: self.records + other.records,
            malformed: self.malformed + other.malformed,
            truncated: self.truncated + other.truncated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partial {
    Table(FrequencyTable),
    Tally(SentimentTally),
}

impl Partial {
    pub fn empty(phase: Phase) -> Self {
        if phase.produces_table() {
            Partial::Table(FrequencyTable::default())
        } else {
            Partial::Tally(SentimentTally::default())
        }
    }

    pub fn fits(&self, phase: Phase) -> bool {
        matches!(self, Partial::Table(_)) == phase.produces_table()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Partial::Table(_) => "table",
            Partial::Tally(_) => "tally",
        }
    }

    pub fn into_table(self) -> Option<FrequencyTable> {
        match self {
            Partial::Table(table) => Some(table),
            Partial::Tally(_) => None,
        }
    }

    pub fn into_tally(self) -> Option<SentimentTally> {
        match self {
            Partial::Tally(tally) => Some(tally),
            Partial::Table(_) => None,
        }
    }
}

/// The unit a worker hands to the coordinator; ownership of the partial
/// moves with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialResult {
    pub owner: u32,
    pub phase: Phase,
    pub partial: Partial,
    pub stats: ShardStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub words: FrequencyTable,
    pub artists: FrequencyTable,
    pub sentiment: SentimentTally,
    /// Words-phase stats: every valid record is counted exactly once there.
    pub stats: ShardStats,
}

impl Outcome {
    pub fn absorb(&mut self, phase: Phase, partial: Partial, stats: ShardStats) -> Result<()> {
        match (phase, partial) {
            (Phase::Words, Partial::Table(table)) => {
                self.words = mem::take(&mut self.words).merge(table);
                self.stats = self.stats.merge(stats);
            }
            (Phase::Artists, Partial::Table(table)) => {
                self.artists = mem::take(&mut self.artists).merge(table);
            }
            (Phase::Sentiment, Partial::Tally(tally)) => {
                self.sentiment = self.sentiment.merge(tally);
            }
            (phase, partial) => {
                return Err(eyre!("{} phase cannot absorb a {}", phase, partial.kind()));
            }
        }
        Ok(())
    }
}
