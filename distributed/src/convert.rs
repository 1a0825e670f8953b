//! Mapping between the wire messages and the domain types of `common`.

use crate::service::{self, submit_partial_request::Payload};
use common::{
    Dialect, FieldLimits, FrequencyTable, JobPlan, Partial, Phase, Policy, SentimentMode,
    SentimentTally, ShardStats,
};
use tonic::Status;

fn invalid(what: &str, raw: i32) -> Status {
    Status::invalid_argument(format!("unknown {} {}", what, raw))
}

pub fn encode_phase(phase: Phase) -> i32 {
    let phase = match phase {
        Phase::Words => service::Phase::Words,
        Phase::Artists => service::Phase::Artists,
        Phase::Sentiment => service::Phase::Sentiment,
    };
    phase as i32
}

pub fn decode_phase(raw: i32) -> Result<Phase, Status> {
    match service::Phase::from_i32(raw) {
        Some(service::Phase::Words) => Ok(Phase::Words),
        Some(service::Phase::Artists) => Ok(Phase::Artists),
        Some(service::Phase::Sentiment) => Ok(Phase::Sentiment),
        None => Err(invalid("phase", raw)),
    }
}

fn encode_policy(policy: Policy) -> i32 {
    let policy = match policy {
        Policy::Static => service::Policy::Static,
        Policy::RoundRobin => service::Policy::RoundRobin,
    };
    policy as i32
}

fn decode_policy(raw: i32) -> Result<Policy, Status> {
    match service::Policy::from_i32(raw) {
        Some(service::Policy::Static) => Ok(Policy::Static),
        Some(service::Policy::RoundRobin) => Ok(Policy::RoundRobin),
        None => Err(invalid("policy", raw)),
    }
}

fn limit(raw: u64) -> Option<usize> {
    match raw {
        0 => None,
        n => Some(n as usize),
    }
}

pub fn encode_plan(plan: &JobPlan) -> service::Plan {
    let dialect = match plan.dialect {
        Dialect::QuotedComma => service::Dialect::QuotedComma,
        Dialect::Pipe => service::Dialect::Pipe,
    };
    let sentiment_mode = match plan.sentiment_mode {
        SentimentMode::Distributed => service::SentimentMode::Distributed,
        SentimentMode::CoordinatorOnly => service::SentimentMode::CoordinatorOnly,
    };
    let raw = |n: Option<usize>| n.map_or(0, |n| n as u64);
    service::Plan {
        dialect: dialect as i32,
        chunk_size: plan.chunk_size,
        words: encode_policy(plan.words),
        artists: encode_policy(plan.artists),
        sentiment: encode_policy(plan.sentiment),
        sentiment_mode: sentiment_mode as i32,
        sentiment_sample: plan.sentiment_sample,
        limits: Some(service::FieldLimits {
            artist: raw(plan.limits.artist),
            title: raw(plan.limits.title),
            lyrics: raw(plan.limits.lyrics),
        }),
    }
}

pub fn decode_plan(plan: Option<service::Plan>) -> Result<JobPlan, Status> {
    let plan = plan.ok_or_else(|| Status::invalid_argument("missing plan"))?;
    let dialect = match service::Dialect::from_i32(plan.dialect) {
        Some(service::Dialect::QuotedComma) => Dialect::QuotedComma,
        Some(service::Dialect::Pipe) => Dialect::Pipe,
        None => return Err(invalid("dialect", plan.dialect)),
    };
    let sentiment_mode = match service::SentimentMode::from_i32(plan.sentiment_mode) {
        Some(service::SentimentMode::Distributed) => SentimentMode::Distributed,
        Some(service::SentimentMode::CoordinatorOnly) => SentimentMode::CoordinatorOnly,
        None => return Err(invalid("sentiment mode", plan.sentiment_mode)),
    };
    let limits = plan.limits.unwrap_or_default();
    Ok(JobPlan {
        dialect,
        chunk_size: plan.chunk_size,
        words: decode_policy(plan.words)?,
        artists: decode_policy(plan.artists)?,
        sentiment: decode_policy(plan.sentiment)?,
        sentiment_mode,
        sentiment_sample: plan.sentiment_sample,
        limits: FieldLimits {
            artist: limit(limits.artist),
            title: limit(limits.title),
            lyrics: limit(limits.lyrics),
        },
    })
}

pub fn encode_stats(stats: ShardStats) -> service::ShardStats {
    service::ShardStats {
        chunks: stats.chunks,
        records: stats.records,
        malformed: stats.malformed,
        truncated: stats.truncated,
    }
}

pub fn decode_stats(stats: Option<service::ShardStats>) -> ShardStats {
    let stats = stats.unwrap_or_default();
    ShardStats {
        chunks: stats.chunks,
        records: stats.records,
        malformed: stats.malformed,
        truncated: stats.truncated,
    }
}

/// Moves the partial into its wire form; the table is consumed, not copied.
pub fn encode_partial(partial: Partial) -> Payload {
    match partial {
        Partial::Table(table) => Payload::Table(service::Table {
            entries: table
                .into_entries()
                .into_iter()
                .map(|e| service::Entry {
                    key: e.key,
                    count: e.count,
                })
                .collect(),
        }),
        Partial::Tally(tally) => Payload::Tally(service::Tally {
            positive: tally.positive,
            neutral: tally.neutral,
            negative: tally.negative,
            failed: tally.failed,
        }),
    }
}

pub fn decode_partial(payload: Option<Payload>) -> Result<Partial, Status> {
    match payload {
        Some(Payload::Table(table)) => Ok(Partial::Table(
            table
                .entries
                .into_iter()
                .map(|e| (e.key, e.count))
                .collect::<FrequencyTable>(),
        )),
        Some(Payload::Tally(tally)) => Ok(Partial::Tally(SentimentTally {
            positive: tally.positive,
            neutral: tally.neutral,
            negative: tally.negative,
            failed: tally.failed,
        })),
        None => Err(Status::invalid_argument("missing partial payload")),
    }
}
