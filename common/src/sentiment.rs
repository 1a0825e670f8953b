use crate::{table::Merge, Result};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '0' => Some(Sentiment::Positive),
            '1' => Some(Sentiment::Neutral),
            '2' => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Negative => write!(f, "negative"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("sentiment backend failed: {0}")]
    Backend(String),
    #[error("sentiment backend answered {0:?}, expected one of 0, 1, 2")]
    Malformed(String),
}

/// Scores one lyric body. A failure excludes the record from the tally.
pub trait Classifier: fmt::Debug + Send + Sync {
    fn classify(&self, text: &str) -> Result<Sentiment, ClassifyError>;

    /// Most records one run may send to this strategy. A capped strategy only
    /// runs serially on rank 0.
    fn sample_cap(&self) -> Option<u64> {
        None
    }
}

/// Per-bucket counts. `failed` is diagnostic only and never part of the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SentimentTally {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
    pub failed: u64,
}

impl SentimentTally {
    pub fn record(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Negative => self.negative += 1,
        }
    }

    pub fn count(&self, sentiment: Sentiment) -> u64 {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Neutral => self.neutral,
            Sentiment::Negative => self.negative,
        }
    }

    pub fn total_classified(&self) -> u64 {
        self.positive + self.neutral + self.negative
    }

    /// Share of the classified records, 0 when nothing was classified.
    pub fn percentage(&self, sentiment: Sentiment) -> f64 {
        match self.total_classified() {
            0 => 0.0,
            total => self.count(sentiment) as f64 / total as f64 * 100.0,
        }
    }
}

impl Merge for SentimentTally {
    fn merge(self, other: Self) -> Self {
        Self {
            positive: self.positive + other.positive,
            neutral: self.neutral + other.neutral,
            negative: self.negative + other.negative,
            failed: self.failed + other.failed,
        }
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "love", "happy", "joy", "beautiful", "wonderful", "amazing", "great", "good", "best",
    "smile", "laugh", "dream", "hope", "peace", "free", "bright", "sunshine", "celebrate",
    "victory", "success", "win", "perfect", "fantastic", "excellent", "brilliant", "magical",
];

const NEGATIVE_WORDS: &[&str] = &[
    "hate", "sad", "pain", "hurt", "cry", "death", "die", "kill", "bad", "worst", "angry",
    "fear", "scared", "lonely", "broken", "dark", "nightmare", "terrible", "awful", "horrible",
    "disaster", "failure", "lose", "defeat", "suffer", "agony", "despair",
];

/// Offline keyword scoring: substring hits of fixed positive and negative lists.
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new(POSITIVE_WORDS.iter().copied(), NEGATIVE_WORDS.iter().copied())
    }
}

impl LexiconClassifier {
    pub fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        Self {
            positive: lowercase_words(positive),
            negative: lowercase_words(negative),
        }
    }

    pub fn score(&self, text: &str) -> (u64, u64) {
        let text = text.to_lowercase();
        let hits = |words: &[String]| -> u64 { words.iter().map(|w| occurrences(&text, w)).sum() };
        (hits(&self.positive), hits(&self.negative))
    }
}

impl Classifier for LexiconClassifier {
    fn classify(&self, text: &str) -> Result<Sentiment, ClassifyError> {
        let (positive, negative) = self.score(text);
        Ok(if positive > negative {
            Sentiment::Positive
        } else if negative > positive {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        })
    }
}

fn lowercase_words<I>(words: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| w.as_ref().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Overlapping substring occurrences of a non-empty `needle`.
fn occurrences(haystack: &str, needle: &str) -> u64 {
    let step = match needle.chars().next() {
        Some(c) => c.len_utf8(),
        None => return 0,
    };
    let mut count = 0;
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        count += 1;
        from += pos + step;
    }
    count
}

pub const DEFAULT_MODEL: &str = "wizard-vicuna-uncensored:7b";
pub const DEFAULT_SAMPLE_CAP: u64 = 100;

pub const INSTRUCTION: &str = "You are a sentiment classifier for song lyrics. \
Analyze the provided lyrics and classify the sentiment as: \
0: \"Positive\", 1: \"Neutral\" or 2: \"Negative\". \
Answer ONLY with one of these three numbers, a single character with no other words.\n\n\
Lyrics to classify:\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

/// Transport to an external text-generation service. Timeouts and network
/// errors surface as `Err`; the classifier never retries.
pub trait Backend: fmt::Debug + Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

#[derive(Debug)]
pub struct ModelClassifier<B> {
    backend: B,
    model: String,
    sample_cap: u64,
}

impl<B: Backend> ModelClassifier<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            model: DEFAULT_MODEL.to_owned(),
            sample_cap: DEFAULT_SAMPLE_CAP,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_sample_cap(mut self, cap: u64) -> Self {
        self.sample_cap = cap;
        self
    }

    pub fn request(&self, lyrics: &str) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: format!("{}{}", INSTRUCTION, lyrics),
            stream: false,
        }
    }
}

impl<B: Backend> Classifier for ModelClassifier<B> {
    fn classify(&self, text: &str) -> Result<Sentiment, ClassifyError> {
        let response = self
            .backend
            .generate(&self.request(text))
            .map_err(|e| ClassifyError::Backend(format!("{:#}", e)))?;
        parse_response(&response)
    }

    fn sample_cap(&self) -> Option<u64> {
        Some(self.sample_cap)
    }
}

/// Exactly one of `0`/`1`/`2`, surrounding whitespace ignored.
pub fn parse_response(response: &str) -> Result<Sentiment, ClassifyError> {
    let mut chars = response.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(code), None) => {
            Sentiment::from_code(code).ok_or_else(|| ClassifyError::Malformed(response.to_owned()))
        }
        _ => Err(ClassifyError::Malformed(response.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge_all;
    use eyre::eyre;

    #[test]
    fn ties_are_neutral() {
        let lexicon = LexiconClassifier::default();
        assert_eq!(lexicon.classify("love hate").unwrap(), Sentiment::Neutral);
        assert_eq!(lexicon.classify("").unwrap(), Sentiment::Neutral);
        assert_eq!(lexicon.classify("the clock strikes twelve").unwrap(), Sentiment::Neutral);
    }

    #[test]
    fn majority_wins_case_insensitively() {
        let lexicon = LexiconClassifier::default();
        assert_eq!(lexicon.classify("LOVE love, Happy days").unwrap(), Sentiment::Positive);
        assert_eq!(lexicon.classify("Pain and sorrow, so lonely").unwrap(), Sentiment::Negative);
    }

    #[test]
    fn counts_overlapping_substrings() {
        assert_eq!(occurrences("aaaa", "aa"), 3);
        assert_eq!(occurrences("lovelove", "love"), 2);
        assert_eq!(occurrences("ééé", "éé"), 2);
        assert_eq!(occurrences("anything", ""), 0);

        let lexicon = LexiconClassifier::new(["aa"], ["b"]);
        assert_eq!(lexicon.score("aaa bb"), (2, 2));
    }

    #[test]
    fn parses_model_answers() {
        assert_eq!(parse_response("0").unwrap(), Sentiment::Positive);
        assert_eq!(parse_response("1\n").unwrap(), Sentiment::Neutral);
        assert_eq!(parse_response(" 2 ").unwrap(), Sentiment::Negative);
        for bad in ["", "3", "02", "Positive", "0."] {
            assert!(matches!(parse_response(bad), Err(ClassifyError::Malformed(_))), "{:?}", bad);
        }
    }

    #[derive(Debug)]
    struct Scripted;

    impl Backend for Scripted {
        fn generate(&self, request: &GenerateRequest) -> Result<String> {
            assert!(!request.stream);
            assert!(request.prompt.starts_with(INSTRUCTION));
            let lyrics = &request.prompt[INSTRUCTION.len()..];
            if lyrics.contains("timeout") {
                Err(eyre!("request timed out"))
            } else if lyrics.contains("ramble") {
                Ok("I think it is positive".to_owned())
            } else if lyrics.contains("sad") {
                Ok("2".to_owned())
            } else {
                Ok("0".to_owned())
            }
        }
    }

    #[test]
    fn model_failures_are_excluded() {
        let model = ModelClassifier::new(Scripted).with_model("tiny");
        assert_eq!(model.request("x").model, "tiny");
        assert_eq!(model.sample_cap(), Some(DEFAULT_SAMPLE_CAP));
        assert_eq!(LexiconClassifier::default().sample_cap(), None);

        let lyrics = [
            "sunny", "sad", "sunny", "timeout", "sad", "sunny", "ramble", "sunny", "sunny", "sad",
        ];
        let mut tally = SentimentTally::default();
        for text in lyrics.iter() {
            match model.classify(text) {
                Ok(sentiment) => tally.record(sentiment),
                Err(_) => tally.failed += 1,
            }
        }
        assert_eq!(tally.total_classified(), 8);
        assert_eq!(tally.failed, 2);
        assert_eq!(tally.positive, 5);
        assert_eq!(tally.negative, 3);
        assert!((tally.percentage(Sentiment::Positive) - 62.5).abs() < 1e-9);
        assert!((tally.percentage(Sentiment::Negative) - 37.5).abs() < 1e-9);
    }

    #[test]
    fn empty_tally_has_zero_percentages() {
        let tally = SentimentTally::default();
        for sentiment in Sentiment::ALL.iter() {
            assert_eq!(tally.percentage(*sentiment), 0.0);
        }
    }

    #[test]
    fn tallies_sum_per_bucket() {
        let a = SentimentTally { positive: 1, neutral: 2, negative: 3, failed: 0 };
        let b = SentimentTally { positive: 4, neutral: 0, negative: 1, failed: 2 };
        let merged: SentimentTally = merge_all(vec![a, b]);
        assert_eq!(merged, SentimentTally { positive: 5, neutral: 2, negative: 4, failed: 2 });
        assert_eq!(merged.total_classified(), 11);
    }
}
