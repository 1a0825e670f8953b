pub use eyre::Result;

pub mod analysis;
pub mod distribution;
pub mod job;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod report;
pub mod sentiment;
pub mod table;

pub use analysis::{tokenize, Analysis, ArtistFrequency, SentimentAnalysis, WordFrequency};
pub use distribution::{ChunkDescriptor, Plan, Policy, WorkDistributor};
pub use job::{JobPlan, Outcome, Partial, PartialResult, Phase, SentimentMode, ShardStats};
pub use reader::{Chunk, ChunkReader};
pub use record::{Dialect, FieldLimits, ParseError, Record};
pub use report::{Report, DEFAULT_TOP_N};
pub use sentiment::{
    Backend, ClassifyError, Classifier, GenerateRequest, LexiconClassifier, ModelClassifier,
    Sentiment, SentimentTally,
};
pub use table::{merge_all, FrequencyEntry, FrequencyTable, Merge};
