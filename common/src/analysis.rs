use crate::{
    record::Record,
    sentiment::{Classifier, SentimentTally},
    table::{FrequencyTable, Merge},
};
use log::warn;
use std::{fmt::Debug, ops::RangeInclusive, sync::Arc};

/// Token lengths kept by the word count, in characters.
pub const TOKEN_LEN: RangeInclusive<usize> = 2..=50;

/// A local aggregation over a stream of records. Partials from any subset of
/// workers merge into the same global value.
pub trait Analysis: Debug + Send + Sync {
    type Partial: Merge + Default + Debug + Send;

    fn accumulate(&self, partial: &mut Self::Partial, record: &Record);

    fn aggregate<'a, I>(&self, records: I) -> Self::Partial
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut partial = Self::Partial::default();
        for record in records {
            self.accumulate(&mut partial, record);
        }
        partial
    }
}

/// Lower-cased alphabetic runs of 2 to 50 characters.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| TOKEN_LEN.contains(&w.chars().count()))
        .map(str::to_lowercase)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WordFrequency;

impl Analysis for WordFrequency {
    type Partial = FrequencyTable;

    fn accumulate(&self, table: &mut FrequencyTable, record: &Record) {
        for word in tokenize(&record.lyrics) {
            table.add_owned(word, 1);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ArtistFrequency;

impl Analysis for ArtistFrequency {
    type Partial = FrequencyTable;

    fn accumulate(&self, table: &mut FrequencyTable, record: &Record) {
        table.increment(record.artist.trim());
    }
}

#[derive(Debug, Clone)]
pub struct SentimentAnalysis {
    classifier: Arc<dyn Classifier>,
}

impl SentimentAnalysis {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }
}

impl Analysis for SentimentAnalysis {
    type Partial = SentimentTally;

    fn accumulate(&self, tally: &mut SentimentTally, record: &Record) {
        match self.classifier.classify(&record.lyrics) {
            Ok(sentiment) => tally.record(sentiment),
            Err(e) => {
                warn!("not classified: {} - {}: {}", record.artist, record.title, e);
                tally.failed += 1;
            }
        }
    }
}
