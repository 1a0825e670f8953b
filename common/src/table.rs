use itertools::Itertools;
use std::{collections::HashMap, iter::FromIterator};

/// Partial results that fold into a global one. `merge` must be commutative
/// and associative so any gather order gives the same answer.
pub trait Merge: Sized {
    fn merge(self, other: Self) -> Self;
}

pub fn merge_all<T, I>(partials: I) -> T
where
    T: Merge + Default,
    I: IntoIterator<Item = T>,
{
    partials.into_iter().fold(T::default(), Merge::merge)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyEntry {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: HashMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    pub fn add(&mut self, key: &str, count: u64) {
        match self.counts.get_mut(key) {
            Some(current) => *current += count,
            None => {
                self.counts.insert(key.to_owned(), count);
            }
        }
    }

    pub fn add_owned(&mut self, key: String, count: u64) {
        *self.counts.entry(key).or_insert(0) += count;
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(k, &c)| (k.as_str(), c))
    }

    /// Unordered.
    pub fn into_entries(self) -> Vec<FrequencyEntry> {
        self.counts
            .into_iter()
            .map(|(key, count)| FrequencyEntry { key, count })
            .collect()
    }

    /// The `n` most frequent entries, count descending, ties by key ascending.
    pub fn top(&self, n: usize) -> Vec<FrequencyEntry> {
        self.iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
            .take(n)
            .map(|(key, count)| FrequencyEntry {
                key: key.to_owned(),
                count,
            })
            .collect()
    }
}

impl Merge for FrequencyTable {
    fn merge(self, other: Self) -> Self {
        let (mut acc, other) = if self.len() >= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        for (key, count) in other.counts {
            acc.add_owned(key, count);
        }
        acc
    }
}

impl FromIterator<(String, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for (key, count) in iter {
            table.add_owned(key, count);
        }
        table
    }
}

impl<'a> FromIterator<(&'a str, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, u64)>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for (key, count) in iter {
            table.add(key, count);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{seq::SliceRandom, thread_rng};

    fn table(pairs: &[(&str, u64)]) -> FrequencyTable {
        pairs.iter().copied().collect()
    }

    #[test]
    fn increments_and_adds() {
        let mut t = FrequencyTable::new();
        t.increment("love");
        t.increment("love");
        t.add("sad", 3);
        assert_eq!(t.get("love"), 2);
        assert_eq!(t.get("sad"), 3);
        assert_eq!(t.get("happy"), 0);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn merge_is_order_independent() {
        let a = table(&[("love", 2), ("sad", 1)]);
        let b = table(&[("love", 1), ("happy", 4)]);
        let c = table(&[("sad", 5), ("night", 1), ("love", 7)]);

        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.clone().merge(b.clone().merge(c.clone()));
        assert_eq!(left, right);
        assert_eq!(left, table(&[("love", 10), ("sad", 6), ("happy", 4), ("night", 1)]));

        let mut partials = vec![a, b, c, FrequencyTable::new()];
        for _ in 0..20 {
            partials.shuffle(&mut thread_rng());
            assert_eq!(merge_all(partials.clone()), left);
        }
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let merged: FrequencyTable = merge_all(Vec::new());
        assert!(merged.is_empty());
    }

    #[test]
    fn top_breaks_ties_by_key() {
        let t = table(&[("b", 3), ("a", 3), ("c", 5), ("d", 1)]);
        let top = t.top(3);
        let keys = top.iter().map(|e| e.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, ["c", "a", "b"]);
        assert_eq!(top[0].count, 5);
        assert_eq!(t.top(10).len(), 4);
        assert!(t.top(0).is_empty());
    }
}
