use crate::{record::ParseError, Result};
use eyre::{ensure, eyre};
use std::{fmt, str::FromStr};

/// A contiguous range of data rows, `[start, start + count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub start: u64,
    pub count: u64,
}

impl ChunkDescriptor {
    pub fn new(start: u64, count: u64) -> Self {
        Self { start, count }
    }

    pub fn end(&self) -> u64 {
        self.start + self.count
    }

    /// Pieces of at most `max` rows covering the same range, in order.
    pub fn split(self, max: u64) -> Split {
        Split {
            next: self.start,
            end: self.end(),
            max: max.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// One contiguous block per worker, the remainder spread over the lowest ranks.
    Static,
    /// Fixed-size chunks dealt out cyclically by rank.
    RoundRobin,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Static => write!(f, "static"),
            Policy::RoundRobin => write!(f, "round-robin"),
        }
    }
}

impl FromStr for Policy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(Policy::Static),
            "round-robin" | "roundrobin" | "rr" => Ok(Policy::RoundRobin),
            _ => Err(ParseError::new("distribution policy", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkDistributor {
    total_records: u64,
    worker_count: u32,
}

impl WorkDistributor {
    pub fn new(total_records: u64, worker_count: u32) -> Result<Self> {
        ensure!(worker_count >= 1, "worker count must be at least 1");
        Ok(Self {
            total_records,
            worker_count,
        })
    }

    fn check_rank(&self, rank: u32) -> Result<()> {
        ensure!(
            rank < self.worker_count,
            "rank {} out of range for {} workers",
            rank,
            self.worker_count
        );
        Ok(())
    }

    pub fn static_share(&self, rank: u32) -> Result<ChunkDescriptor> {
        self.check_rank(rank)?;
        let workers = u64::from(self.worker_count);
        let rank = u64::from(rank);
        let base = self.total_records / workers;
        let remainder = self.total_records % workers;

        let count = if rank < remainder { base + 1 } else { base };
        let start = rank * base + rank.min(remainder);
        Ok(ChunkDescriptor::new(start, count))
    }

    pub fn round_robin(&self, rank: u32, chunk_size: u64) -> Result<RoundRobin> {
        self.check_rank(rank)?;
        ensure!(chunk_size >= 1, "chunk size must be at least 1");
        Ok(RoundRobin {
            next: u64::from(rank).saturating_mul(chunk_size),
            stride: u64::from(self.worker_count).saturating_mul(chunk_size),
            chunk_size,
            total: self.total_records,
        })
    }

    /// Read-sized chunks for `rank`. A static share is read in pieces of at
    /// most `chunk_size` rows, ownership stays one contiguous block.
    pub fn plan(&self, rank: u32, policy: Policy, chunk_size: u64) -> Result<Plan> {
        if chunk_size == 0 {
            return Err(eyre!("chunk size must be at least 1"));
        }
        match policy {
            Policy::Static => Ok(Plan::Static(self.static_share(rank)?.split(chunk_size))),
            Policy::RoundRobin => Ok(Plan::RoundRobin(self.round_robin(rank, chunk_size)?)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Split {
    next: u64,
    end: u64,
    max: u64,
}

impl Iterator for Split {
    type Item = ChunkDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let count = self.max.min(self.end - self.next);
        let chunk = ChunkDescriptor::new(self.next, count);
        self.next += count;
        Some(chunk)
    }
}

#[derive(Debug, Clone)]
pub struct RoundRobin {
    next: u64,
    stride: u64,
    chunk_size: u64,
    total: u64,
}

impl Iterator for RoundRobin {
    type Item = ChunkDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let chunk = ChunkDescriptor::new(self.next, self.chunk_size.min(self.total - self.next));
        self.next = self.next.saturating_add(self.stride);
        Some(chunk)
    }
}

#[derive(Debug, Clone)]
pub enum Plan {
    Static(Split),
    RoundRobin(RoundRobin),
}

impl Iterator for Plan {
    type Item = ChunkDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Plan::Static(split) => split.next(),
            Plan::RoundRobin(rr) => rr.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    /// Every row owned exactly once across all ranks.
    fn assert_partition(total: u64, workers: u32, policy: Policy, chunk_size: u64) {
        let distributor = WorkDistributor::new(total, workers).unwrap();
        let mut owned = vec![0u32; total as usize];
        for rank in 0..workers {
            for chunk in distributor.plan(rank, policy, chunk_size).unwrap() {
                assert!(chunk.count > 0);
                assert!(chunk.end() <= total);
                for row in chunk.start..chunk.end() {
                    owned[row as usize] += 1;
                }
            }
        }
        assert!(
            owned.iter().all(|&n| n == 1),
            "{} rows, {} workers, {} chunk {}: {:?}",
            total,
            workers,
            policy,
            chunk_size,
            owned
        );
    }

    #[test]
    fn both_policies_partition_the_rows() {
        for total in [0, 1, 2, 7, 10, 64, 101] {
            for workers in 1..=9 {
                for chunk_size in [1, 3, 10, 1000] {
                    assert_partition(total, workers, Policy::Static, chunk_size);
                    assert_partition(total, workers, Policy::RoundRobin, chunk_size);
                }
            }
        }
    }

    #[test]
    fn static_split_spreads_the_remainder() {
        let distributor = WorkDistributor::new(10, 4).unwrap();
        let shares = (0..4)
            .map(|rank| distributor.static_share(rank).unwrap())
            .collect_vec();
        assert_eq!(shares.iter().map(|s| s.count).collect_vec(), [3, 3, 2, 2]);
        assert_eq!(shares.iter().map(|s| s.start).collect_vec(), [0, 3, 6, 8]);
        assert_eq!(shares.iter().map(|s| s.count).sum::<u64>(), 10);
    }

    #[test]
    fn round_robin_strides_by_world() {
        let distributor = WorkDistributor::new(10, 2).unwrap();
        let rank1 = distributor.round_robin(1, 3).unwrap().collect_vec();
        assert_eq!(
            rank1,
            [ChunkDescriptor::new(3, 3), ChunkDescriptor::new(9, 1)]
        );
    }

    #[test]
    fn static_share_is_read_in_pieces() {
        let distributor = WorkDistributor::new(10, 1).unwrap();
        let pieces = distributor.plan(0, Policy::Static, 4).unwrap().collect_vec();
        assert_eq!(
            pieces,
            [
                ChunkDescriptor::new(0, 4),
                ChunkDescriptor::new(4, 4),
                ChunkDescriptor::new(8, 2)
            ]
        );
    }

    #[test]
    fn invalid_arguments() {
        assert!(WorkDistributor::new(10, 0).is_err());
        let distributor = WorkDistributor::new(10, 2).unwrap();
        assert!(distributor.static_share(2).is_err());
        assert!(distributor.round_robin(0, 0).is_err());
        assert!(distributor.plan(0, Policy::Static, 0).is_err());
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("round-robin".parse::<Policy>().unwrap(), Policy::RoundRobin);
        assert_eq!("Static".parse::<Policy>().unwrap(), Policy::Static);
        assert!("random".parse::<Policy>().is_err());
    }
}
