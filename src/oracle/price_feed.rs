//! Price feed interface.
//!
//! Feeds are external, read-only dependencies. The engine never owns or
//! updates them; it only reads the latest reading and decides whether that
//! reading is usable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// FEED READING
// ═══════════════════════════════════════════════════════════════════════════════

/// A single raw reading from a price feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedReading {
    /// Round identifier (monotonic per feed)
    pub round_id: u64,
    /// Raw answer, USD per whole token at `decimals` precision
    pub answer: i128,
    /// Decimal places of `answer`
    pub decimals: u8,
    /// Unix timestamp of the last update
    pub updated_at: u64,
}

impl FeedReading {
    /// Age of the reading in seconds (zero if the feed is ahead of `now`)
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.updated_at)
    }

    /// Check if the reading is no older than `max_age`
    pub fn is_fresh(&self, now: u64, max_age: u64) -> bool {
        self.age(now) <= max_age
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// External source of a token's USD price
pub trait PriceFeed: Send + Sync + fmt::Debug {
    /// Latest reading reported by the feed
    fn latest_reading(&self) -> Result<FeedReading>;

    /// Human-readable description (e.g. "ETH / USD")
    fn description(&self) -> String {
        String::from("price feed")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MOCK AGGREGATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Settable in-memory feed for local deployments, scenarios and tests
#[derive(Debug)]
pub struct MockAggregator {
    description: String,
    reading: RwLock<FeedReading>,
}

impl MockAggregator {
    /// Create a feed with an initial answer
    pub fn new(description: impl Into<String>, decimals: u8, answer: i128, updated_at: u64) -> Self {
        Self {
            description: description.into(),
            reading: RwLock::new(FeedReading {
                round_id: 1,
                answer,
                decimals,
                updated_at,
            }),
        }
    }

    /// Publish a new answer, starting a new round
    pub fn update_answer(&self, answer: i128, updated_at: u64) -> Result<()> {
        let mut reading = self.reading.write().map_err(|_| Error::Lock)?;
        reading.round_id += 1;
        reading.answer = answer;
        reading.updated_at = updated_at;
        Ok(())
    }

    /// Refresh the timestamp without changing the answer
    pub fn touch(&self, updated_at: u64) -> Result<()> {
        let answer = self.latest_reading()?.answer;
        self.update_answer(answer, updated_at)
    }
}

impl PriceFeed for MockAggregator {
    fn latest_reading(&self) -> Result<FeedReading> {
        self.reading.read().map(|r| *r).map_err(|_| Error::Lock)
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_freshness() {
        let reading = FeedReading {
            round_id: 1,
            answer: 2_000_00000000,
            decimals: 8,
            updated_at: 1_000,
        };

        assert!(reading.is_fresh(1_010, 3_600));
        assert!(reading.is_fresh(4_600, 3_600));
        assert!(!reading.is_fresh(4_601, 3_600));
        // Feed timestamp ahead of local clock counts as fresh
        assert_eq!(reading.age(500), 0);
    }

    #[test]
    fn test_mock_aggregator_update() {
        let feed = MockAggregator::new("ETH / USD", 8, 2_000_00000000, 100);
        feed.update_answer(800_00000000, 200).unwrap();

        let reading = feed.latest_reading().unwrap();
        assert_eq!(reading.answer, 800_00000000);
        assert_eq!(reading.updated_at, 200);
        assert_eq!(reading.round_id, 2);
        assert_eq!(feed.description(), "ETH / USD");
    }

    #[test]
    fn test_mock_aggregator_touch_keeps_answer() {
        let feed = MockAggregator::new("ETH / USD", 8, 2_000_00000000, 100);
        feed.touch(900).unwrap();

        let reading = feed.latest_reading().unwrap();
        assert_eq!(reading.answer, 2_000_00000000);
        assert_eq!(reading.updated_at, 900);
    }
}
