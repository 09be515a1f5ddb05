//! Fractional ranks for ordering sibling cards.
//!
//! A rank is an opaque string that sorts lexicographically. New ranks can be
//! generated after or between existing ones without renumbering neighbours,
//! so inserting a card never touches the metadata of its siblings.
//!
//! Ranks have the shape `<bucket>|<value>`, where `value` is written in the
//! base-36 alphabet `0-9a-z`:
//!
//! ```rust
//! use cardsmith_rank::Rank;
//!
//! let first = Rank::first();
//! let second = Rank::after(&first);
//! let middle = Rank::between(&first, &second).unwrap();
//!
//! assert!(first < middle && middle < second);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Alphabet used for rank values, in sort order.
const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of symbols in the rank alphabet.
const BASE: u8 = 36;

/// Separator between the bucket and the value.
const BUCKET_SEPARATOR: char = '|';

/// Sortable position of an item among its siblings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(String);

impl Rank {
    /// Sentinel for items that have not been ranked yet. Sorts before everything.
    pub const EMPTY: Rank = Rank(String::new());

    /// Rank given to the first item inserted into an empty ordered set.
    pub fn first() -> Self {
        Self("0|a".to_string())
    }

    /// Rank that sorts strictly after `last`.
    ///
    /// The last value digit that can still grow is incremented and everything
    /// after it dropped. When every digit is already `z` a new digit is
    /// appended, so there is always room for another `after`.
    pub fn after(last: &Rank) -> Self {
        if last.is_empty() {
            return Self::first();
        }

        let (bucket, value) = split(&last.0);
        let Some(mut digits) = decode(value) else {
            // Not produced by us; any extension sorts after its prefix.
            return Self(format!("{}1", last.0));
        };

        match digits.iter().rposition(|&d| d < BASE - 1) {
            Some(i) => {
                digits.truncate(i + 1);
                digits[i] += 1;
            }
            None => digits.push(1),
        }

        Self(join(bucket, &encode(&digits)))
    }

    /// Rank that sorts strictly between `before` and `after`.
    ///
    /// `before` may be [`Rank::EMPTY`] to insert at the front. Returns `None`
    /// when `before >= after`, when the ranks live in different buckets, or
    /// when no string fits between them (e.g. `a` and `a0`).
    pub fn between(before: &Rank, after: &Rank) -> Option<Self> {
        if before >= after {
            return None;
        }

        let (after_bucket, after_value) = split(&after.0);
        let lower = if before.is_empty() {
            Vec::new()
        } else {
            let (before_bucket, before_value) = split(&before.0);
            if before_bucket != after_bucket {
                return None;
            }
            decode(before_value)?
        };
        let upper = decode(after_value)?;

        let mut result = Vec::with_capacity(upper.len() + 1);
        let mut bounded = true;
        let mut i = 0;
        loop {
            let lo = lower.get(i).copied().unwrap_or(0);
            let hi = if bounded {
                *upper.get(i)?
            } else {
                BASE
            };

            if lo == hi {
                result.push(lo);
                i += 1;
                continue;
            }

            let mid = (lo + hi) / 2;
            if mid > lo {
                result.push(mid);
                break;
            }

            // Adjacent digits: keep the lower one and search the open range after it.
            result.push(lo);
            bounded = false;
            i += 1;
        }

        Some(Self(join(after_bucket, &encode(&result))))
    }

    /// True for the unranked sentinel.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Rank {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Rank {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Anything that carries a rank.
pub trait Ranked {
    fn rank(&self) -> &Rank;
}

impl Ranked for Rank {
    fn rank(&self) -> &Rank {
        self
    }
}

/// Sort items by rank. Plain lexicographic, stable for equal ranks.
pub fn sort_by_rank<T: Ranked>(items: &mut [T]) {
    items.sort_by(|a, b| a.rank().cmp(b.rank()));
}

/// Greatest non-empty rank among `items`.
pub fn last_rank<'a, T, I>(items: I) -> Option<&'a Rank>
where
    T: Ranked + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .map(Ranked::rank)
        .filter(|rank| !rank.is_empty())
        .max()
}

fn split(rank: &str) -> (Option<&str>, &str) {
    match rank.split_once(BUCKET_SEPARATOR) {
        Some((bucket, value)) => (Some(bucket), value),
        None => (None, rank),
    }
}

fn join(bucket: Option<&str>, value: &str) -> String {
    match bucket {
        Some(bucket) => format!("{bucket}{BUCKET_SEPARATOR}{value}"),
        None => value.to_string(),
    }
}

fn decode(value: &str) -> Option<Vec<u8>> {
    value
        .bytes()
        .map(|c| match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'z' => Some(c - b'a' + 10),
            _ => None,
        })
        .collect()
}

fn encode(digits: &[u8]) -> String {
    digits.iter().map(|&d| DIGITS[d as usize] as char).collect()
}
