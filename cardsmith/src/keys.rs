//! Card key allocation
//!
//! A key is `<prefix>_<suffix>` where the suffix is a random base-36 token.
//! Keys share one namespace across live cards and every template's cards.

use rand::Rng;
use std::collections::HashSet;

use crate::error::{CardsmithError, Result};

/// Length of the random part of a card key
pub const KEY_SUFFIX_LEN: usize = 8;

/// Attempts allowed per requested key
pub const KEY_RETRY_MULTIPLIER: usize = 10;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A fresh random key. Not checked for uniqueness.
pub fn random_key(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..KEY_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!("{prefix}_{suffix}")
}

/// Allocate `count` keys unused in `existing` and distinct from each other.
pub fn allocate_keys(
    prefix: &str,
    existing: &HashSet<String>,
    count: usize,
) -> Result<Vec<String>> {
    allocate_keys_with(existing, count, || random_key(prefix))
}

/// Like [`allocate_keys`], drawing candidates from `next`. Gives up after
/// `count * KEY_RETRY_MULTIPLIER` candidates.
pub fn allocate_keys_with(
    existing: &HashSet<String>,
    count: usize,
    mut next: impl FnMut() -> String,
) -> Result<Vec<String>> {
    let attempts = count * KEY_RETRY_MULTIPLIER;
    let mut fresh: Vec<String> = Vec::with_capacity(count);
    let mut taken: HashSet<String> = HashSet::with_capacity(count);

    for _ in 0..attempts {
        if fresh.len() == count {
            break;
        }
        let candidate = next();
        if existing.contains(&candidate) || !taken.insert(candidate.clone()) {
            continue;
        }
        fresh.push(candidate);
    }

    if fresh.len() < count {
        return Err(CardsmithError::KeyAllocation { count, attempts });
    }
    Ok(fresh)
}
