use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

use crate::base62;

/// Build the date-partitioned object key for `now`.
///
/// Format: `{year}/{month}/{day}/{base62(unix_millis)}`, month and day are
/// 1-based and not zero-padded. The calendar date is taken in UTC.
pub fn make_key(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    format!(
        "{}/{}/{}/{}",
        now.year(),
        now.month(),
        now.day(),
        base62::encode(millis)
    )
}

/// Object key generator with a random collision-resistant suffix.
///
/// Two uploads in the same millisecond (same process or different replicas)
/// would otherwise get the same key.
#[derive(Debug, Clone, Copy)]
pub struct KeyGenerator {
    suffix_len: usize,
}

impl KeyGenerator {
    pub fn new(suffix_len: usize) -> Self {
        Self { suffix_len }
    }

    /// Generate a key for `now` using the thread-local RNG.
    pub fn generate(&self, now: DateTime<Utc>) -> String {
        self.generate_with(now, &mut rand::rng())
    }

    /// Generate a key for `now` drawing the suffix from `rng`.
    ///
    /// With a suffix length of zero this is exactly [`make_key`].
    pub fn generate_with<R: Rng>(&self, now: DateTime<Utc>, rng: &mut R) -> String {
        let mut key = make_key(now);
        if self.suffix_len > 0 {
            key.push('-');
            key.extend((0..self.suffix_len).map(|_| {
                char::from(base62::ALPHABET[rng.random_range(0..base62::ALPHABET.len())])
            }));
        }
        key
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(6)
    }
}
