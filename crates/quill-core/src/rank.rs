//! Lexicographically sortable rank keys ("lexorank").
//!
//! A [`RankKey`] is a string over the base-36 alphabet `0-9a-z`, read as the
//! fractional digits of a number in `(0, 1)`. Plain byte-wise string
//! comparison (Rust `Ord`, SQLite `BINARY` collation) then agrees with numeric
//! order, provided no key ends in the padding digit `'0'`: `"a"` and `"a0"`
//! would denote the same number with nothing between them.
//!
//! [`Ranker::between`] derives a key strictly between two neighbors by
//! taking the digit-wise midpoint, appending digits when the neighbors are
//! adjacent at the current length. Sibling keys are never rewritten, except
//! by [`Ranker::rebalance`] once keys reach the configured maximum length.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::RankError;

/// Ordered symbol alphabet. Index = digit value.
pub const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Key length at which [`Ranker::between`] reports exhaustion by default.
pub const DEFAULT_MAX_KEY_LENGTH: usize = 24;

const BASE: u8 = 36;

/// Key handed out when a bucket is empty (the middle of the alphabet).
const INITIAL_KEY: &str = "i";

fn digit_value(symbol: u8) -> Option<u8> {
    match symbol {
        b'0'..=b'9' => Some(symbol - b'0'),
        b'a'..=b'z' => Some(symbol - b'a' + 10),
        _ => None,
    }
}

/// A position in a dense total order over strings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RankKey(String);

impl RankKey {
    /// Validate and wrap a stored key.
    pub fn parse(raw: impl Into<String>) -> Result<Self, RankError> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.bytes().all(|b| digit_value(b).is_some())
            && !raw.ends_with('0');
        if valid {
            Ok(Self(raw))
        } else {
            Err(RankError::InvalidKey(raw))
        }
    }

    /// The key used for the first task of an empty bucket.
    #[must_use]
    pub fn initial() -> Self {
        Self(INITIAL_KEY.to_string())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of digits in the key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; keys are non-empty by construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn digits(&self) -> Vec<u8> {
        self.0.bytes().filter_map(digit_value).collect()
    }

    fn from_digits(digits: &[u8]) -> Self {
        Self(
            digits
                .iter()
                .map(|&d| char::from(DIGITS[usize::from(d)]))
                .collect(),
        )
    }
}

impl fmt::Display for RankKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RankKey {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RankKey {
    type Error = RankError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RankKey> for String {
    fn from(key: RankKey) -> Self {
        key.0
    }
}

/// Digit-wise midpoint of `low` (missing digits read as `0`) and `high`
/// (absent means the exclusive upper end of the key space).
///
/// Requires `low < high` with neither ending in the pad digit; the result is
/// strictly between them and never ends in `0`.
fn midpoint(low: &[u8], high: Option<&[u8]>) -> Vec<u8> {
    if let Some(high) = high {
        let mut shared = 0;
        while shared < high.len() && low.get(shared).copied().unwrap_or(0) == high[shared] {
            shared += 1;
        }
        if shared > 0 {
            let mut out = high[..shared].to_vec();
            out.extend(midpoint(
                low.get(shared..).unwrap_or_default(),
                Some(&high[shared..]),
            ));
            return out;
        }
    }

    let lo = low.first().copied().unwrap_or(0);
    let hi = high.and_then(|h| h.first().copied()).unwrap_or(BASE);
    if hi - lo > 1 {
        return vec![(lo + hi) / 2];
    }

    match high {
        // `high` truncated to its first digit still sorts above `low`.
        Some(high) if high.len() > 1 => vec![high[0]],
        _ => {
            let mut out = vec![lo];
            out.extend(midpoint(low.get(1..).unwrap_or_default(), None));
            out
        }
    }
}

/// Allocates rank keys under a maximum key length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ranker {
    max_len: usize,
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEY_LENGTH)
    }
}

impl Ranker {
    /// Create a ranker that refuses keys longer than `max_len` digits.
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Configured maximum key length.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Derive a key strictly after `low` and strictly before `high`.
    ///
    /// Either bound may be absent: `(None, None)` yields the initial key,
    /// `(None, Some(k))` a key before `k`, `(Some(k), None)` a key after `k`.
    pub fn between(
        &self,
        low: Option<&RankKey>,
        high: Option<&RankKey>,
    ) -> Result<RankKey, RankError> {
        if let (Some(low), Some(high)) = (low, high) {
            if low >= high {
                return Err(RankError::OutOfOrder {
                    low: low.to_string(),
                    high: high.to_string(),
                });
            }
        }
        if low.is_none() && high.is_none() {
            return Ok(RankKey::initial());
        }

        let low_digits = low.map(RankKey::digits).unwrap_or_default();
        let high_digits = high.map(RankKey::digits);
        let key = RankKey::from_digits(&midpoint(&low_digits, high_digits.as_deref()));

        if key.len() > self.max_len {
            return Err(RankError::PrecisionExhausted {
                len: key.len(),
                max: self.max_len,
            });
        }
        Ok(key)
    }

    /// Allocate `count` strictly increasing keys between `low` and `high`.
    ///
    /// Each key is derived from the previous one with `high` as the upper
    /// bound, so the run stays clear of `high`.
    pub fn run(
        &self,
        low: Option<&RankKey>,
        high: Option<&RankKey>,
        count: usize,
    ) -> Result<Vec<RankKey>, RankError> {
        let mut keys: Vec<RankKey> = Vec::with_capacity(count);
        for _ in 0..count {
            let key = self.between(keys.last().or(low), high)?;
            keys.push(key);
        }
        Ok(keys)
    }

    /// Produce evenly spaced replacement keys for a whole sibling run.
    ///
    /// The result has the same length as `siblings` and is strictly
    /// increasing. Width is the smallest `w` with `36^w >= 36 * (n + 1)`, so
    /// every gap (including both ends) holds at least one full digit of room.
    pub fn rebalance(&self, siblings: &[RankKey]) -> Result<Vec<RankKey>, RankError> {
        self.spread(siblings.len())
    }

    /// `count` evenly spaced keys; the allocation behind [`rebalance`](Self::rebalance).
    pub fn spread(&self, count: usize) -> Result<Vec<RankKey>, RankError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let slots = count as u128 + 1;
        let mut width = 1;
        let mut span = u128::from(BASE);
        while span < u128::from(BASE) * slots {
            width += 1;
            span *= u128::from(BASE);
        }
        if width > self.max_len {
            return Err(RankError::PrecisionExhausted {
                len: width,
                max: self.max_len,
            });
        }

        let step = span / slots;
        let keys = (1..=count)
            .map(|i| {
                let mut value = step * i as u128;
                let mut digits = vec![0_u8; width];
                for slot in digits.iter_mut().rev() {
                    *slot = u8::try_from(value % u128::from(BASE)).unwrap_or(0);
                    value /= u128::from(BASE);
                }
                while digits.last() == Some(&0) {
                    let _ = digits.pop();
                }
                RankKey::from_digits(&digits)
            })
            .collect();
        Ok(keys)
    }
}
