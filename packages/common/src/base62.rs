use std::fmt;

/// Symbol table: digits, then lowercase, then uppercase.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BASE: u64 = 62;

/// Errors returned by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base62Error {
    /// The input string was empty.
    Empty,
    /// The input contained a symbol outside [`ALPHABET`].
    InvalidSymbol(char),
    /// A multi-symbol input started with `'0'`.
    LeadingZero,
    /// The decoded value does not fit in a `u64`.
    Overflow,
}

impl fmt::Display for Base62Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "base62 input is empty"),
            Self::InvalidSymbol(c) => write!(f, "invalid base62 symbol: {c:?}"),
            Self::LeadingZero => write!(f, "base62 input has a leading zero"),
            Self::Overflow => write!(f, "base62 value overflows u64"),
        }
    }
}

impl std::error::Error for Base62Error {}

/// Encode `n` as the shortest base62 string, most significant symbol first.
///
/// Zero encodes to `"0"`. There is no zero padding.
pub fn encode(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }

    let mut buf = Vec::with_capacity(11);
    while n > 0 {
        buf.push(ALPHABET[(n % BASE) as usize]);
        n /= BASE;
    }
    buf.reverse();

    // Every byte comes from ALPHABET, which is ASCII.
    buf.into_iter().map(char::from).collect()
}

/// Decode a canonical base62 string produced by [`encode`].
pub fn decode(s: &str) -> Result<u64, Base62Error> {
    if s.is_empty() {
        return Err(Base62Error::Empty);
    }
    if s.len() > 1 && s.starts_with('0') {
        return Err(Base62Error::LeadingZero);
    }

    s.chars().try_fold(0u64, |acc, c| {
        let digit = symbol_value(c).ok_or(Base62Error::InvalidSymbol(c))?;
        acc.checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or(Base62Error::Overflow)
    })
}

/// Compare two encoded values symbol by symbol in alphabet order.
///
/// Plain byte order does not work here because ASCII puts `'A'..='Z'` before
/// `'a'..='z'`. For equal-length inputs the result matches numeric order.
pub fn cmp_encoded(a: &str, b: &str) -> std::cmp::Ordering {
    let rank = |c: char| symbol_value(c).unwrap_or(u64::MAX);
    a.chars().map(rank).cmp(b.chars().map(rank))
}

fn symbol_value(c: char) -> Option<u64> {
    let v = match c {
        '0'..='9' => c as u64 - '0' as u64,
        'a'..='z' => c as u64 - 'a' as u64 + 10,
        'A'..='Z' => c as u64 - 'A' as u64 + 36,
        _ => return None,
    };
    Some(v)
}
