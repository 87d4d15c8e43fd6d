//! Human-readable byte sizes ("10KB", "2mb", "1GB", "4096").

use crate::error::ConfigError;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * 1024 * 1024;

static BYTE_SIZE: LazyLock<SuffixMultiplier> = LazyLock::new(|| SuffixMultiplier {
    suffixes: vec![("kb".into(), KB), ("mb".into(), MB), ("gb".into(), GB)],
    default: 1,
});

/// Maps fixed-length unit suffixes to integer multipliers.
///
/// Matching is case-insensitive. When no suffix matches, the whole value is
/// parsed as an integer and scaled by the default multiplier. Results are in
/// the fundamental unit (bytes for [`byte_size`]).
#[derive(Debug, Clone)]
pub struct SuffixMultiplier {
    suffixes: Vec<(String, u64)>,
    default: u64,
}

impl SuffixMultiplier {
    /// Build a parser. Every suffix must have the same length.
    pub fn new<I, S>(suffixes: I, default: u64) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut table: Vec<(String, u64)> = Vec::new();
        let mut key_len: Option<usize> = None;

        for (suffix, multiplier) in suffixes {
            let suffix = suffix.into().to_lowercase();
            let len = suffix.chars().count();
            match key_len {
                None => key_len = Some(len),
                Some(expected) if expected != len => {
                    return Err(ConfigError::SuffixLength {
                        suffix,
                        expected,
                        found: len,
                    });
                }
                Some(_) => {}
            }
            table.push((suffix, multiplier));
        }

        Ok(Self {
            suffixes: table,
            default,
        })
    }

    /// Parse `value` into the fundamental unit.
    pub fn parse(&self, value: &str) -> Result<u64, ConfigError> {
        let lower = value.to_lowercase();

        for (suffix, multiplier) in &self.suffixes {
            if let Some(number) = lower.strip_suffix(suffix.as_str()) {
                return scale(value, number, *multiplier);
            }
        }

        scale(value, &lower, self.default)
    }

    /// The default multiplier applied to bare integers.
    pub fn default_multiplier(&self) -> u64 {
        self.default
    }
}

fn scale(original: &str, number: &str, multiplier: u64) -> Result<u64, ConfigError> {
    let n: u64 = number
        .trim()
        .parse()
        .map_err(|source| ConfigError::InvalidSize {
            value: original.to_string(),
            source,
        })?;
    n.checked_mul(multiplier)
        .ok_or_else(|| ConfigError::Overflow(original.to_string()))
}

/// The standard byte-size parser: `kb`, `mb`, `gb` (powers of 1024), bare
/// integers are bytes.
pub fn byte_size() -> &'static SuffixMultiplier {
    &BYTE_SIZE
}

/// Shorthand for `byte_size().parse(value)`.
pub fn parse_byte_size(value: &str) -> Result<u64, ConfigError> {
    BYTE_SIZE.parse(value)
}

// ── SizeLimit ────────────────────────────────────────────────────────────────

/// Byte threshold for logged bodies. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SizeLimit(u64);

impl SizeLimit {
    pub const UNLIMITED: SizeLimit = SizeLimit(0);

    pub fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> u64 {
        self.0
    }

    pub fn is_unlimited(&self) -> bool {
        self.0 == 0
    }

    /// Cut `data` to the limit. The flag is true when bytes were dropped.
    pub fn apply<'a>(&self, data: &'a [u8]) -> (&'a [u8], bool) {
        if self.is_unlimited() {
            return (data, false);
        }
        match usize::try_from(self.0) {
            Ok(limit) if data.len() > limit => (&data[..limit], true),
            _ => (data, false),
        }
    }
}

impl fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unlimited() {
            write!(f, "unlimited")
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_suffix_before_parsing_number() {
        let parser = SuffixMultiplier::new([("k", 1_000u64), ("m", 1_000_000)], 10).unwrap();
        assert_eq!(parser.parse("250k").unwrap(), 250_000);
        assert_eq!(parser.parse("2M").unwrap(), 2_000_000);
        assert_eq!(parser.parse("3").unwrap(), 30);
        assert_eq!(parser.default_multiplier(), 10);
    }

    #[test]
    fn suffix_keys_are_lowercased() {
        let parser = SuffixMultiplier::new([("KB", 1024u64)], 1).unwrap();
        assert_eq!(parser.parse("2kb").unwrap(), 2048);
    }

    #[test]
    fn empty_table_parses_bare_integers() {
        let parser = SuffixMultiplier::new(Vec::<(String, u64)>::new(), 7).unwrap();
        assert_eq!(parser.parse("6").unwrap(), 42);
        assert!(parser.parse("6kb").is_err());
    }

    #[test]
    fn size_limit_apply_cuts_long_data() {
        let limit = SizeLimit::new(4);
        assert_eq!(limit.apply(b"abcdefgh"), (&b"abcd"[..], true));
        assert_eq!(limit.apply(b"abcd"), (&b"abcd"[..], false));
        assert_eq!(limit.apply(b"ab"), (&b"ab"[..], false));
    }

    #[test]
    fn size_limit_zero_is_unlimited() {
        let limit = SizeLimit::default();
        assert!(limit.is_unlimited());
        assert_eq!(limit, SizeLimit::UNLIMITED);
        let data = vec![b'x'; 10_000];
        assert_eq!(limit.apply(&data), (&data[..], false));
        assert_eq!(limit.to_string(), "unlimited");
        assert_eq!(SizeLimit::new(10).to_string(), "10 bytes");
    }
}
