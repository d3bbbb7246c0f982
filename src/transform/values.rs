//! Normalization of free-form result strings into numbers.
//!
//! Lab results arrive as text: plain numbers, ranges such as `100-200`,
//! bounded values such as `<5`, the word `negatief`, or the placeholder
//! `-volgt-` for a result that has not been reported yet.

use std::sync::LazyLock;

use regex::Regex;

use crate::encoding::Mode;

/// Value emitted for a pending result in transform-only mode
pub const PENDING_VALUE: f64 = -1.0;

static RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)$").expect("valid range pattern"));

/// Converts raw result strings into numeric values or `None`
#[derive(Debug, Clone)]
pub struct ValueNormalizer {
    /// Whether the pending placeholder maps to [`PENDING_VALUE`]
    pending_sentinel: bool,
    /// Words meaning a negative (absent) finding, compared case-insensitively
    negative_words: Vec<String>,
    /// Placeholder for a result that is not available yet
    pending_word: String,
}

impl Default for ValueNormalizer {
    fn default() -> Self {
        Self::for_mode(Mode::Fit)
    }
}

impl ValueNormalizer {
    /// Normalizer for the given pipeline mode
    ///
    /// Only transform-only runs keep the pending placeholder as a value;
    /// fit runs treat it as unparseable.
    #[must_use]
    pub fn for_mode(mode: Mode) -> Self {
        Self {
            pending_sentinel: mode == Mode::TransformOnly,
            negative_words: vec!["negatief".to_string(), "negative".to_string()],
            pending_word: "-volgt-".to_string(),
        }
    }

    /// Whether a raw result is the pending placeholder kept as [`PENDING_VALUE`]
    #[must_use]
    pub fn is_pending(&self, raw: &str) -> bool {
        self.pending_sentinel && raw.trim().eq_ignore_ascii_case(&self.pending_word)
    }

    /// Normalize one raw result
    ///
    /// Range detection runs first: stripping or parsing would otherwise
    /// mangle a range before it is recognised.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> Option<f64> {
        let trimmed = raw.trim();

        if let Some(mean) = range_mean(trimmed) {
            return Some(mean);
        }

        // The bound itself is used; the inequality is discarded
        let value = trimmed
            .strip_prefix(['<', '>'])
            .map_or(trimmed, str::trim);

        if self
            .negative_words
            .iter()
            .any(|word| value.eq_ignore_ascii_case(word))
        {
            return Some(0.0);
        }

        if value.eq_ignore_ascii_case(&self.pending_word) {
            return self.pending_sentinel.then_some(PENDING_VALUE);
        }

        parse_finite(value)
    }
}

/// Mean of the bounds of an `<int>-<int>` range
#[must_use]
pub fn range_mean(raw: &str) -> Option<f64> {
    let captures = RANGE_PATTERN.captures(raw.trim())?;
    let low: f64 = captures[1].parse().ok()?;
    let high: f64 = captures[2].parse().ok()?;
    Some((low + high) / 2.0)
}

/// Parse a number written with a decimal comma (`37,5`) or a decimal point
#[must_use]
pub fn parse_decimal_comma(raw: &str) -> Option<f64> {
    parse_finite(&raw.trim().replace(',', "."))
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
