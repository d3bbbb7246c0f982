//! Normalization of Dutch free text (complaints and radiology reports).
//!
//! Tokens are case-folded, stripped of punctuation and stopwords, stemmed
//! with the Dutch Snowball stemmer and dropped when nothing but digits is
//! left. One all-caps acronym keeps its casing and skips stemming: `HET`
//! (high-energy trauma) would otherwise collapse into the stopword `het`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use rustc_hash::FxHashSet;

/// ASCII punctuation characters
pub const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

/// Dutch stopword list
pub const DUTCH_STOPWORDS: &[&str] = &[
    "de", "en", "van", "ik", "te", "dat", "die", "in", "een", "hij", "het", "niet", "zijn", "is",
    "was", "op", "aan", "met", "als", "voor", "had", "er", "maar", "om", "hem", "dan", "zou", "of",
    "wat", "mijn", "men", "dit", "zo", "door", "over", "ze", "zich", "bij", "ook", "tot", "je",
    "mij", "uit", "der", "daar", "haar", "naar", "heb", "hoe", "heeft", "hebben", "deze", "u",
    "want", "nog", "zal", "me", "zij", "nu", "ge", "geen", "omdat", "iets", "worden", "toch", "al",
    "waren", "veel", "meer", "doen", "toen", "moet", "ben", "zonder", "kan", "hun", "dus", "alles",
    "onder", "ja", "eens", "hier", "wie", "werd", "altijd", "doch", "wordt", "wezen", "kunnen",
    "ons", "zelf", "tegen", "na", "reeds", "wil", "kon", "niets", "uw", "iemand", "geweest",
    "andere",
];

// Words (optionally joined by hyphens, apostrophes or dots) or single symbols
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:[-'.]\w+)*|[^\w\s]").expect("valid token pattern"));

/// Tokenizes, cleans and stems free text
pub struct TextNormalizer {
    stopwords: FxHashSet<String>,
    punctuation: Vec<char>,
    preserved_acronym: String,
    stemmer: Stemmer,
}

impl fmt::Debug for TextNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextNormalizer")
            .field("stopwords", &self.stopwords.len())
            .field("punctuation", &self.punctuation)
            .field("preserved_acronym", &self.preserved_acronym)
            .finish_non_exhaustive()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::dutch("HET")
    }
}

impl TextNormalizer {
    /// Dutch normalizer with the full punctuation set
    #[must_use]
    pub fn dutch(preserved_acronym: &str) -> Self {
        Self {
            stopwords: DUTCH_STOPWORDS.iter().map(|w| (*w).to_string()).collect(),
            punctuation: PUNCTUATION.chars().collect(),
            preserved_acronym: preserved_acronym.to_string(),
            stemmer: Stemmer::create(Algorithm::Dutch),
        }
    }

    /// Keep a punctuation character as part of the text (e.g. `#` for fractures)
    #[must_use]
    pub fn keeping(mut self, symbol: char) -> Self {
        self.punctuation.retain(|c| *c != symbol);
        self
    }

    /// Split text into raw tokens
    #[must_use]
    pub fn tokenize(text: &str) -> Vec<&str> {
        TOKEN_PATTERN.find_iter(text).map(|m| m.as_str()).collect()
    }

    fn is_punctuation_token(&self, token: &str) -> bool {
        let mut chars = token.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if self.punctuation.contains(&c))
    }

    /// Stem until the word no longer changes, so output tokens are their own stems
    fn stem(&self, word: String) -> String {
        let mut current = word;
        for _ in 0..=current.chars().count() {
            let next = self.stemmer.stem(&current);
            if next == current {
                break;
            }
            current = next.into_owned();
        }
        current
    }

    /// Normalize text into its token sequence
    #[must_use]
    pub fn normalize(&self, text: &str) -> Vec<String> {
        Self::tokenize(text)
            .into_iter()
            .filter_map(|token| {
                let preserved = token == self.preserved_acronym;
                let word = if preserved {
                    token.to_string()
                } else {
                    token.to_lowercase()
                };

                if self.stopwords.contains(&word) || self.is_punctuation_token(&word) {
                    return None;
                }

                let stripped: String = word
                    .chars()
                    .filter(|c| !self.punctuation.contains(c))
                    .collect();

                let stemmed = if preserved {
                    stripped
                } else {
                    self.stem(stripped)
                };

                // A stem can itself be a stopword (`benen` -> `ben`)
                let numeric = stemmed.chars().all(|c| c.is_ascii_digit());
                let dropped = numeric || (!preserved && self.stopwords.contains(&stemmed));
                (!stemmed.is_empty() && !dropped).then_some(stemmed)
            })
            .collect()
    }

    /// Normalize text into a space-joined string
    #[must_use]
    pub fn normalize_to_string(&self, text: &str) -> String {
        self.normalize(text).join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_punctuation() {
        let tokens = TextNormalizer::tokenize("Pijn op de borst, sinds 38.5 #pols!");
        assert_eq!(
            tokens,
            vec!["Pijn", "op", "de", "borst", ",", "sinds", "38.5", "#", "pols", "!"]
        );
    }

    #[test]
    fn test_stopwords_punctuation_and_digits_removed() {
        let normalizer = TextNormalizer::default();
        let tokens = normalizer.normalize("Pijn op de borst, 38.5 graden 12");

        let stem = Stemmer::create(Algorithm::Dutch).stem("pijn").into_owned();
        assert!(tokens.contains(&stem));
        assert!(!tokens.iter().any(|t| t == "op" || t == "de" || t == ","));
        assert!(!tokens.iter().any(|t| t.chars().all(|c| c.is_ascii_digit())));
    }

    #[test]
    fn test_acronym_keeps_casing() {
        let normalizer = TextNormalizer::default();

        assert_eq!(normalizer.normalize("HET"), vec!["HET".to_string()]);
        // The lowercase word is a stopword
        assert!(normalizer.normalize("het").is_empty());
        assert!(normalizer.normalize("Het").is_empty());
    }

    #[test]
    fn test_kept_symbol_survives() {
        let complaint = TextNormalizer::default().keeping('#');
        let report = TextNormalizer::default();

        let kept = complaint.normalize("# pols");
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], "#");
        assert_eq!(report.normalize("# pols"), kept[1..].to_vec());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let normalizer = TextNormalizer::default().keeping('#');
        let first = normalizer.normalize("HET, pijn op de borst sinds gisteren");
        let second = normalizer.normalize(&first.join(" "));

        assert_eq!(first, second);
        assert_eq!(first[0], "HET");
    }

    #[test]
    fn test_stems_that_are_stopwords_are_dropped() {
        let normalizer = TextNormalizer::default().keeping('#');
        for text in [
            "benen",
            "hete pijn",
            "zelfs",
            "tegens",
            "datte",
            "ooks",
            "pijnlijke benen na val",
            "HET met hete voeten",
            "# pols, zwelling en roodheid",
            "koorts sinds gisteren, hoesten en benauwdheid",
        ] {
            let first = normalizer.normalize(text);
            let second = normalizer.normalize(&first.join(" "));
            assert_eq!(first, second, "{text}");
            assert!(
                first.iter().all(|t| t == "HET" || !DUTCH_STOPWORDS.contains(&t.as_str())),
                "{text}: {first:?}"
            );
        }
    }

    #[test]
    fn test_string_and_tokens_agree() {
        let normalizer = TextNormalizer::default();
        let text = "Val van trap, pijn in de knie";
        assert_eq!(
            normalizer.normalize_to_string(text),
            normalizer.normalize(text).join(" ")
        );
    }
}
