use regex::Regex;

/// Indonesian function words used as a rough language check. A transcript
/// with none of these is assumed to be in the wrong language.
const INDONESIAN_INDICATORS: [&str; 14] = [
    "yang", "dari", "dengan", "untuk", "dalam", "pada", "ini", "itu", "jadi", "ada", "tidak",
    "sudah", "akan", "seperti",
];

/// Outcome of the normalization pass.
///
/// `Rejected` is a quality verdict, not an error: text that is too short or
/// does not look like the target language is silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(String),
    Rejected,
}

/// Cleans raw transcript text and applies the corpus acceptance filter.
pub struct TextNormalizer {
    min_tokens: usize,
    indicators: Vec<String>,
    timestamp_re: Regex,
    whitespace_re: Regex,
}

impl TextNormalizer {
    pub fn new(min_tokens: usize, indicators: Vec<String>) -> Self {
        Self {
            min_tokens,
            indicators,
            // Cue timestamps leak into raw caption text as "HH:MM:SS" lines
            timestamp_re: Regex::new(r"\d+:\d+:\d+\s*\n").expect("valid timestamp pattern"),
            whitespace_re: Regex::new(r"\s+").expect("valid whitespace pattern"),
        }
    }

    /// Clean `raw` and decide whether it is corpus material.
    ///
    /// Steps, in order: strip timestamp lines, collapse whitespace, reject
    /// anything under the token minimum, reject anything without at least
    /// one indicator word (substring match, case-insensitive).
    pub fn normalize(&self, raw: &str) -> Verdict {
        let stripped = self.timestamp_re.replace_all(raw, "");
        let cleaned = self
            .whitespace_re
            .replace_all(&stripped, " ")
            .trim()
            .to_string();

        if cleaned.split_whitespace().count() < self.min_tokens {
            return Verdict::Rejected;
        }

        let lowered = cleaned.to_lowercase();
        if !self
            .indicators
            .iter()
            .any(|word| lowered.contains(word.as_str()))
        {
            return Verdict::Rejected;
        }

        Verdict::Accepted(cleaned)
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(
            10,
            INDONESIAN_INDICATORS.iter().map(|w| w.to_string()).collect(),
        )
    }
}
