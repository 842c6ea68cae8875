//! Token Estimator (C12, §4.12 "Token estimator").
//!
//! Pluggable `Tokenizer` trait, same shape as the source project's
//! `tokenizer.rs` (`BytesEstimateTokenizer` / `TiktokenTokenizer`), but with
//! a richer default: a BPE-like heuristic (whitespace split, then sub-token
//! splitting on punctuation and case boundaries) instead of a flat
//! bytes/3 estimate, because §4.12 requires the default to approximate real
//! subword tokenization, not just byte length.

use std::sync::Arc;

pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Whitespace,
    Lower,
    Upper,
    Digit,
    Other,
}

fn classify(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Whitespace
    } else if c.is_lowercase() {
        CharClass::Lower
    } else if c.is_uppercase() {
        CharClass::Upper
    } else if c.is_ascii_digit() {
        CharClass::Digit
    } else {
        CharClass::Other
    }
}

/// Counts sub-word tokens via a single forward scan: a new token starts at
/// whitespace boundaries, alnum/punctuation boundaries, lower→upper case
/// boundaries, and every "other" (punctuation) character is its own token.
/// Because this only ever starts new tokens while scanning forward, it is
/// monotone in appended content: `subtoken_count(a) <= subtoken_count(a + b)`
/// for any `b` (§4.12 invariant).
fn subtoken_count(text: &str) -> usize {
    let mut count = 0usize;
    let mut prev: Option<CharClass> = None;
    let mut in_token = false;

    for c in text.chars() {
        let class = classify(c);
        match class {
            CharClass::Whitespace => {
                in_token = false;
                prev = None;
                continue;
            }
            CharClass::Other => {
                // Each punctuation/symbol character is its own token.
                count += 1;
                in_token = false;
                prev = None;
                continue;
            }
            _ => {}
        }

        let boundary = match prev {
            None => true,
            Some(CharClass::Lower) if class == CharClass::Upper => true,
            Some(p) if p != class && !matches!((p, class), (CharClass::Upper, CharClass::Lower)) => true,
            _ => false,
        };

        if boundary || !in_token {
            count += 1;
            in_token = true;
        }
        prev = Some(class);
    }
    count
}

/// Calibration factor applied to the raw sub-token count, tuned so typical
/// source text lands close to real BPE tokenizers' token/word ratio.
const CALIBRATION: f64 = 0.75;

/// Default: BPE-like sub-token heuristic (§4.12).
pub struct BpeHeuristicTokenizer;

impl Tokenizer for BpeHeuristicTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        ((subtoken_count(text) as f64) * CALIBRATION).ceil() as usize
    }

    fn name(&self) -> &str {
        "bpe-heuristic"
    }
}

/// Fallback bytes/3 estimator, kept for parity with the source project's
/// cheapest option and for callers that want a floor-cost estimate.
pub struct BytesEstimateTokenizer;

impl Tokenizer for BytesEstimateTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.len().div_ceil(3)
    }

    fn name(&self) -> &str {
        "bytes-estimate"
    }
}

#[cfg(feature = "tiktoken")]
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenTokenizer {
    pub fn new() -> Self {
        Self { bpe: tiktoken_rs::cl100k_base().expect("cl100k_base vocabulary is statically bundled") }
    }
}

#[cfg(feature = "tiktoken")]
impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn name(&self) -> &str {
        "tiktoken-cl100k"
    }
}

pub fn create_tokenizer(name: &str) -> Arc<dyn Tokenizer> {
    match name {
        "bytes-estimate" => Arc::new(BytesEstimateTokenizer),
        #[cfg(feature = "tiktoken")]
        "tiktoken-cl100k" => Arc::new(TiktokenTokenizer::new()),
        _ => Arc::new(BpeHeuristicTokenizer),
    }
}
