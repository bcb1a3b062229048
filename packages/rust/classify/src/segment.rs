//! Word segmentation for CJK text.
//!
//! Chinese has no word delimiters, so tokens come from forward maximum
//! matching against a dictionary seeded with the keyword index vocabulary.
//! Latin letters and digits form their own tokens; punctuation and
//! whitespace separate tokens and are dropped.

use std::collections::HashSet;

use slugforge_translate::is_cjk;

use crate::keywords::KeywordIndex;

/// Splits text into word tokens.
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Forward-maximum-matching segmenter over a fixed dictionary.
///
/// CJK characters that start no dictionary word become single-character
/// tokens.
#[derive(Debug, Clone, Default)]
pub struct DictionarySegmenter {
    words: HashSet<String>,
    longest: usize,
}

impl DictionarySegmenter {
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: HashSet<String> = vocabulary.into_iter().map(Into::into).collect();
        let longest = words.iter().map(|w| w.chars().count()).max().unwrap_or(1);
        Self { words, longest }
    }

    /// Dictionary made of every term the index knows.
    pub fn from_index(index: &KeywordIndex) -> Self {
        Self::new(index.vocabulary())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Longest dictionary word starting at `chars[0]`, in characters.
    fn match_len(&self, chars: &[char]) -> usize {
        let max = chars.len().min(self.longest);
        (2..=max)
            .rev()
            .find(|&len| {
                let candidate: String = chars[..len].iter().collect();
                self.words.contains(&candidate)
            })
            .unwrap_or(1)
    }
}

impl Segmenter for DictionarySegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if is_cjk(c) {
                let run_end = chars[i..]
                    .iter()
                    .position(|c| !is_cjk(*c))
                    .map_or(chars.len(), |offset| i + offset);
                let len = self.match_len(&chars[i..run_end]);
                tokens.push(chars[i..i + len].iter().collect());
                i += len;
            } else if c.is_alphanumeric() {
                let start = i;
                while i < chars.len() && chars[i].is_alphanumeric() && !is_cjk(chars[i]) {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
            } else {
                i += 1;
            }
        }

        tokens
    }
}
