//! Title keyword extraction.
//!
//! Tier 1 matches the curated domain terms, longest first, without overlaps.
//! When that finds fewer than two terms, tier 2 falls back to short windows
//! over the remaining text: whole Latin/digit runs, then 2-4 character CJK
//! windows, with windows holding a domain root character preferred.

use std::collections::HashSet;

use slugforge_classify::SlugVocabulary;
use slugforge_translate::is_cjk;

/// Below this many curated matches the window scan runs too.
const MIN_CURATED_TERMS: usize = 2;

/// A keyword found in a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleTerm {
    pub text: String,
    /// Character offset of the term in the title.
    pub position: usize,
    /// Whether the term came from the curated vocabulary.
    pub curated: bool,
}

impl TitleTerm {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn range(&self) -> (usize, usize) {
        (self.position, self.position + self.char_len())
    }
}

/// Up to `max_terms` keywords from `title`, in title order.
pub fn extract_title_terms(
    title: &str,
    vocabulary: &SlugVocabulary,
    stop_words: &HashSet<String>,
    max_terms: usize,
) -> Vec<TitleTerm> {
    let chars: Vec<char> = title.chars().collect();
    if chars.is_empty() || max_terms == 0 {
        return Vec::new();
    }

    let mut terms = curated_terms(&chars, vocabulary, max_terms);

    if terms.len() < MIN_CURATED_TERMS {
        for window in window_terms(&chars, vocabulary, stop_words) {
            if terms.len() >= max_terms {
                break;
            }
            if !terms.iter().any(|t| overlaps(t.range(), window.range())) {
                terms.push(window);
            }
        }
    }

    terms.sort_by_key(|t| t.position);
    terms
}

fn curated_terms(chars: &[char], vocabulary: &SlugVocabulary, max_terms: usize) -> Vec<TitleTerm> {
    let mut curated: Vec<Vec<char>> = vocabulary
        .domain_terms
        .iter()
        .map(|t| t.chars().collect::<Vec<char>>())
        .filter(|t| !t.is_empty())
        .collect();
    // Longest first; equal lengths keep vocabulary order.
    curated.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut found: Vec<TitleTerm> = Vec::new();
    for term in curated {
        if found.len() >= max_terms {
            break;
        }
        let free = find_all(chars, &term).find(|&start| {
            let range = (start, start + term.len());
            !found.iter().any(|t| overlaps(t.range(), range))
        });
        if let Some(position) = free {
            found.push(TitleTerm {
                text: term.iter().collect(),
                position,
                curated: true,
            });
        }
    }
    found
}

/// Tier-2 candidates, preferred windows first, each group in title order.
fn window_terms(chars: &[char], vocabulary: &SlugVocabulary, stop_words: &HashSet<String>) -> Vec<TitleTerm> {
    let mut preferred = Vec::new();
    let mut plain = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_alphanumeric() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            if i - start >= 2 {
                preferred.push(TitleTerm {
                    text: chars[start..i].iter().collect(),
                    position: start,
                    curated: false,
                });
            }
        } else if is_cjk(c) {
            let start = i;
            while i < chars.len() && is_cjk(chars[i]) {
                i += 1;
            }
            cjk_windows(&chars[start..i], start, vocabulary, stop_words, &mut preferred, &mut plain);
        } else {
            i += 1;
        }
    }

    preferred.extend(plain);
    preferred
}

/// Non-overlapping windows over one CJK run, longest window first at each
/// position.
fn cjk_windows(
    run: &[char],
    offset: usize,
    vocabulary: &SlugVocabulary,
    stop_words: &HashSet<String>,
    preferred: &mut Vec<TitleTerm>,
    plain: &mut Vec<TitleTerm>,
) {
    let mut i = 0;
    while i + 2 <= run.len() {
        let window = (2..=4usize).rev().filter(|len| i + len <= run.len()).find_map(|len| {
            let text: String = run[i..i + len].iter().collect();
            let usable = !stop_words.contains(&text)
                && !stop_words.iter().any(|s| s.chars().count() >= 2 && text.contains(s.as_str()));
            usable.then_some((text, len))
        });

        match window {
            Some((text, len)) => {
                let rooted = text.chars().any(|c| vocabulary.root_chars.contains(c));
                let term = TitleTerm {
                    text,
                    position: offset + i,
                    curated: false,
                };
                if rooted {
                    preferred.push(term);
                } else {
                    plain.push(term);
                }
                i += len;
            }
            None => i += 1,
        }
    }
}

fn find_all<'a>(haystack: &'a [char], needle: &'a [char]) -> impl Iterator<Item = usize> + 'a {
    let last = haystack.len().checked_sub(needle.len());
    (0..=last.unwrap_or(0))
        .filter(move |_| last.is_some())
        .filter(move |&i| haystack[i..i + needle.len()] == *needle)
}

fn overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 < b.1 && b.0 < a.1
}
