//! Word segmentation and n-gram expansion for the term model.

use unicode_segmentation::UnicodeSegmentation;

/// Split `text` into lowercased words along Unicode word boundaries.
///
/// Scripts written without spaces, such as Chinese, come out one ideograph
/// per word, so bigrams over them act as character bigrams.
#[must_use]
pub fn words(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

/// All contiguous n-grams of `tokens` for `n` in `min..=max`, space-joined.
#[must_use]
pub fn ngrams(tokens: &[String], (min, max): (usize, usize)) -> Vec<String> {
    let min = min.max(1);
    let mut out = Vec::new();
    for n in min..=max {
        if n > tokens.len() {
            break;
        }
        out.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    out
}

/// `words` followed by `ngrams`.
#[must_use]
pub fn terms(text: &str, ngram_range: (usize, usize)) -> Vec<String> {
    ngrams(&words(text), ngram_range)
}
