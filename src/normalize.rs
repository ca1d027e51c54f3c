//! Regex based text cleaning.
//!
//! The steps always run in the same order: NFKC, URL, e-mail, hashtag,
//! mention, emoji, laugh/cry runs, character class filter, whitespace
//! collapse. Each removal replaces the match with a single space.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("valid url regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.-]+@[\w.-]+").expect("valid email regex"));
static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[\w가-힣]+").expect("valid hashtag regex"));
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[\w가-힣]+").expect("valid mention regex"));
static EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{1F1E0}-\x{1F1FF}\x{2700}-\x{27BF}]",
    )
    .expect("valid emoji regex")
});

// Compatibility jamo (ㅋ ㅎ / ㅠ ㅜ) and the conjoining forms NFKC maps them to.
pub(crate) const LAUGH_CLASS: &str = r"[\x{314B}\x{314E}\x{110F}\x{1112}]";
pub(crate) const CRY_CLASS: &str = r"[\x{3160}\x{315C}\x{1172}\x{116E}]";

static LAUGH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("{LAUGH_CLASS}{{2,}}")).expect("valid laugh regex"));
static CRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("{CRY_CLASS}{{2,}}")).expect("valid cry regex"));

/// Cleaning switches. Everything is on by default except keeping digits
/// and Latin letters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    pub remove_url: bool,
    pub remove_email: bool,
    pub remove_hashtag: bool,
    pub remove_mention: bool,
    pub remove_emoji: bool,
    pub remove_laugh: bool,
    pub korean_only: bool,
    pub keep_number: bool,
    pub keep_english: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            remove_url: true,
            remove_email: true,
            remove_hashtag: true,
            remove_mention: true,
            remove_emoji: true,
            remove_laugh: true,
            korean_only: true,
            keep_number: false,
            keep_english: false,
        }
    }
}

/// Returns true for precomposed Hangul syllables (가..힣).
pub fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

/// Cleans a raw text according to `options`. Never fails: empty input gives an empty string.
///
/// # Example
/// ```
/// use text_mining::normalize::{clean, CleanOptions};
/// let cleaned = clean("안녕하세요!! https://x.com #태그 @user 😀 ㅋㅋㅋ", &CleanOptions::default());
/// assert_eq!(cleaned, "안녕하세요");
/// ```
pub fn clean(text: &str, options: &CleanOptions) -> String {
    let mut out: String = text.nfkc().collect();

    let steps: [(bool, &Regex); 5] = [
        (options.remove_url, &URL_RE),
        (options.remove_email, &EMAIL_RE),
        (options.remove_hashtag, &HASHTAG_RE),
        (options.remove_mention, &MENTION_RE),
        (options.remove_emoji, &EMOJI_RE),
    ];
    for (enabled, re) in steps {
        if enabled {
            out = re.replace_all(&out, " ").into_owned();
        }
    }
    if options.remove_laugh {
        out = LAUGH_RE.replace_all(&out, " ").into_owned();
        out = CRY_RE.replace_all(&out, " ").into_owned();
    }
    if options.korean_only {
        out = out
            .chars()
            .map(|c| {
                let keep = is_hangul_syllable(c)
                    || c.is_whitespace()
                    || (options.keep_number && c.is_ascii_digit())
                    || (options.keep_english && c.is_ascii_alphabetic());
                if keep { c } else { ' ' }
            })
            .collect();
    }
    collapse_whitespace(&out)
}

/// Collapses every whitespace run into one space and trims both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
