//! Episode metadata recovered from asset filenames.
//!
//! Podcast assets are uploaded with loosely conventional names such as
//! `20230412_123@HPCpodcast_Title.mp3` or `OXD012_Some_Title.mp3`. The
//! extractor tries an ordered table of patterns against the filename and the
//! first one that matches decides code, feature and title. Nothing here looks
//! at the clock or the store: same input, same output.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

/// Features that appear verbatim after a `{code}@` marker.
const AT_FEATURES: &str = "HPCpodcast|HPCNB|Mktg_Podcast";

/// Features that appear as a `{feature}_` filename prefix.
const PREFIX_FEATURES: &str = "HPCpodcast|HPCNB|Mktg_Podcast|OXD";

static AUDIO_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mp3|wav|aac|m4a)$").expect("audio extension pattern should compile")
});

static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})").expect("date prefix pattern should compile"));

static YEAR_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("year segment pattern should compile"));

static MONTH_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}$").expect("month segment pattern should compile"));

static CODE_AND_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(\d{3})_(.*)$").expect("code/title pattern should compile"));

static CODE_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{3})$").expect("code pattern should compile"));

/// What the extractor recovered from one filename or URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EpisodeMetadata {
    pub code: Option<String>,
    pub feature: Option<String>,
    /// Never absent; may be empty.
    pub title: String,
    pub created_at: Option<NaiveDate>,
}

/// Code / feature / title triple produced by one identity pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    code: Option<String>,
    feature: Option<String>,
    title: String,
}

/// Receives the pattern captures and the text following the match.
type Extractor = fn(&Captures<'_>, &str) -> Identity;

struct IdentityPattern {
    regex: Regex,
    extract: Extractor,
}

impl IdentityPattern {
    fn new(pattern: &str, extract: Extractor) -> Self {
        Self {
            regex: Regex::new(pattern).expect("identity pattern should compile"),
            extract,
        }
    }

    fn apply(&self, filename: &str) -> Option<Identity> {
        let caps = self.regex.captures(filename)?;
        let rest = &filename[caps.get(0)?.end()..];
        Some((self.extract)(&caps, rest))
    }
}

/// Tried in order, first match wins. No pattern is retried after a later one fails.
static IDENTITY_PATTERNS: LazyLock<Vec<IdentityPattern>> = LazyLock::new(|| {
    vec![
        // 123@HPCpodcast_Title
        IdentityPattern::new(&format!(r"^(\d{{3}})@({AT_FEATURES})"), |caps, rest| Identity {
            code: Some(caps[1].to_string()),
            feature: Some(caps[2].to_string()),
            title: rest.strip_prefix('_').unwrap_or(rest).to_string(),
        }),
        // A123-Title
        IdentityPattern::new(r"^(A\d{3})-", |caps, rest| Identity {
            code: Some(caps[1].to_string()),
            feature: None,
            title: rest.to_string(),
        }),
        // OXD012_Title
        IdentityPattern::new(r"^([A-Z]+)(\d{3})_", |caps, rest| Identity {
            code: Some(caps[2].to_string()),
            feature: Some(caps[1].to_string()),
            title: rest.to_string(),
        }),
        // HPCNB_Title, HPCNB_123_Title, HPCNB_123
        IdentityPattern::new(&format!(r"^({PREFIX_FEATURES})_"), |caps, rest| {
            let feature = Some(caps[1].to_string());
            if let Some(inner) = CODE_AND_TITLE.captures(rest) {
                Identity {
                    code: Some(inner[1].to_string()),
                    feature,
                    title: inner[2].to_string(),
                }
            } else if let Some(inner) = CODE_ONLY.captures(rest) {
                Identity {
                    code: Some(inner[1].to_string()),
                    feature,
                    title: String::new(),
                }
            } else {
                Identity {
                    code: None,
                    feature,
                    title: rest.to_string(),
                }
            }
        }),
    ]
});

/// Remove one trailing audio extension (`.mp3`, `.wav`, `.aac`, `.m4a`).
pub fn strip_audio_extension(name: &str) -> &str {
    match AUDIO_EXTENSION.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// Extract episode metadata from a filename or full URL.
///
/// The creation date comes from a `YYYYMMDD` filename prefix, or failing that
/// from a `/YYYY/MM/` pair in the path. Code, feature and title only ever come
/// from the last path segment.
pub fn extract(input: &str) -> EpisodeMetadata {
    if input.is_empty() {
        return EpisodeMetadata::default();
    }

    let segment = input.rsplit('/').next().unwrap_or(input);
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let mut filename = strip_audio_extension(&decoded);

    let mut created_at = None;
    if let Some((date, rest)) = split_date_prefix(filename) {
        created_at = Some(date);
        filename = rest;
    }
    if created_at.is_none() {
        created_at = date_from_path(input);
    }

    let identity = IDENTITY_PATTERNS
        .iter()
        .find_map(|pattern| pattern.apply(filename))
        .unwrap_or_else(|| Identity {
            code: None,
            feature: None,
            title: filename.to_string(),
        });

    EpisodeMetadata {
        code: identity.code,
        feature: identity.feature,
        title: identity.title,
        created_at,
    }
}

/// `20230412_Title` -> (2023-04-12, "_Title"). Invalid dates keep their digits.
fn split_date_prefix(filename: &str) -> Option<(NaiveDate, &str)> {
    let caps = DATE_PREFIX.captures(filename)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    Some((date, &filename[8..]))
}

/// First `/YYYY/MM/` segment pair in the path, as the first day of that month.
fn date_from_path(input: &str) -> Option<NaiveDate> {
    let segments: Vec<&str> = input.split('/').collect();
    segments.windows(2).find_map(|pair| {
        if !YEAR_SEGMENT.is_match(pair[0]) || !MONTH_SEGMENT.is_match(pair[1]) {
            return None;
        }
        NaiveDate::from_ymd_opt(pair[0].parse().ok()?, pair[1].parse().ok()?, 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    // -------------------------------------------------------------------------
    // IDENTITY PATTERNS
    // -------------------------------------------------------------------------

    #[test]
    fn test_code_at_feature() {
        let meta = extract("123@HPCpodcast_Quantum_Update.mp3");
        assert_eq!(meta.code.as_deref(), Some("123"));
        assert_eq!(meta.feature.as_deref(), Some("HPCpodcast"));
        assert_eq!(meta.title, "Quantum_Update");
    }

    #[test]
    fn test_code_at_feature_without_separator() {
        let meta = extract("045@HPCNBWeekly_Roundup");
        assert_eq!(meta.code.as_deref(), Some("045"));
        assert_eq!(meta.feature.as_deref(), Some("HPCNB"));
        assert_eq!(meta.title, "Weekly_Roundup");
    }

    #[test]
    fn test_a_code_dash() {
        let meta = extract("A042-Exascale-Interview.mp3");
        assert_eq!(meta.code.as_deref(), Some("A042"));
        assert_eq!(meta.feature, None);
        assert_eq!(meta.title, "Exascale-Interview");
    }

    #[test]
    fn test_letters_code_underscore() {
        let meta = extract("OXD012_Storage_Trends.mp3");
        assert_eq!(meta.code.as_deref(), Some("012"));
        assert_eq!(meta.feature.as_deref(), Some("OXD"));
        assert_eq!(meta.title, "Storage_Trends");
    }

    #[test]
    fn test_feature_prefix_with_code_and_title() {
        let meta = extract("HPCNB_077_Chip_News.mp3");
        assert_eq!(meta.code.as_deref(), Some("077"));
        assert_eq!(meta.feature.as_deref(), Some("HPCNB"));
        assert_eq!(meta.title, "Chip_News");
    }

    #[test]
    fn test_feature_prefix_with_bare_code() {
        let meta = extract("Mktg_Podcast_310.mp3");
        assert_eq!(meta.code.as_deref(), Some("310"));
        assert_eq!(meta.feature.as_deref(), Some("Mktg_Podcast"));
        assert_eq!(meta.title, "");
    }

    #[test]
    fn test_feature_prefix_title_only() {
        let meta = extract("HPCpodcast_Year_In_Review.mp3");
        assert_eq!(meta.code, None);
        assert_eq!(meta.feature.as_deref(), Some("HPCpodcast"));
        assert_eq!(meta.title, "Year_In_Review");
    }

    #[test]
    fn test_first_match_wins() {
        // Matches the letters+code pattern before the feature-prefix pattern.
        let meta = extract("OXD001_HPCNB_Title");
        assert_eq!(meta.feature.as_deref(), Some("OXD"));
        assert_eq!(meta.code.as_deref(), Some("001"));
        assert_eq!(meta.title, "HPCNB_Title");
    }

    #[test]
    fn test_fallback_uses_filename() {
        let meta = extract("https://example.com/wp-content/uploads/random-episode.mp3");
        assert_eq!(meta.code, None);
        assert_eq!(meta.feature, None);
        assert_eq!(meta.title, "random-episode");
    }

    // -------------------------------------------------------------------------
    // DATES
    // -------------------------------------------------------------------------

    #[test]
    fn test_date_prefix_is_stripped() {
        let meta = extract("20230412_HPCpodcast_Exascale.mp3");
        assert_eq!(meta.created_at, date(2023, 4, 12));
        // The prefix strip leaves the separator, so the feature pattern does not fire.
        assert_eq!(meta.feature, None);
        assert_eq!(meta.title, "_HPCpodcast_Exascale");
    }

    #[test]
    fn test_date_prefix_then_code_pattern() {
        let meta = extract("20230412OXD012_Trends.mp3");
        assert_eq!(meta.created_at, date(2023, 4, 12));
        assert_eq!(meta.code.as_deref(), Some("012"));
        assert_eq!(meta.feature.as_deref(), Some("OXD"));
        assert_eq!(meta.title, "Trends");
    }

    #[test]
    fn test_invalid_date_prefix_kept() {
        let meta = extract("20231399_Show.mp3");
        assert_eq!(meta.created_at, None);
        assert_eq!(meta.title, "20231399_Show");
    }

    #[test]
    fn test_date_from_url_path() {
        let meta = extract("https://example.com/wp-content/uploads/2022/09/A101-Talk.mp3");
        assert_eq!(meta.created_at, date(2022, 9, 1));
        assert_eq!(meta.code.as_deref(), Some("A101"));
    }

    #[test]
    fn test_prefix_date_beats_path_date() {
        let meta = extract("/wp-content/uploads/2022/09/20220915_Show.mp3");
        assert_eq!(meta.created_at, date(2022, 9, 15));
    }

    #[test]
    fn test_invalid_path_month_ignored() {
        let meta = extract("/wp-content/uploads/2022/13/Show.mp3");
        assert_eq!(meta.created_at, None);
    }

    // -------------------------------------------------------------------------
    // DECODING AND EXTENSIONS
    // -------------------------------------------------------------------------

    #[test]
    fn test_url_decoding() {
        let meta = extract("/wp-content/uploads/2021/01/My%20Great%20Show.MP3");
        assert_eq!(meta.title, "My Great Show");
    }

    #[test]
    fn test_strip_audio_extension_variants() {
        assert_eq!(strip_audio_extension("show.mp3"), "show");
        assert_eq!(strip_audio_extension("show.M4A"), "show");
        assert_eq!(strip_audio_extension("show.wav"), "show");
        assert_eq!(strip_audio_extension("show.mp3.txt"), "show.mp3.txt");
        assert_eq!(strip_audio_extension("show"), "show");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract(""), EpisodeMetadata::default());
    }

    #[test]
    fn test_determinism() {
        let input = "https://example.com/wp-content/uploads/2024/02/123@HPCpodcast_AI.mp3";
        let baseline = extract(input);
        for _ in 0..10 {
            assert_eq!(extract(input), baseline);
        }
    }
}
