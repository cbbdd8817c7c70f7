//! Near-duplicate detection between articles.
//!
//! `similarity` is the arithmetic mean of a token-set (Jaccard) score and an
//! edit-distance score over whitespace/case-normalized text. Duplicate screening
//! compares a candidate against the published items of one tenant and flags a pair
//! when either the title score or the content score exceeds the threshold.

use std::collections::HashSet;

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::store::ContentItem;
use crate::util::text::{is_cjk_char, normalize_whitespace_lower, plain_text_prefix};

pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_CONTENT_CHARS: usize = 500;

/// 2つの文字列の類似度を `[0, 1]` で返す。
///
/// どちらかが正規化後に空であれば `0.0`、正規化後に一致すれば `1.0`。
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_whitespace_lower(a);
    let b = normalize_whitespace_lower(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let score = (token_set_similarity(&a, &b) + edit_similarity(&a, &b)) / 2.0;
    score.clamp(0.0, 1.0)
}

/// Jaccard index over the token sets of two normalized strings.
#[must_use]
pub fn token_set_similarity(a: &str, b: &str) -> f64 {
    let left = tokens(a);
    let right = tokens(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    intersection as f64 / union as f64
}

/// `1 - levenshtein / max(len)`, lengths counted in chars.
#[must_use]
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    let distance = strsim::levenshtein(a, b);
    1.0 - distance as f64 / longest as f64
}

// CJK runs carry no spaces between words; split them into grapheme clusters.
fn tokens(text: &str) -> HashSet<&str> {
    let mut set = HashSet::new();
    for token in text.split_whitespace() {
        if token.chars().any(is_cjk_char) {
            set.extend(token.graphemes(true));
        } else {
            set.insert(token);
        }
    }
    set
}

/// 重複判定の対象となる候補。
#[derive(Debug, Clone, Default)]
pub struct DuplicateCandidate {
    pub id: Option<Uuid>,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<Uuid>,
    pub compared_id: Uuid,
    pub title: String,
    pub title_similarity: f64,
    pub content_similarity: f64,
}

impl SimilarityResult {
    fn strongest(&self) -> f64 {
        self.title_similarity.max(self.content_similarity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningOutcome {
    pub is_duplicate: bool,
    pub duplicates: Vec<SimilarityResult>,
    pub checked_count: usize,
}

/// 重複スクリーニング設定。
#[derive(Debug, Clone, Copy)]
pub struct DuplicateScreen {
    threshold: f64,
    content_chars: usize,
}

impl Default for DuplicateScreen {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_THRESHOLD, DEFAULT_CONTENT_CHARS)
    }
}

impl DuplicateScreen {
    #[must_use]
    pub fn new(threshold: f64, content_chars: usize) -> Self {
        Self {
            threshold,
            content_chars,
        }
    }

    /// 候補を既存の公開アイテムと比較する（助言的。永続化はブロックしない）。
    ///
    /// 候補自身の ID を持つアイテムは比較対象から除外する。
    #[must_use]
    pub fn screen(&self, candidate: &DuplicateCandidate, existing: &[ContentItem]) -> ScreeningOutcome {
        let candidate_content = plain_text_prefix(&candidate.content, self.content_chars);
        let mut checked_count = 0;
        let mut duplicates = Vec::new();

        for item in existing {
            if candidate.id == Some(item.id) {
                continue;
            }
            checked_count += 1;

            let title_similarity = similarity(&candidate.title, &item.title);
            let content_similarity = if candidate_content.is_empty() {
                0.0
            } else {
                similarity(
                    &candidate_content,
                    &plain_text_prefix(&item.body, self.content_chars),
                )
            };

            if title_similarity > self.threshold || content_similarity > self.threshold {
                duplicates.push(SimilarityResult {
                    candidate_id: candidate.id,
                    compared_id: item.id,
                    title: item.title.clone(),
                    title_similarity,
                    content_similarity,
                });
            }
        }

        duplicates.sort_by(|a, b| b.strongest().total_cmp(&a.strongest()));

        ScreeningOutcome {
            is_duplicate: !duplicates.is_empty(),
            duplicates,
            checked_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentKind;
    use rstest::rstest;

    fn published(title: &str, body: &str) -> ContentItem {
        ContentItem::new("tenant", ContentKind::Article, title, "slug")
            .with_body("", body)
            .published(true)
    }

    #[rstest]
    #[case("Hello World")]
    #[case("  spaced   OUT  text ")]
    #[case("バリアフリー観光地ガイド")]
    fn identical_strings_score_one(#[case] text: &str) {
        assert!((similarity(text, text) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn normalization_makes_case_and_spacing_irrelevant() {
        assert!((similarity("Hello   World", " hello world ") - 1.0).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case("", "x")]
    #[case("x", "")]
    #[case("", "")]
    #[case("   ", "   ")]
    fn empty_inputs_score_zero(#[case] a: &str, #[case] b: &str) {
        assert!(similarity(a, b).abs() < f64::EPSILON);
    }

    #[test]
    fn disjoint_strings_have_zero_token_score_and_partial_edit_score() {
        let a = "abc def";
        let b = "xyz uvw";
        assert!(token_set_similarity(a, b).abs() < f64::EPSILON);
        assert!(edit_similarity(a, b) < 1.0);
        let score = similarity(a, b);
        assert!((0.0..1.0).contains(&score));
    }

    #[test]
    fn scores_stay_within_unit_interval() {
        let pairs = [
            ("a", "abcdefghijklmnop"),
            ("the quick brown fox", "the lazy dog"),
            ("東京 観光", "tokyo sightseeing"),
        ];
        for (a, b) in pairs {
            let score = similarity(a, b);
            assert!((0.0..=1.0).contains(&score), "{a} vs {b} => {score}");
        }
    }

    #[test]
    fn one_character_japanese_difference_is_similar() {
        let score = similarity("バリアフリー観光地ガイド", "バリアフリー観光ガイド");
        assert!(score > 0.7, "score was {score}");
    }

    #[test]
    fn screen_flags_title_duplicates() {
        let existing = vec![
            published("バリアフリー観光ガイド", "<p>車椅子で楽しめる観光地</p>"),
            published("京都グルメ特集", "<p>京都のおすすめ料理</p>"),
        ];
        let candidate = DuplicateCandidate {
            id: None,
            title: "バリアフリー観光地ガイド".into(),
            content: String::new(),
        };

        let outcome = DuplicateScreen::default().screen(&candidate, &existing);

        assert!(outcome.is_duplicate);
        assert_eq!(outcome.checked_count, 2);
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.duplicates[0].title, "バリアフリー観光ガイド");
        assert!(outcome.duplicates[0].content_similarity.abs() < f64::EPSILON);
    }

    #[test]
    fn screen_flags_content_only_duplicates() {
        let body = "<p>Wheelchair friendly travel spots across Japan with accessible onsen.</p>";
        let existing = vec![published("Completely different headline", body)];
        let candidate = DuplicateCandidate {
            id: None,
            title: "Another title entirely".into(),
            content: body.replace("<p>", "<div>").replace("</p>", "</div>"),
        };

        let outcome = DuplicateScreen::default().screen(&candidate, &existing);

        assert!(outcome.is_duplicate);
        assert!(outcome.duplicates[0].title_similarity <= 0.7);
        assert!((outcome.duplicates[0].content_similarity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn screen_skips_the_candidate_itself() {
        let item = published("Same title", "body");
        let candidate = DuplicateCandidate {
            id: Some(item.id),
            title: item.title.clone(),
            content: item.body.clone(),
        };

        let outcome = DuplicateScreen::default().screen(&candidate, &[item]);

        assert!(!outcome.is_duplicate);
        assert_eq!(outcome.checked_count, 0);
    }

    #[test]
    fn screen_orders_strongest_match_first() {
        let existing = vec![
            published("Spring travel tips for Kyoto", ""),
            published("Spring travel tips for Kyoto!", ""),
        ];
        let candidate = DuplicateCandidate {
            id: None,
            title: "Spring travel tips for Kyoto!".into(),
            content: String::new(),
        };

        let outcome = DuplicateScreen::default().screen(&candidate, &existing);

        assert_eq!(outcome.duplicates.len(), 2);
        assert!((outcome.duplicates[0].title_similarity - 1.0).abs() < f64::EPSILON);
    }
}
