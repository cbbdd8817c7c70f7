//! Prompt construction and tolerant parsing of generated drafts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::clients::{Prompt, ProviderError};
use crate::store::{ContentItem, GenerationParams};

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*|__)?\s*(title|excerpt|summary|slug|body|content|faq|タイトル|見出し|抜粋|概要|要約|スラッグ|本文|よくある質問)\s*(?:\*\*|__)?\s*[:：]\s*(?:\*\*|__)?\s*(.*?)\s*$",
    )
    .expect("compile marker regex")
});

static HEADING_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*#{1,6}\s*(?:\*\*|__)?\s*(title|excerpt|summary|slug|body|content|faq|タイトル|見出し|抜粋|概要|要約|スラッグ|本文|よくある質問)\s*(?:\*\*|__)?\s*$",
    )
    .expect("compile heading marker regex")
});

static FAQ_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[-*]\s*)?(?:\*\*)?\s*(q|a|質問|回答)\s*\d*\s*(?:\*\*)?\s*[:：.]\s*(?:\*\*)?\s*(.*?)\s*$",
    )
    .expect("compile faq regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDraft {
    pub title: String,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub body: String,
    pub faq: Vec<FaqEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Title,
    Excerpt,
    Slug,
    Body,
    Faq,
}

impl Section {
    fn from_marker(marker: &str) -> Self {
        match marker.to_lowercase().as_str() {
            "title" | "タイトル" | "見出し" => Self::Title,
            "excerpt" | "summary" | "抜粋" | "概要" | "要約" => Self::Excerpt,
            "slug" | "スラッグ" => Self::Slug,
            "faq" | "よくある質問" => Self::Faq,
            _ => Self::Body,
        }
    }
}

/// 記事生成プロンプトを組み立てる。
#[must_use]
pub fn build_generation_prompt(params: &GenerationParams) -> Prompt {
    let system = "あなたは多言語メディアの編集者です。指定された条件で日本語の記事を1本執筆してください。\n\
        出力は必ず次の形式に従ってください。\n\
        TITLE: 記事タイトル\n\
        EXCERPT: 120文字程度の要約\n\
        SLUG: 英小文字とハイフンのみのURLスラッグ\n\
        BODY:\n\
        HTMLの本文（<h2>, <p>, <ul> を使用）\n\
        FAQ:\n\
        Q: 質問\n\
        A: 回答";

    let mut user = format!(
        "カテゴリID: {}\nライターID: {}\n想定読者: {}\n画像プロンプトパターンID: {}",
        params.category_id, params.writer_id, params.target_audience, params.image_prompt_pattern_id
    );
    if let Some(extra) = &params.extra {
        user.push_str("\n追加指示: ");
        user.push_str(&extra.to_string());
    }
    Prompt::new(system, user)
}

/// 既存記事のリライト用プロンプトを組み立てる。
#[must_use]
pub fn build_rewrite_prompt(item: &ContentItem, instructions: Option<&str>) -> Prompt {
    let system = "あなたは多言語メディアの編集者です。与えられた記事を、内容の正確さを保ったまま\
        読みやすく書き直してください。出力形式は TITLE: / EXCERPT: / BODY: / FAQ: に従ってください。";

    let mut user = format!(
        "元のタイトル: {}\n元の要約: {}\n元の本文:\n{}",
        item.title, item.excerpt, item.body
    );
    if let Some(instructions) = instructions.filter(|value| !value.trim().is_empty()) {
        user.push_str("\n\nリライト指示: ");
        user.push_str(instructions.trim());
    }
    Prompt::new(system, user)
}

/// 生成結果をマーカー単位で解析する。
///
/// マーカーは大文字小文字を区別せず、Markdown の装飾や全角コロンも許容する。
/// タイトル・本文のマーカーがない場合は応答全体を本文とし、最初の空でない行をタイトルにする。
/// `BODY:` がなければ、タイトル以降のマーカーのない行が本文になる。
///
/// # Errors
/// 応答が空の場合は [`ProviderError::EmptyResponse`] を返す。
pub fn parse_draft(response: &str) -> Result<ParsedDraft, ProviderError> {
    if response.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let mut section = Section::Preamble;
    let mut preamble: Vec<&str> = Vec::new();
    let mut title: Vec<&str> = Vec::new();
    let mut excerpt: Vec<&str> = Vec::new();
    let mut slug: Vec<&str> = Vec::new();
    let mut body: Vec<&str> = Vec::new();
    let mut faq: Vec<&str> = Vec::new();
    let mut seen: Vec<Section> = Vec::new();

    for line in response.lines() {
        let marker = MARKER_RE
            .captures(line)
            .map(|captures| {
                let rest = captures.get(2).map_or("", |m| m.as_str());
                (Section::from_marker(&captures[1]), rest)
            })
            .or_else(|| {
                HEADING_MARKER_RE
                    .captures(line)
                    .map(|captures| (Section::from_marker(&captures[1]), ""))
            })
            .filter(|(next, _)| accepts_marker(section, *next, &seen));

        let mut rest = line;
        if let Some((next, marker_rest)) = marker {
            section = next;
            seen.push(next);
            rest = marker_rest;
            if rest.is_empty() {
                continue;
            }
        }

        match section {
            Section::Preamble => preamble.push(rest),
            // タイトルとスラッグは最初の空でない1行だけを取る
            Section::Title | Section::Slug => {
                if rest.trim().is_empty() {
                    continue;
                }
                if section == Section::Title {
                    title.push(rest);
                } else {
                    slug.push(rest);
                }
                section = Section::Preamble;
            }
            Section::Excerpt => {
                if rest.trim().is_empty() && !excerpt.is_empty() {
                    section = Section::Preamble;
                    continue;
                }
                excerpt.push(rest);
            }
            Section::Body => body.push(rest),
            Section::Faq => faq.push(rest),
        }
    }

    let saw_title = seen.contains(&Section::Title);
    let saw_body = seen.contains(&Section::Body);

    let mut body = join_block(&body);
    if !saw_body {
        let leftover = join_block(&preamble);
        body = if saw_title && !leftover.is_empty() {
            leftover
        } else if saw_title {
            String::new()
        } else {
            response.trim().to_string()
        };
    }

    let mut title = join_inline(&title);
    if !saw_title || title.is_empty() {
        title = body
            .lines()
            .map(strip_heading)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();
    }

    if title.is_empty() && body.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let slug = Some(join_inline(&slug)).filter(|value| !value.is_empty());

    Ok(ParsedDraft {
        title,
        excerpt: join_inline(&excerpt),
        slug,
        body,
        faq: parse_faq(&faq),
    })
}

/// 同じマーカーの再出現は本文として扱う。本文中では FAQ 以外のマーカーで区切らない。
fn accepts_marker(current: Section, next: Section, seen: &[Section]) -> bool {
    if seen.contains(&next) {
        return false;
    }
    current != Section::Body || next == Section::Faq
}

fn parse_faq(lines: &[&str]) -> Vec<FaqEntry> {
    let mut entries: Vec<FaqEntry> = Vec::new();
    let mut in_answer = false;

    for line in lines {
        if let Some(captures) = FAQ_LINE_RE.captures(line) {
            let text = captures.get(2).map_or("", |m| m.as_str()).to_string();
            match captures[1].to_lowercase().as_str() {
                "q" | "質問" => {
                    entries.push(FaqEntry {
                        question: text,
                        answer: String::new(),
                    });
                    in_answer = false;
                }
                _ => {
                    if let Some(entry) = entries.last_mut() {
                        entry.answer = text;
                        in_answer = true;
                    }
                }
            }
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(entry) = entries.last_mut() {
            let target = if in_answer {
                &mut entry.answer
            } else {
                &mut entry.question
            };
            if !target.is_empty() {
                target.push(' ');
            }
            target.push_str(trimmed);
        }
    }

    entries.retain(|entry| !entry.question.is_empty());
    entries
}

fn join_inline(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| strip_heading(line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_block(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}

fn strip_heading(line: &str) -> &str {
    line.trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_all_markers() {
        let response = "TITLE: 京都の紅葉ガイド\n\
            EXCERPT: 紅葉の名所を紹介します。\n\
            SLUG: kyoto-autumn-guide\n\
            BODY:\n<h2>はじめに</h2>\n<p>京都の秋は美しい。</p>\n\
            FAQ:\nQ: 見頃はいつ？\nA: 11月下旬です。\nQ2: 混雑しますか？\nA2: 週末は混みます。";

        let draft = parse_draft(response).expect("parses");

        assert_eq!(draft.title, "京都の紅葉ガイド");
        assert_eq!(draft.excerpt, "紅葉の名所を紹介します。");
        assert_eq!(draft.slug.as_deref(), Some("kyoto-autumn-guide"));
        assert_eq!(draft.body, "<h2>はじめに</h2>\n<p>京都の秋は美しい。</p>");
        assert_eq!(
            draft.faq,
            vec![
                FaqEntry {
                    question: "見頃はいつ？".into(),
                    answer: "11月下旬です。".into()
                },
                FaqEntry {
                    question: "混雑しますか？".into(),
                    answer: "週末は混みます。".into()
                },
            ]
        );
    }

    #[rstest]
    #[case("**Title:** Spring in Kyoto")]
    #[case("**Title**: Spring in Kyoto")]
    #[case("# Title: Spring in Kyoto")]
    #[case("title：Spring in Kyoto")]
    #[case("タイトル：Spring in Kyoto")]
    fn accepts_decorated_title_markers(#[case] title_line: &str) {
        let response = format!("{title_line}\nBODY:\n<p>text</p>");

        let draft = parse_draft(&response).expect("parses");

        assert_eq!(draft.title, "Spring in Kyoto");
        assert_eq!(draft.body, "<p>text</p>");
    }

    #[test]
    fn heading_markers_without_colon_start_sections() {
        let response = "## Title\nSpring in Kyoto\n## Body\n<p>text</p>";

        let draft = parse_draft(response).expect("parses");

        assert_eq!(draft.title, "Spring in Kyoto");
        assert_eq!(draft.body, "<p>text</p>");
    }

    #[test]
    fn unmarked_response_becomes_body_with_first_line_title() {
        let response = "\n# 温泉めぐりのすすめ\n\n箱根と草津を巡る旅。\n";

        let draft = parse_draft(response).expect("parses");

        assert_eq!(draft.title, "温泉めぐりのすすめ");
        assert_eq!(draft.body, "# 温泉めぐりのすすめ\n\n箱根と草津を巡る旅。");
        assert!(draft.slug.is_none());
        assert!(draft.faq.is_empty());
    }

    #[test]
    fn title_without_body_marker_keeps_following_lines_as_body() {
        let response = "TITLE: Kyoto Guide\n<p>First paragraph.</p>\n<p>Second.</p>";

        let draft = parse_draft(response).expect("parses");

        assert_eq!(draft.title, "Kyoto Guide");
        assert_eq!(draft.body, "<p>First paragraph.</p>\n<p>Second.</p>");
    }

    #[test]
    fn excerpt_ends_at_blank_line_without_body_marker() {
        let response = "TITLE: 旅のヒント\nSLUG: travel-tips\nEXCERPT: 短い要約。\n続きの要約。\n\n<p>本文です。</p>";

        let draft = parse_draft(response).expect("parses");

        assert_eq!(draft.title, "旅のヒント");
        assert_eq!(draft.slug.as_deref(), Some("travel-tips"));
        assert_eq!(draft.excerpt, "短い要約。 続きの要約。");
        assert_eq!(draft.body, "<p>本文です。</p>");
    }

    #[rstest]
    #[case("Summary: the hot springs are great")]
    #[case("Content: the hot springs are great")]
    #[case("概要：the hot springs are great")]
    #[case("Title: the hot springs are great")]
    fn marker_like_lines_inside_body_stay_in_body(#[case] inner: &str) {
        let response = format!(
            "TITLE: T\nEXCERPT: short\nBODY:\n<p>Intro</p>\n{inner}\n<p>Closing</p>\nFAQ:\nQ: いつ？\nA: 秋です。"
        );

        let draft = parse_draft(&response).expect("parses");

        assert_eq!(draft.title, "T");
        assert_eq!(draft.excerpt, "short");
        assert_eq!(draft.body, format!("<p>Intro</p>\n{inner}\n<p>Closing</p>"));
        assert_eq!(draft.faq.len(), 1);
    }

    #[test]
    fn repeated_title_marker_is_not_a_new_title() {
        let response = "TITLE: 本当のタイトル\nTITLE: 二つ目\nBODY:\n<p>text</p>";

        let draft = parse_draft(response).expect("parses");

        assert_eq!(draft.title, "本当のタイトル");
        assert_eq!(draft.body, "<p>text</p>");
    }

    #[test]
    fn missing_body_marker_uses_unmarked_preamble() {
        let response = "前置きの段落です。\nTITLE: 旅のヒント";

        let draft = parse_draft(response).expect("parses");

        assert_eq!(draft.title, "旅のヒント");
        assert_eq!(draft.body, "前置きの段落です。");
    }

    #[rstest]
    #[case("")]
    #[case("   \n\t")]
    fn empty_response_is_rejected(#[case] response: &str) {
        assert!(matches!(
            parse_draft(response),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn generation_prompt_carries_params() {
        let params = GenerationParams {
            category_id: "cat-travel".into(),
            writer_id: "writer-1".into(),
            image_prompt_pattern_id: "img-3".into(),
            target_audience: "シニア".into(),
            extra: Some(serde_json::json!({"tone": "casual"})),
        };

        let prompt = build_generation_prompt(&params);

        assert!(prompt.system.contains("TITLE:"));
        assert!(prompt.user.contains("cat-travel"));
        assert!(prompt.user.contains("シニア"));
        assert!(prompt.user.contains("casual"));
    }
}
