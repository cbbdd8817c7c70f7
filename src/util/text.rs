/// テキスト処理ユーティリティ。
///
/// 類似度計算用の正規化、HTML除去、文字種ヒューリスティックを提供します。
use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("compile tag regex"));
static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("compile script regex")
});

/// 小文字化・前後空白除去・連続空白の畳み込みを行う。
#[must_use]
pub fn normalize_whitespace_lower(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// HTMLタグを除去し、基本的な実体参照をデコードしたプレーンテキストを返す。
#[must_use]
pub fn strip_html(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_scripts, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// HTMLを除去したプレーンテキストの先頭 `max_chars` 文字を返す。
#[must_use]
pub fn plain_text_prefix(html: &str, max_chars: usize) -> String {
    strip_html(html).chars().take(max_chars).collect()
}

/// CJK（漢字・かな・ハングル・全角記号）に属する文字かどうか。
#[must_use]
pub fn is_cjk_char(c: char) -> bool {
    matches!(c,
        '\u{3000}'..='\u{303F}'   // CJK symbols and punctuation
        | '\u{3040}'..='\u{30FF}' // Hiragana, Katakana
        | '\u{31F0}'..='\u{31FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}' // Hangul syllables
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FFEF}' // half/full-width forms
    )
}

/// テキストがラテン文字集合だけで表現されているかを判定する。
///
/// 意味的な言語判定ではなく文字種のヒューリスティック。ASCII、Latin-1 補助、
/// Latin Extended-A/B、一般句読点のみで構成されていれば `true`。
#[must_use]
pub fn is_latin_text(text: &str) -> bool {
    text.chars().all(|c| {
        c.is_ascii()
            || matches!(c,
                '\u{00A0}'..='\u{024F}'
                | '\u{1E00}'..='\u{1EFF}'
                | '\u{2000}'..='\u{206F}'
            )
    })
}

/// エラーメッセージを最大500文字に切り詰める。
#[must_use]
pub fn truncate_for_log(message: &str) -> String {
    const MAX_CHARS: usize = 500;
    if message.chars().count() <= MAX_CHARS {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(MAX_CHARS).collect();
    truncated.push_str("...");
    truncated
}
