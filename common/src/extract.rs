//! カード名抽出ヒューリスティック
//!
//! カード名セルのOCRテキスト（複数行）から、カード名候補を1つ取り出す。
//!
//! ## 判定順（最初に採用された行で確定）
//! 1. 数字・空白のみの行（価格表記を含む）を除外
//! 2. `HP120` のようなHP表記の行を除外
//! 3. 正規化（空白・括弧・鑑定表記・前後の数字を除去）
//! 4. 完全一致の除外語（元の行・正規化後の両方で比較）
//! 5. 部分一致の除外語（正規化後で比較）
//! 6. 正規化後の文字数が `min_length` 以上なら採用
//!
//! どの行も採用されなければ、先頭行を軽く整形して返す（除外語は見ない）。

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

lazy_static! {
    static ref HP_LINE: Regex = Regex::new(r"(?i)^hp\s*[0-9０-９]+").unwrap();
    // 英字の途中（Grace10 など）は鑑定表記とみなさない。直前の1文字は $1 で戻す
    static ref GRADING_TOKEN: Regex =
        Regex::new(r"(?i)(^|[^a-z])(?:psa|bgs|cgc|ars|ace)[0-9０-９]+(?:\.[0-9０-９]+)?").unwrap();
    static ref BRACKETS: Regex =
        Regex::new(r#"[\[\]()（）{}｛｝「」『』【】〔〕〈〉《》<>＜＞"'“”‘’＂＇`]"#).unwrap();
    static ref TRAILING_DIGITS: Regex = Regex::new(r"[0-9０-９]+$").unwrap();
    static ref LEADING_DIGITS: Regex = Regex::new(r"^[0-9０-９]+").unwrap();
    static ref CURRENCY_PRICE: Regex =
        Regex::new(r"[¥￥]\s*([0-9][0-9,，]*)|([0-9][0-9,，]*)\s*円").unwrap();
    static ref ANY_NUMBER: Regex = Regex::new(r"[0-9][0-9,，]*").unwrap();
}

/// 抽出設定（呼び出しごとに不変）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionSettings {
    /// 先頭から調べる行数の上限（空行は数えない）
    pub max_lines: usize,
    /// 候補の最小文字数（正規化後）
    pub min_length: usize,
    /// 完全一致で除外する語
    pub exclude_exact: BTreeSet<String>,
    /// 部分一致で除外する語
    pub exclude_contains: BTreeSet<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_lines: 5,
            min_length: 2,
            exclude_exact: ["HP", "MINT", "PSA", "BGS", "美品"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_contains: ["進化", "鑑定", "ポケモン"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// 1行ごとの判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineVerdict {
    DigitsOnly,
    GradeNoise,
    ExcludedExact,
    ExcludedContains,
    TooShort,
    Accepted,
}

impl std::fmt::Display for LineVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineVerdict::DigitsOnly => write!(f, "数字のみ"),
            LineVerdict::GradeNoise => write!(f, "HP表記"),
            LineVerdict::ExcludedExact => write!(f, "除外語（完全一致）"),
            LineVerdict::ExcludedContains => write!(f, "除外語（部分一致）"),
            LineVerdict::TooShort => write!(f, "文字数不足"),
            LineVerdict::Accepted => write!(f, "採用"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDecision {
    pub line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    pub verdict: LineVerdict,
}

/// 抽出結果と判定過程
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub candidate: Option<String>,
    /// 全行が除外され先頭行で代替した
    pub used_fallback: bool,
    pub decisions: Vec<LineDecision>,
}

/// カード名候補を抽出する（空テキストなら None）
pub fn extract_name(raw_text: &str, settings: &ExtractionSettings) -> Option<String> {
    explain_extraction(raw_text, settings).candidate
}

/// 判定過程つきでカード名候補を抽出する
pub fn explain_extraction(raw_text: &str, settings: &ExtractionSettings) -> Extraction {
    let lines: Vec<&str> = raw_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some(first_line) = lines.first() else {
        return Extraction::default();
    };

    let mut decisions = Vec::new();

    for &line in lines.iter().take(settings.max_lines.max(1)) {
        let (normalized, verdict) = judge_line(line, settings);
        tracing::debug!(line, ?normalized, %verdict, "extraction line");
        decisions.push(LineDecision {
            line: line.to_string(),
            normalized: normalized.clone(),
            verdict,
        });

        if verdict == LineVerdict::Accepted {
            return Extraction {
                candidate: normalized,
                used_fallback: false,
                decisions,
            };
        }
    }

    Extraction {
        candidate: Some(fallback_candidate(first_line)),
        used_fallback: true,
        decisions,
    }
}

fn judge_line(line: &str, settings: &ExtractionSettings) -> (Option<String>, LineVerdict) {
    if is_numeric_noise(line) {
        return (None, LineVerdict::DigitsOnly);
    }
    if HP_LINE.is_match(line) {
        return (None, LineVerdict::GradeNoise);
    }

    let normalized = normalize_line(line);

    let verdict = if settings.exclude_exact.contains(line) || settings.exclude_exact.contains(&normalized) {
        LineVerdict::ExcludedExact
    } else if settings
        .exclude_contains
        .iter()
        .any(|w| !w.is_empty() && normalized.contains(w.as_str()))
    {
        LineVerdict::ExcludedContains
    } else if normalized.chars().count() < settings.min_length.max(1) {
        LineVerdict::TooShort
    } else {
        LineVerdict::Accepted
    };

    (Some(normalized), verdict)
}

/// 数字・空白と価格記号だけの行
fn is_numeric_noise(line: &str) -> bool {
    line.chars().any(is_digit)
        && line
            .chars()
            .all(|c| is_digit(c) || c.is_whitespace() || matches!(c, ',' | '，' | '.' | '¥' | '￥' | '円' | '$'))
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

fn remove_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// 候補用の正規化
pub fn normalize_line(line: &str) -> String {
    let text = remove_whitespace(line);
    let text = BRACKETS.replace_all(&text, "");
    let text = GRADING_TOKEN.replace_all(&text, "$1");
    let text = TRAILING_DIGITS.replace(&text, "");
    let text = LEADING_DIGITS.replace(&text, "");
    text.into_owned()
}

fn fallback_candidate(line: &str) -> String {
    let compact = remove_whitespace(line);
    let text = GRADING_TOKEN.replace_all(&compact, "$1");
    let text = TRAILING_DIGITS.replace(&text, "");
    if text.is_empty() {
        compact
    } else {
        text.into_owned()
    }
}

/// 価格セルのOCRテキストから金額を読み取る
///
/// 「¥」「円」が付いた数値を優先し、無ければ最初の数値を使う。
/// 桁区切りのカンマは無視する。
pub fn parse_price(text: &str) -> Option<u64> {
    let folded: String = text
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect();

    let digits = CURRENCY_PRICE
        .captures(&folded)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .or_else(|| ANY_NUMBER.find(&folded))?
        .as_str()
        .replace([',', '，'], "");

    digits.parse().ok()
}
