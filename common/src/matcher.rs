//! カタログ照合（あいまい一致）
//!
//! 抽出したカード名候補をカタログのカード名と照合し、
//! 類似度（0〜100）の高い順に候補を返す。
//!
//! ## 比較の流れ
//! 1. 正規化: 全角英数→半角、小文字化、空白除去、ハイフン・ダッシュ類を `-` に統一
//! 2. 表記ゆれ: ひらがな→カタカナ版、カタカナ→ひらがな版を作る
//! 3. (正規化, 正規化) (カタカナ, カタカナ) (ひらがな, ひらがな) の3組で類似度を出し、最大値を採用
//!
//! 類似度は完全一致100、包含は `短/長 × 90`（100にはならない）、
//! それ以外は編集距離ベース。

use crate::types::{CatalogCard, MatchCandidate};
use serde::{Deserialize, Serialize};

const CONTAINMENT_WEIGHT: f64 = 90.0;

/// 照合オプション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchOptions {
    /// 採用する類似度の下限（0〜100）
    pub threshold: u8,
    /// 返す候補数の上限
    pub max_results: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: 70,
            max_results: 5,
        }
    }
}

/// 比較用の正規化（冪等）
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(fold_width)
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace())
        .map(|c| if is_dash(c) { '-' } else { c })
        .collect()
}

/// 全角英数字を半角に
fn fold_width(c: char) -> char {
    match c {
        '０'..='９' | 'Ａ'..='Ｚ' | 'ａ'..='ｚ' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

fn is_dash(c: char) -> bool {
    matches!(
        c,
        '-' | '\u{2010}'
            | '\u{2011}'
            | '\u{2012}'
            | '\u{2013}'
            | '\u{2014}'
            | '\u{2015}'
            | '\u{2212}'
            | '\u{2500}'
            | '\u{2501}'
            | '\u{FF0D}'
            | '\u{FF70}'
            | 'ー'
    )
}

/// ひらがなをカタカナに
pub fn to_katakana(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{3041}'..='\u{3096}' | '\u{309D}' | '\u{309E}' => {
                char::from_u32(c as u32 + 0x60).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

/// カタカナをひらがなに
pub fn to_hiragana(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{30A1}'..='\u{30F6}' | '\u{30FD}' | '\u{30FE}' => {
                char::from_u32(c as u32 - 0x60).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

/// レーベンシュタイン距離を計算（コードポイント単位）
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b_len {
        matrix[0][j] = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}

/// 類似度（0〜100）
pub fn similarity(a: &str, b: &str) -> u8 {
    if a == b {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let (shorter, longer) = if a_len <= b_len { (a_len, b_len) } else { (b_len, a_len) };

    if a.contains(b) || b.contains(a) {
        return (shorter as f64 / longer as f64 * CONTAINMENT_WEIGHT).round() as u8;
    }

    let distance = levenshtein_distance(a, b);
    let score = (1.0 - distance as f64 / longer as f64) * 100.0;
    score.round().max(0.0) as u8
}

/// 正規化済みの3表記
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameVariants {
    pub normalized: String,
    pub katakana: String,
    pub hiragana: String,
}

impl NameVariants {
    pub fn new(name: &str) -> Self {
        let normalized = normalize(name);
        Self {
            katakana: to_katakana(&normalized),
            hiragana: to_hiragana(&normalized),
            normalized,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// 3組の類似度の最大値
    pub fn score(&self, other: &NameVariants) -> u8 {
        similarity(&self.normalized, &other.normalized)
            .max(similarity(&self.katakana, &other.katakana))
            .max(similarity(&self.hiragana, &other.hiragana))
    }
}

#[derive(Debug, Clone)]
struct IndexedCard {
    card: CatalogCard,
    variants: NameVariants,
}

/// 照合用に前処理したカタログ
///
/// 1回の認識処理の間はカタログをスナップショットとして扱い、
/// 全セルの照合でこの索引を使い回す。
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: Vec<IndexedCard>,
}

impl CatalogIndex {
    pub fn new(cards: &[CatalogCard]) -> Self {
        let entries = cards
            .iter()
            .map(|card| IndexedCard {
                variants: NameVariants::new(&card.name),
                card: card.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 候補名をカタログと照合する
    ///
    /// 類似度が閾値以上のものを降順で最大 `max_results` 件返す。同点はカタログ順。
    pub fn lookup(&self, candidate: &str, options: &MatchOptions) -> Vec<MatchCandidate> {
        let search = NameVariants::new(candidate);
        if search.is_empty() || options.max_results == 0 {
            return Vec::new();
        }

        let mut matches: Vec<MatchCandidate> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let score = search.score(&entry.variants);
                (score >= options.threshold).then(|| MatchCandidate {
                    catalog_id: entry.card.id,
                    name: entry.card.name.clone(),
                    similarity: score,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.cmp(&a.similarity));
        matches.truncate(options.max_results);

        tracing::debug!(
            candidate,
            hits = matches.len(),
            best = matches.first().map(|m| m.similarity),
            "catalog lookup"
        );
        matches
    }
}

/// 候補名をカタログと照合する
pub fn match_candidates(
    candidate: &str,
    catalog: &[CatalogCard],
    threshold: u8,
    max_results: usize,
) -> Vec<MatchCandidate> {
    CatalogIndex::new(catalog).lookup(candidate, &MatchOptions { threshold, max_results })
}
