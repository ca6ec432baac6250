//! 目視確認の要否判定
//!
//! 認識結果ごとに、そのまま採用できるか・人の確認が必要かを分類する。

use crate::types::RecognitionResult;
use serde::{Deserialize, Serialize};

/// 確認判定の基準
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewPolicy {
    /// この類似度以上なら自動採用
    pub confident_similarity: u8,
    /// 1位と2位の差がこれ未満なら曖昧
    pub ambiguity_margin: u8,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            confident_similarity: 85,
            ambiguity_margin: 5,
        }
    }
}

/// 確認状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewStatus {
    /// 自動採用
    Confident,
    /// 上位候補が拮抗
    Ambiguous,
    /// 最上位でも類似度が低い
    LowConfidence,
    /// 閾値以上の候補なし（手入力）
    NoMatch,
    /// カード名を読み取れなかった
    NoText,
}

impl ReviewStatus {
    pub fn needs_review(&self) -> bool {
        !matches!(self, ReviewStatus::Confident)
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewStatus::Confident => write!(f, "自動採用"),
            ReviewStatus::Ambiguous => write!(f, "候補拮抗"),
            ReviewStatus::LowConfidence => write!(f, "低信頼"),
            ReviewStatus::NoMatch => write!(f, "要手入力"),
            ReviewStatus::NoText => write!(f, "読取不可"),
        }
    }
}

/// 認識結果の確認状態を判定する
pub fn review_status(result: &RecognitionResult, policy: &ReviewPolicy) -> ReviewStatus {
    if result.extracted_text.is_none() {
        return ReviewStatus::NoText;
    }
    let Some(best) = result.candidates.first() else {
        return ReviewStatus::NoMatch;
    };
    if best.similarity < policy.confident_similarity {
        return ReviewStatus::LowConfidence;
    }
    match result.candidates.get(1) {
        Some(second) if best.similarity.saturating_sub(second.similarity) < policy.ambiguity_margin => {
            ReviewStatus::Ambiguous
        }
        _ => ReviewStatus::Confident,
    }
}
