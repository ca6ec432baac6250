//! 対話式レビューモジュール
//!
//! 確認が必要な認識結果（類似度が低い・候補が拮抗している等）を1件ずつ表示し、
//! 候補選択・名前入力・スキップを受け付けて決定JSONを書き出す。

use crate::error::{Result, ScanError};
use crate::export::RecognitionReport;
use card_price_common::{review_status, RecognitionResult, ReviewPolicy, ReviewStatus};
use dialoguer::{Input, Select};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 決定の出どころ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// 確認不要（最上位候補を採用）
    Auto,
    /// 対話で決定
    Manual,
    Skipped,
}

/// カードセル1件の決定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedEntry {
    pub source: String,
    pub row: usize,
    pub col: usize,
    pub status: ReviewStatus,
    pub decision: DecisionSource,
    pub catalog_id: Option<i64>,
    pub name: Option<String>,
    pub price: Option<u64>,
}

impl ReviewedEntry {
    fn new(source: &str, result: &RecognitionResult, status: ReviewStatus) -> Self {
        Self {
            source: source.to_string(),
            row: result.row,
            col: result.col,
            status,
            decision: DecisionSource::Skipped,
            catalog_id: None,
            name: None,
            price: result.price,
        }
    }
}

/// 確認不要な結果はそのまま採用する
pub fn auto_decide(source: &str, result: &RecognitionResult, policy: &ReviewPolicy) -> Option<ReviewedEntry> {
    let status = review_status(result, policy);
    if status.needs_review() {
        return None;
    }
    let best = result.best_match()?;
    Some(ReviewedEntry {
        decision: DecisionSource::Auto,
        catalog_id: Some(best.catalog_id),
        name: Some(best.name.clone()),
        ..ReviewedEntry::new(source, result, status)
    })
}

/// 対話アクション
pub enum ReviewAction {
    /// 候補を採用（候補の番号）
    Pick(usize),
    /// 名前を手入力
    Manual(String),
    Skip,
    /// 残りをスキップして保存
    Quit,
}

/// 決定JSONの既定の出力先（`<入力>.review.json`）
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "price-list".into());
    input.with_file_name(format!("{}.review.json", stem))
}

/// 対話式でレビュー
pub fn run_interactive_review(
    input_path: &Path,
    output_path: Option<&Path>,
    policy: &ReviewPolicy,
) -> Result<Vec<ReviewedEntry>> {
    let report = RecognitionReport::load(input_path)?;

    let pending = report
        .images
        .iter()
        .flat_map(|image| image.results.iter().map(move |r| (image.source.as_str(), r)))
        .filter(|(source, r)| auto_decide(source, r, policy).is_none())
        .count();

    println!("🔍 確認が必要なカード: {}件 / {}件", pending, report.result_count());
    println!("---\n");

    let mut entries = Vec::new();
    let mut quit = false;
    let mut count = 0;

    for image in &report.images {
        for result in &image.results {
            if let Some(entry) = auto_decide(&image.source, result, policy) {
                entries.push(entry);
                continue;
            }

            let status = review_status(result, policy);
            let mut entry = ReviewedEntry::new(&image.source, result, status);
            if quit {
                entries.push(entry);
                continue;
            }

            count += 1;
            print_result(count, pending, &image.source, result, status);

            match prompt_review_action(result)? {
                ReviewAction::Pick(i) => {
                    if let Some(candidate) = result.candidates.get(i) {
                        entry.decision = DecisionSource::Manual;
                        entry.catalog_id = Some(candidate.catalog_id);
                        entry.name = Some(candidate.name.clone());
                        println!("  → {} (ID: {})\n", candidate.name, candidate.catalog_id);
                    }
                }
                ReviewAction::Manual(name) => {
                    entry.decision = DecisionSource::Manual;
                    println!("  → {} (手入力)\n", name);
                    entry.name = Some(name);
                }
                ReviewAction::Skip => println!("  → スキップ\n"),
                ReviewAction::Quit => {
                    println!("保存して終了します...");
                    quit = true;
                }
            }
            entries.push(entry);
        }
    }

    let default_output = default_output_path(input_path);
    let output = output_path.unwrap_or(&default_output);
    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(output, json)?;

    println!("\n✓ 保存しました: {}", output.display());

    Ok(entries)
}

/// セル位置の表示（`template set-cell` と同じ0始まり）
pub fn cell_label(row: usize, col: usize) -> String {
    format!("行{} 列{}", row, col)
}

fn print_result(count: usize, total: usize, source: &str, result: &RecognitionResult, status: ReviewStatus) {
    println!(
        "[{}/{}] {} {} [{}]",
        count,
        total,
        source,
        cell_label(result.row, result.col),
        status
    );
    println!(
        "  抽出名: {}",
        result.extracted_text.as_deref().unwrap_or("(なし)")
    );
    if let Some(price) = result.price {
        println!("  価格: ¥{}", price);
    }
    let first_line = result.full_text.lines().find(|l| !l.trim().is_empty());
    if let Some(line) = first_line {
        println!("  OCR: {}", line.trim());
    }
}

fn prompt_review_action(result: &RecognitionResult) -> Result<ReviewAction> {
    let mut items: Vec<String> = result
        .candidates
        .iter()
        .map(|c| format!("{} (ID: {}, {}%)", c.name, c.catalog_id, c.similarity))
        .collect();
    let candidate_count = items.len();
    items.push("名前を入力".into());
    items.push("スキップ".into());
    items.push("保存して終了".into());

    let selection = Select::new()
        .with_prompt("カードを選択")
        .items(&items)
        .default(0)
        .interact()
        .map_err(|e| ScanError::Interaction(e.to_string()))?;

    let action = match selection {
        i if i < candidate_count => ReviewAction::Pick(i),
        i if i == candidate_count => {
            let name: String = Input::new()
                .with_prompt("カード名")
                .allow_empty(true)
                .interact_text()
                .map_err(|e| ScanError::Interaction(e.to_string()))?;
            let trimmed = name.trim();
            if trimmed.is_empty() {
                ReviewAction::Skip
            } else {
                ReviewAction::Manual(trimmed.to_string())
            }
        }
        i if i == candidate_count + 1 => ReviewAction::Skip,
        _ => ReviewAction::Quit,
    };
    Ok(action)
}
