//! 認識オーケストレーター
//!
//! セグメンテーション → セルごとのOCR（外部） → カード名抽出 → カタログ照合 を組み合わせ、
//! カードセル1件につき1つの `RecognitionResult` を返す。状態は持たない。
//!
//! OCRを並行実行する呼び出し側のために、処理を2段に分けている:
//! - `ocr_jobs`: OCRが必要な切り出し一覧（`CropKey` 付き）
//! - `assemble`: `CropKey` → OCRテキスト の表から結果を組み立てる（完了順に依存しない）

use crate::extract::{extract_name, parse_price, ExtractionSettings};
use crate::matcher::{CatalogIndex, MatchOptions};
use crate::segment::{segment, SegmentRatios};
use crate::template::Template;
use crate::types::{CatalogCard, CellType, CropKey, CropRegion, CropSpec, RecognitionResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 1回の認識処理の設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecognitionConfig {
    pub ratios: SegmentRatios,
    pub extraction: ExtractionSettings,
    pub matching: MatchOptions,
}

/// OCRが必要な切り出し一覧
///
/// カードセル・価格セル・カードセルから切り分けた価格帯。
pub fn ocr_jobs(crops: &[CropSpec]) -> Vec<(CropKey, CropRegion)> {
    let mut jobs = Vec::new();
    for crop in crops {
        match crop.cell_type {
            CellType::Card | CellType::Price => {
                jobs.push((CropKey::cell(crop.row, crop.col), crop.region));
            }
            CellType::Exclude | CellType::Empty => continue,
        }
        if let Some(strip) = crop.price_region {
            jobs.push((CropKey::price_strip(crop.row, crop.col), strip));
        }
    }
    jobs
}

/// OCRテキストから認識結果を組み立てる
///
/// テキストの無いキーは空文字として扱う。結果は (row, col) 順。
pub fn assemble(
    crops: &[CropSpec],
    texts: &HashMap<CropKey, String>,
    catalog: &CatalogIndex,
    config: &RecognitionConfig,
) -> Vec<RecognitionResult> {
    let mut results: Vec<RecognitionResult> = crops
        .iter()
        .filter(|c| c.cell_type == CellType::Card)
        .map(|card| {
            let full_text = texts
                .get(&CropKey::cell(card.row, card.col))
                .cloned()
                .unwrap_or_default();

            let extracted_text = extract_name(&full_text, &config.extraction);
            let candidates = extracted_text
                .as_deref()
                .map(|name| catalog.lookup(name, &config.matching))
                .unwrap_or_default();

            let price = price_source(card, crops)
                .and_then(|key| texts.get(&key))
                .and_then(|text| parse_price(text));

            tracing::debug!(
                row = card.row,
                col = card.col,
                ?extracted_text,
                ?price,
                candidates = candidates.len(),
                "cell recognized"
            );

            RecognitionResult {
                row: card.row,
                col: card.col,
                crop_region: Some(card.region),
                price,
                extracted_text,
                full_text,
                candidates,
            }
        })
        .collect();

    results.sort_by_key(|r| (r.row, r.col));
    results
}

/// テンプレートと画像サイズから一括で認識する（OCRは逐次呼び出し）
///
/// `ocr` が失敗した場合は空文字を返すこと。空文字のセルは候補なしになる。
pub fn recognize<F>(
    template: &Template,
    image_width: u32,
    image_height: u32,
    mut ocr: F,
    catalog: &[CatalogCard],
    config: &RecognitionConfig,
) -> Vec<RecognitionResult>
where
    F: FnMut(CropKey, &CropRegion) -> String,
{
    let crops = segment(template, image_width, image_height, &config.ratios);
    let texts: HashMap<CropKey, String> = ocr_jobs(&crops)
        .into_iter()
        .map(|(key, region)| (key, ocr(key, &region)))
        .collect();

    let index = CatalogIndex::new(catalog);
    assemble(&crops, &texts, &index, config)
}

/// カードセルに対応する価格のOCRキー
///
/// 1. カードセルから切り分けた価格帯
/// 2. 同じ行で最も近い価格セル（同距離なら右側）
/// 3. 真下の行の同じ列の価格セル
fn price_source(card: &CropSpec, crops: &[CropSpec]) -> Option<CropKey> {
    if card.price_region.is_some() {
        return Some(CropKey::price_strip(card.row, card.col));
    }

    let prices = || crops.iter().filter(|c| c.cell_type == CellType::Price);

    prices()
        .filter(|c| c.row == card.row)
        .min_by_key(|c| (c.col.abs_diff(card.col), c.col < card.col))
        .or_else(|| prices().find(|c| c.row == card.row + 1 && c.col == card.col))
        .map(|c| CropKey::cell(c.row, c.col))
}
