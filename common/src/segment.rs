//! セグメンテーション
//!
//! テンプレートと画像サイズから、セルごとの切り出し矩形（ピクセル）を求める。
//!
//! ## 処理フロー
//! 1. 線の位置（%）× 画像サイズ → ピクセル座標
//! 2. 左右を `side_padding` だけ縮める
//! 3. 画像上部 `header_ratio`・下部 `footer_ratio` の帯を除外（帯の中のセルは破棄、跨ぐセルは切り詰め）
//! 4. 価格セルの無い行のカードセルは、下部 `price_row_ratio` を価格帯として切り分ける
//!
//! 空・除外セル、幅か高さが0以下になったセルは出力しない。

use crate::template::Template;
use crate::types::{CellType, CropRegion, CropSpec};
use serde::{Deserialize, Serialize};

/// 切り出し時のトリミング比率（すべて%）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentRatios {
    /// 画像上部の除外帯（画像高さに対する%）
    pub header_ratio: f64,
    /// 画像下部の除外帯（画像高さに対する%）
    pub footer_ratio: f64,
    /// カードセル下部の価格帯（セル高さに対する%）
    pub price_row_ratio: f64,
    /// セル左右の余白（画像幅に対する%）
    pub side_padding: f64,
}

/// テンプレートを画像サイズに当てはめて切り出し矩形を求める
///
/// 出力は行優先（row, col の昇順）。
pub fn segment(
    template: &Template,
    image_width: u32,
    image_height: u32,
    ratios: &SegmentRatios,
) -> Vec<CropSpec> {
    let width = image_width as f64;
    let height = image_height as f64;

    let header_end = height * percent(ratios.header_ratio);
    let footer_start = height - height * percent(ratios.footer_ratio);
    let padding = width * percent(ratios.side_padding);
    let strip_ratio = percent(ratios.price_row_ratio);

    let mut crops = Vec::new();

    for (row, cells) in template.cells().iter().enumerate() {
        let Some((top_pct, bottom_pct)) = template.row_span(row) else {
            continue;
        };
        let raw_top = height * top_pct / 100.0;
        let raw_bottom = height * bottom_pct / 100.0;

        // ヘッダー・フッター帯に完全に含まれる行は破棄
        if raw_bottom <= header_end || raw_top >= footer_start {
            tracing::debug!(row, "row inside header/footer band, skipped");
            continue;
        }
        let top = raw_top.max(header_end);
        let bottom = raw_bottom.min(footer_start);

        let row_has_price = cells.contains(&CellType::Price);

        for (col, &cell_type) in cells.iter().enumerate() {
            if matches!(cell_type, CellType::Empty | CellType::Exclude) {
                continue;
            }
            let Some((left_pct, right_pct)) = template.column_span(col) else {
                continue;
            };
            let left = width * left_pct / 100.0 + padding;
            let right = width * right_pct / 100.0 - padding;

            let carve = cell_type == CellType::Card && !row_has_price && strip_ratio > 0.0;
            let (cell_bottom, price_region) = if carve {
                let split = bottom - (bottom - top) * strip_ratio;
                (split, to_region(left, split, right, bottom, image_width, image_height))
            } else {
                (bottom, None)
            };

            match to_region(left, top, right, cell_bottom, image_width, image_height) {
                Some(region) => crops.push(CropSpec {
                    row,
                    col,
                    cell_type,
                    region,
                    price_region,
                }),
                None => {
                    tracing::debug!(row, col, "degenerate crop dropped");
                }
            }
        }
    }

    crops
}

fn percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0) / 100.0
    } else {
        0.0
    }
}

/// 浮動小数の矩形を画像内のピクセル矩形に変換（面積0以下は None）
fn to_region(
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
    image_width: u32,
    image_height: u32,
) -> Option<CropRegion> {
    let x0 = (left.round() as i64).clamp(0, image_width as i64);
    let x1 = (right.round() as i64).clamp(0, image_width as i64);
    let y0 = (top.round() as i64).clamp(0, image_height as i64);
    let y1 = (bottom.round() as i64).clamp(0, image_height as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(CropRegion::new(
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_price_template() -> Template {
        Template::from_parts(
            None,
            "カード|価格".into(),
            &[50.0],
            &[],
            vec![vec![CellType::Card, CellType::Price]],
        )
    }

    #[test]
    fn test_segment_two_cells_without_ratios() {
        let crops = segment(&card_price_template(), 200, 100, &SegmentRatios::default());
        assert_eq!(crops.len(), 2);

        assert_eq!(crops[0].cell_type, CellType::Card);
        assert_eq!(crops[0].region, CropRegion::new(0, 0, 100, 100));
        assert_eq!(crops[0].price_region, None);

        assert_eq!(crops[1].cell_type, CellType::Price);
        assert_eq!((crops[1].row, crops[1].col), (0, 1));
        assert_eq!(crops[1].region, CropRegion::new(100, 0, 100, 100));
    }

    #[test]
    fn test_segment_skips_empty_and_excluded() {
        let template = Template::from_parts(
            None,
            "混在".into(),
            &[25.0, 50.0, 75.0],
            &[],
            vec![vec![CellType::Empty, CellType::Exclude, CellType::Card, CellType::Empty]],
        );
        let crops = segment(&template, 400, 100, &SegmentRatios::default());
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].col, 2);
        assert_eq!(crops[0].region, CropRegion::new(200, 0, 100, 100));
    }

    #[test]
    fn test_segment_side_padding() {
        let ratios = SegmentRatios { side_padding: 5.0, ..Default::default() };
        let crops = segment(&card_price_template(), 200, 100, &ratios);
        // 200px × 5% = 10px ずつ左右を縮める
        assert_eq!(crops[0].region, CropRegion::new(10, 0, 80, 100));
        assert_eq!(crops[1].region, CropRegion::new(110, 0, 80, 100));
    }

    #[test]
    fn test_segment_header_and_footer_bands() {
        let mut template = Template::with_grid("4行", 1, 4);
        for row in 0..4 {
            template.set_row(row, CellType::Card).unwrap();
        }
        let ratios = SegmentRatios {
            header_ratio: 25.0,
            footer_ratio: 10.0,
            ..Default::default()
        };
        let crops = segment(&template, 100, 400, &ratios);

        // 行0（0〜100px）はヘッダー帯（0〜100px）に完全に含まれる
        let rows: Vec<usize> = crops.iter().map(|c| c.row).collect();
        assert_eq!(rows, vec![1, 2, 3]);
        // 行3（300〜400px）はフッター帯（360px〜）で切り詰め
        assert_eq!(crops[2].region, CropRegion::new(0, 300, 100, 60));
    }

    #[test]
    fn test_segment_carves_price_strip_when_row_has_no_price_cell() {
        let mut template = Template::with_grid("2列", 2, 1);
        template.set_row(0, CellType::Card).unwrap();
        let ratios = SegmentRatios { price_row_ratio: 20.0, ..Default::default() };
        let crops = segment(&template, 200, 100, &ratios);

        assert_eq!(crops[0].region, CropRegion::new(0, 0, 100, 80));
        assert_eq!(crops[0].price_region, Some(CropRegion::new(0, 80, 100, 20)));
        assert_eq!(crops[1].price_region, Some(CropRegion::new(100, 80, 100, 20)));
    }

    #[test]
    fn test_segment_no_strip_when_row_has_price_cell() {
        let ratios = SegmentRatios { price_row_ratio: 20.0, ..Default::default() };
        let crops = segment(&card_price_template(), 200, 100, &ratios);
        assert_eq!(crops[0].region, CropRegion::new(0, 0, 100, 100));
        assert_eq!(crops[0].price_region, None);
    }

    #[test]
    fn test_segment_drops_degenerate_cells() {
        let template = Template::from_parts(
            None,
            "細い列".into(),
            &[5.0],
            &[],
            vec![vec![CellType::Card, CellType::Card]],
        );
        // 左列は 10px 幅、左右 5px ずつで幅0になる
        let ratios = SegmentRatios { side_padding: 2.5, ..Default::default() };
        let crops = segment(&template, 200, 100, &ratios);
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].col, 1);
    }

    #[test]
    fn test_segment_zero_sized_image() {
        let crops = segment(&card_price_template(), 0, 0, &SegmentRatios::default());
        assert!(crops.is_empty());
    }
}
