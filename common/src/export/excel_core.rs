//! Excel生成（共通ライブラリ）
//!
//! 認識結果を1行1カードの一覧表にする。確認が必要な行は状態列を色付けする。

use crate::error::Result;
use crate::review::{review_status, ReviewPolicy, ReviewStatus};
use crate::types::RecognitionResult;
use rust_xlsxwriter::*;

/// 一覧表の1行（元画像名 + 認識結果）
pub struct SheetRow<'a> {
    pub source: &'a str,
    pub result: &'a RecognitionResult,
}

const HEADERS: &[(&str, u32)] = &[
    ("画像", 160),
    ("行", 40),
    ("列", 40),
    ("抽出名", 180),
    ("価格", 80),
    ("カードID", 80),
    ("カード名", 180),
    ("類似度", 60),
    ("状態", 80),
    ("他の候補", 260),
    ("OCR全文", 260),
];

/// Excelをバッファに生成
pub fn generate_excel_buffer(rows: &[SheetRow<'_>], policy: &ReviewPolicy) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_font_size(10.0)
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA));

    let value_format = Format::new()
        .set_font_size(10.0)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let wrap_format = value_format.clone().set_text_wrap();

    let review_format = value_format
        .clone()
        .set_bold()
        .set_background_color(Color::RGB(0xFFF2CC));

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("認識結果")?;

    for (col, (label, width)) in HEADERS.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width_pixels(col, *width)?;
        worksheet.write_string_with_format(0, col, *label, &header_format)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        let result = row.result;
        let status = review_status(result, policy);
        let best = result.best_match();

        worksheet.write_string_with_format(r, 0, row.source, &value_format)?;
        worksheet.write_number_with_format(r, 1, result.row as f64, &value_format)?;
        worksheet.write_number_with_format(r, 2, result.col as f64, &value_format)?;
        worksheet.write_string_with_format(
            r,
            3,
            result.extracted_text.as_deref().unwrap_or("-"),
            &value_format,
        )?;

        match result.price {
            Some(price) => worksheet.write_number_with_format(r, 4, price as f64, &value_format)?,
            None => worksheet.write_string_with_format(r, 4, "-", &value_format)?,
        };

        match best {
            Some(best) => {
                worksheet.write_number_with_format(r, 5, best.catalog_id as f64, &value_format)?;
                worksheet.write_string_with_format(r, 6, &best.name, &value_format)?;
                worksheet.write_number_with_format(r, 7, best.similarity as f64, &value_format)?;
            }
            None => {
                for col in 5..=7 {
                    worksheet.write_string_with_format(r, col, "-", &value_format)?;
                }
            }
        }

        let status_format = if status == ReviewStatus::Confident {
            &value_format
        } else {
            &review_format
        };
        worksheet.write_string_with_format(r, 8, status.to_string(), status_format)?;

        let others = result
            .candidates
            .iter()
            .skip(1)
            .map(|c| format!("{}({})", c.name, c.similarity))
            .collect::<Vec<_>>()
            .join(", ");
        worksheet.write_string_with_format(r, 9, others, &wrap_format)?;
        worksheet.write_string_with_format(r, 10, result.full_text.replace('\n', " / "), &wrap_format)?;
    }

    Ok(workbook.save_to_buffer()?)
}
