//! Excel生成（CLI版）
//!
//! 共通ライブラリの excel_core でバッファを作り、ファイルに書き出す。

use super::RecognitionReport;
use crate::error::{Result, ScanError};
use card_price_common::export::excel_core::{generate_excel_buffer, SheetRow};
use card_price_common::ReviewPolicy;
use std::path::Path;

pub fn generate_excel(report: &RecognitionReport, output_path: &Path, policy: &ReviewPolicy) -> Result<()> {
    let rows: Vec<SheetRow<'_>> = report
        .images
        .iter()
        .flat_map(|image| {
            image.results.iter().map(move |result| SheetRow {
                source: image.source.as_str(),
                result,
            })
        })
        .collect();

    let buffer = generate_excel_buffer(&rows, policy)
        .map_err(|e| ScanError::ExcelGeneration(e.to_string()))?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, buffer)?;
    Ok(())
}
