pub mod excel;

use crate::cli::ExportFormat;
use crate::error::{Result, ScanError};
use crate::pipeline::ImageRecognition;
use card_price_common::{ReviewPolicy, TemplateSummary};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_STEM: &str = "price-list";

/// 認識結果ファイル（JSON）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionReport {
    /// 生成日時（RFC 3339）
    pub generated_at: String,
    pub template: TemplateSummary,
    pub images: Vec<ImageRecognition>,
}

impl RecognitionReport {
    pub fn new(template: TemplateSummary, images: Vec<ImageRecognition>) -> Self {
        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            template,
            images,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScanError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// カードセルの総数
    pub fn result_count(&self) -> usize {
        self.images.iter().map(|i| i.results.len()).sum()
    }
}

pub fn write_json(report: &RecognitionReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// 出力先を決める
///
/// ディレクトリ（または拡張子なし）なら `price-list.<ext>`、ファイルなら拡張子を差し替える。
fn output_path_for(output: &Path, extension: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", DEFAULT_STEM, extension))
    } else {
        output.with_extension(extension)
    }
}

/// 形式に応じて出力し、書き出したパスを返す
pub fn export_report(
    report: &RecognitionReport,
    format: &ExportFormat,
    output: &Path,
    policy: &ReviewPolicy,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if matches!(format, ExportFormat::Json | ExportFormat::Both) {
        let path = output_path_for(output, "json");
        println!("- JSONを出力中...");
        write_json(report, &path)?;
        println!("✔ JSON出力: {}", path.display());
        written.push(path);
    }

    if matches!(format, ExportFormat::Excel | ExportFormat::Both) {
        let path = output_path_for(output, "xlsx");
        println!("- Excelを生成中...");
        excel::generate_excel(report, &path, policy)?;
        println!("✔ Excel出力: {}", path.display());
        written.push(path);
    }

    Ok(written)
}
