//! 認識パイプライン（CLI版）
//!
//! 画像読み込み → セグメンテーション → OCR（並行） → 組み立て（画像単位でrayon並列）

use crate::cache::CacheFile;
use crate::error::Result;
use crate::ocr::{run_ocr, OcrBackend};
use crate::scanner::ImageInfo;
use card_price_common::{
    assemble, ocr_jobs, segment, CatalogCard, CatalogIndex, CropKey, CropSpec, RecognitionConfig,
    RecognitionResult, Template,
};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 価格表画像1枚の認識結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecognition {
    pub source: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub results: Vec<RecognitionResult>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// OCRキャッシュを使う（画像フォルダに保存）
    pub use_cache: bool,
    pub show_progress: bool,
}

/// OCRまで済んだ画像（組み立て待ち）
struct PendingImage<'a> {
    info: &'a ImageInfo,
    width: u32,
    height: u32,
    crops: Vec<CropSpec>,
    texts: HashMap<CropKey, String>,
}

pub async fn recognize_images(
    images: &[ImageInfo],
    template: &Template,
    catalog: &[CatalogCard],
    config: &RecognitionConfig,
    backend: &OcrBackend,
    options: PipelineOptions,
) -> Result<Vec<ImageRecognition>> {
    // カタログは1回だけ正規化
    let index = CatalogIndex::new(catalog);
    tracing::debug!(cards = index.len(), images = images.len(), "pipeline start");

    let mut caches: HashMap<PathBuf, CacheFile> = HashMap::new();
    let ocr_result = run_ocr_pass(images, template, config, backend, options, &mut caches).await;

    // 途中で失敗しても、そこまでのOCR結果はキャッシュに残す
    for (folder, cache) in &caches {
        if let Err(e) = cache.save(folder) {
            tracing::warn!(folder = %folder.display(), error = %e, "キャッシュ保存失敗");
        }
    }
    let pending = ocr_result?;

    let recognitions: Vec<ImageRecognition> = pending
        .par_iter()
        .map(|p| ImageRecognition {
            source: p.info.file_name.clone(),
            path: p.info.path.clone(),
            width: p.width,
            height: p.height,
            results: assemble(&p.crops, &p.texts, &index, config),
        })
        .collect();

    Ok(recognitions)
}

/// 画像ごとに 読み込み → 切り出し → OCR を行う
///
/// 読み込めない画像は警告を出して飛ばす。
async fn run_ocr_pass<'a>(
    images: &'a [ImageInfo],
    template: &Template,
    config: &RecognitionConfig,
    backend: &OcrBackend,
    options: PipelineOptions,
    caches: &mut HashMap<PathBuf, CacheFile>,
) -> Result<Vec<PendingImage<'a>>> {
    let mut pending = Vec::with_capacity(images.len());

    for (i, info) in images.iter().enumerate() {
        let image = match image::open(&info.path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(file = %info.path.display(), error = %e, "画像を読み込めないためスキップ");
                continue;
            }
        };
        let (width, height) = (image.width(), image.height());

        let crops = segment(template, width, height, &config.ratios);
        let jobs = ocr_jobs(&crops);

        let progress = progress_bar(&options, jobs.len() as u64, i + 1, images.len(), &info.file_name);

        let cache = if options.use_cache && backend.uses_cache() {
            let folder = cache_folder(&info.path);
            Some(
                caches
                    .entry(folder.clone())
                    .or_insert_with(|| CacheFile::load(&folder)),
            )
        } else {
            None
        };

        let texts = run_ocr(backend, &image, &info.file_name, &jobs, cache, &progress).await?;
        progress.finish_and_clear();

        pending.push(PendingImage {
            info,
            width,
            height,
            crops,
            texts,
        });
    }

    Ok(pending)
}

fn cache_folder(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn progress_bar(options: &PipelineOptions, len: u64, index: usize, total: usize, name: &str) -> ProgressBar {
    if !options.show_progress {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::with_template("  {msg} [{bar:30.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style.progress_chars("=> "));
    bar.set_message(format!("[{}/{}] {}", index, total, name));
    bar
}
