//! OCRアダプター
//!
//! - `CommandOcr`: 切り出し画像をPNGで一時保存し、外部コマンド（tesseract等）の標準出力を読む
//! - `FixtureOcr`: 記録済みのOCRテキスト（JSON）を返す。再現テスト・デモ用
//!
//! どちらも失敗したセルは空文字として扱い、パイプラインは止めない。

use crate::cache::{compute_crop_hash, CacheFile};
use crate::error::{Result, ScanError};
use card_price_common::{CropKey, CropRegion};
use image::DynamicImage;
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const INPUT_PLACEHOLDER: &str = "{input}";

/// 外部コマンドによるOCR
#[derive(Debug, Clone)]
pub struct CommandOcr {
    command: String,
    timeout: Duration,
    concurrency: usize,
}

impl CommandOcr {
    pub fn new(command: impl Into<String>, timeout_seconds: u64, concurrency: usize) -> Result<Self> {
        let command = command.into();
        if command.split_whitespace().next().is_none() {
            return Err(ScanError::Config("OCRコマンドが空です".into()));
        }
        if !command.contains(INPUT_PLACEHOLDER) {
            return Err(ScanError::Config(format!(
                "OCRコマンドには {} を含めてください: {}",
                INPUT_PLACEHOLDER, command
            )));
        }
        Ok(Self {
            command,
            timeout: Duration::from_secs(timeout_seconds.max(1)),
            concurrency: concurrency.max(1),
        })
    }
}

/// 記録済みOCRテキスト
///
/// キーは `"行,列"`（セル）または `"行,列,price"`（価格帯）。
#[derive(Debug, Clone, Default)]
pub struct FixtureOcr {
    texts: HashMap<CropKey, String>,
}

impl FixtureOcr {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScanError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(content)?;
        let mut texts = HashMap::new();
        for (key, text) in raw {
            let key: CropKey = key.parse().map_err(ScanError::InvalidFixture)?;
            texts.insert(key, text);
        }
        Ok(Self { texts })
    }

    pub fn text(&self, key: &CropKey) -> String {
        match self.texts.get(key) {
            Some(text) => text.clone(),
            None => {
                tracing::debug!(crop = %key, "no fixture text");
                String::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum OcrBackend {
    Command(CommandOcr),
    Fixture(FixtureOcr),
}

impl OcrBackend {
    pub fn uses_cache(&self) -> bool {
        matches!(self, OcrBackend::Command(_))
    }
}

/// 切り出し画像をPNGにする
pub fn encode_crop(image: &DynamicImage, region: &CropRegion) -> Result<Vec<u8>> {
    let cropped = image.crop_imm(region.x, region.y, region.width, region.height);
    let mut buf = Vec::new();
    cropped
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ScanError::ImageLoad(format!("PNG変換エラー: {}", e)))?;
    Ok(buf)
}

/// 価格表1枚ぶんのOCRを実行する
///
/// コマンド実行は `concurrency` 件まで並行。結果は `CropKey` で対応付けるので
/// 完了順には依存しない。キャッシュがあればヒットしたセルはコマンドを実行しない。
pub async fn run_ocr(
    backend: &OcrBackend,
    image: &DynamicImage,
    file_name: &str,
    jobs: &[(CropKey, CropRegion)],
    mut cache: Option<&mut CacheFile>,
    progress: &ProgressBar,
) -> Result<HashMap<CropKey, String>> {
    let ocr = match backend {
        OcrBackend::Fixture(fixture) => {
            progress.inc(jobs.len() as u64);
            return Ok(jobs.iter().map(|(key, _)| (*key, fixture.text(key))).collect());
        }
        OcrBackend::Command(ocr) => ocr,
    };

    let mut texts = HashMap::new();
    let semaphore = Arc::new(Semaphore::new(ocr.concurrency));
    let mut tasks = JoinSet::new();

    for (key, region) in jobs {
        let key = *key;
        let png = match encode_crop(image, region) {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(file = file_name, crop = %key, error = %e, "切り出し失敗、空テキストで続行");
                texts.insert(key, String::new());
                progress.inc(1);
                continue;
            }
        };

        let hash = compute_crop_hash(&png, &ocr.command);
        if let Some(text) = cache.as_deref().and_then(|c| c.get(&hash)) {
            tracing::debug!(file = file_name, crop = %key, "cache hit");
            texts.insert(key, text.to_string());
            progress.inc(1);
            continue;
        }

        let semaphore = Arc::clone(&semaphore);
        let command = ocr.command.clone();
        let timeout = ocr.timeout;
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let tag = format!("{}-{}", &hash[..16], key.to_string().replace(',', "-"));
            let result = run_command(&command, timeout, &png, &tag).await;
            (key, hash, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (key, hash, result) =
            joined.map_err(|e| ScanError::OcrCommand(format!("OCRタスク失敗: {}", e)))?;
        progress.inc(1);

        match result {
            Ok(text) => {
                if let Some(cache) = cache.as_deref_mut() {
                    cache.insert(hash, file_name.to_string(), key.to_string(), text.clone());
                }
                texts.insert(key, text);
            }
            Err(e) => {
                tracing::warn!(file = file_name, crop = %key, error = %e, "OCR失敗、空テキストで続行");
                texts.insert(key, String::new());
            }
        }
    }

    Ok(texts)
}

async fn run_command(command: &str, timeout: Duration, png: &[u8], tag: &str) -> Result<String> {
    let input = std::env::temp_dir().join(format!("card-price-ocr-{}-{}.png", std::process::id(), tag));
    tokio::fs::write(&input, png).await?;

    let result = execute(command, &input, timeout).await;

    // 一時ファイルの削除失敗は無視
    let _ = tokio::fs::remove_file(&input).await;
    result
}

async fn execute(command: &str, input: &Path, timeout: Duration) -> Result<String> {
    let input_path = input.display().to_string();
    let mut parts = command
        .split_whitespace()
        .map(|part| part.replace(INPUT_PLACEHOLDER, &input_path));
    let program = parts
        .next()
        .ok_or_else(|| ScanError::OcrCommand("OCRコマンドが空です".into()))?;
    let args: Vec<String> = parts.collect();

    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new(&program)
            .args(&args)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| ScanError::OcrCommand(format!("タイムアウト（{}秒）", timeout.as_secs())))?
    .map_err(|e| ScanError::OcrCommand(format!("{} を起動できません: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScanError::OcrCommand(format!(
            "{} が失敗しました（{}）: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_requires_placeholder() {
        assert!(CommandOcr::new("tesseract stdout", 30, 4).is_err());
        assert!(CommandOcr::new("   ", 30, 4).is_err());
        let ocr = CommandOcr::new("tesseract {input} stdout", 0, 0).unwrap();
        assert_eq!(ocr.timeout, Duration::from_secs(1));
        assert_eq!(ocr.concurrency, 1);
    }

    #[test]
    fn test_fixture_keys() {
        let fixture = FixtureOcr::from_json(
            r#"{"0,0": "ピカチュウ\nHP60", "0,0,price": "¥1,200", "1, 2": "ミュウ"}"#,
        )
        .unwrap();
        assert_eq!(fixture.len(), 3);
        assert_eq!(fixture.text(&CropKey::cell(0, 0)), "ピカチュウ\nHP60");
        assert_eq!(fixture.text(&CropKey::price_strip(0, 0)), "¥1,200");
        assert_eq!(fixture.text(&CropKey::cell(1, 2)), "ミュウ");
        assert_eq!(fixture.text(&CropKey::cell(5, 5)), "");
    }

    #[test]
    fn test_fixture_rejects_bad_key() {
        let result = FixtureOcr::from_json(r#"{"row0": "ピカチュウ"}"#);
        assert!(matches!(result, Err(ScanError::InvalidFixture(_))));
    }

    #[test]
    fn test_encode_crop_png() {
        let image = DynamicImage::new_rgb8(40, 20);
        let png = encode_crop(&image, &CropRegion::new(10, 5, 20, 10)).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    #[tokio::test]
    async fn test_fixture_run_ocr() {
        let fixture = FixtureOcr::from_json(r#"{"0,0": "ピカチュウ"}"#).unwrap();
        let backend = OcrBackend::Fixture(fixture);
        let image = DynamicImage::new_rgb8(10, 10);
        let jobs = vec![
            (CropKey::cell(0, 0), CropRegion::new(0, 0, 5, 5)),
            (CropKey::cell(0, 1), CropRegion::new(5, 0, 5, 5)),
        ];
        let texts = run_ocr(&backend, &image, "list.png", &jobs, None, &ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(texts[&CropKey::cell(0, 0)], "ピカチュウ");
        assert_eq!(texts[&CropKey::cell(0, 1)], "");
    }

    #[tokio::test]
    async fn test_missing_command_yields_empty_text() {
        let ocr = CommandOcr::new("card-price-no-such-ocr-binary {input}", 5, 2).unwrap();
        let backend = OcrBackend::Command(ocr);
        let image = DynamicImage::new_rgb8(10, 10);
        let jobs = vec![(CropKey::cell(0, 0), CropRegion::new(0, 0, 10, 10))];
        let mut cache = CacheFile::default();
        let texts = run_ocr(&backend, &image, "list.png", &jobs, Some(&mut cache), &ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(texts[&CropKey::cell(0, 0)], "");
        // 失敗はキャッシュしない
        assert!(cache.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_output_is_cached_and_reused() {
        let command = "echo ピカチュウ {input}";
        let backend = OcrBackend::Command(CommandOcr::new(command, 10, 2).unwrap());
        let image = DynamicImage::new_rgb8(10, 10);
        // サイズ違いでPNG（ハッシュ）を分ける
        let jobs = vec![
            (CropKey::cell(0, 0), CropRegion::new(0, 0, 5, 5)),
            (CropKey::cell(0, 1), CropRegion::new(0, 0, 10, 10)),
        ];

        let mut cache = CacheFile::default();
        let texts = run_ocr(&backend, &image, "list.png", &jobs, Some(&mut cache), &ProgressBar::hidden())
            .await
            .unwrap();
        for (key, _) in &jobs {
            assert!(texts[key].starts_with("ピカチュウ "), "{:?}", texts[key]);
        }
        assert_eq!(cache.len(), jobs.len());

        // キャッシュの内容を差し替えると、2回目はコマンドを実行せずその内容が返る
        for (key, region) in &jobs {
            let hash = compute_crop_hash(&encode_crop(&image, region).unwrap(), command);
            assert!(cache.get(&hash).is_some());
            cache.insert(hash, "list.png".into(), key.to_string(), format!("cached {}", key));
        }
        let texts = run_ocr(&backend, &image, "list.png", &jobs, Some(&mut cache), &ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(texts[&CropKey::cell(0, 0)], "cached 0,0");
        assert_eq!(texts[&CropKey::cell(0, 1)], "cached 0,1");
        assert_eq!(cache.len(), jobs.len());
    }
}
