//! OCR結果キャッシュモジュール
//!
//! 切り出し画像（PNG）とOCRコマンドのハッシュをキーにOCRテキストを保存し、
//! 同じ価格表の再認識でコマンド実行をスキップする。

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const CACHE_FILE_NAME: &str = ".ocr-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// ハッシュ → OCR結果のマップ
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 元画像のファイル名
    pub file_name: String,
    /// 切り出し位置（"行,列" / "行,列,price"）
    pub crop: String,
    pub text: String,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを読み込み（壊れていれば空で作り直す）
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, CacheFile>(reader) {
            Ok(cache) => {
                if cache.version != Self::CURRENT_VERSION {
                    tracing::warn!(
                        found = cache.version,
                        expected = Self::CURRENT_VERSION,
                        "キャッシュバージョン不一致、再生成します"
                    );
                    return Self::default();
                }
                cache
            }
            Err(e) => {
                tracing::warn!(error = %e, "キャッシュを読み込めません、再生成します");
                Self::default()
            }
        }
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::cache_path(folder))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在しなければ false）
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(cache_path)?;
        Ok(true)
    }

    pub fn get(&self, hash: &str) -> Option<&str> {
        self.entries.get(hash).map(|e| e.text.as_str())
    }

    pub fn insert(&mut self, hash: String, file_name: String, crop: String, text: String) {
        self.entries.insert(hash, CacheEntry { file_name, crop, text });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// 切り出し画像のハッシュ（SHA-256）
///
/// OCRコマンドもキーに含めるので、コマンドを変えると別エントリになる。
pub fn compute_crop_hash(png: &[u8], command: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(command.as_bytes());
    hasher.update([0u8]);
    hasher.update(png);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_depends_on_command() {
        let a = compute_crop_hash(b"png-bytes", "tesseract {input} stdout");
        let b = compute_crop_hash(b"png-bytes", "other-ocr {input}");
        assert_ne!(a, b);
        assert_eq!(a, compute_crop_hash(b"png-bytes", "tesseract {input} stdout"));
        assert_eq!(a.len(), 64);
    }
}
