use crate::error::{Result, ScanError};
use card_price_common::{RecognitionConfig, ReviewPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// OCRコマンドの既定値（`{input}` は切り出し画像のパスに置換）
pub const DEFAULT_OCR_COMMAND: &str = "tesseract {input} stdout -l jpn --psm 6";

const OCR_COMMAND_ENV: &str = "CARD_PRICE_OCR_COMMAND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ocr_command: String,
    pub ocr_timeout_seconds: u64,
    /// 同時に実行するOCRコマンド数
    pub ocr_concurrency: usize,
    /// テンプレート保存先（未設定なら設定ディレクトリ配下）
    pub templates_dir: Option<PathBuf>,
    pub recognition: RecognitionConfig,
    pub review: ReviewPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ScanError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("card-price-scan"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            ocr_command: DEFAULT_OCR_COMMAND.into(),
            ocr_timeout_seconds: 30,
            ocr_concurrency: 4,
            templates_dir: None,
            recognition: RecognitionConfig::default(),
            review: ReviewPolicy::default(),
        }
    }

    pub fn templates_dir(&self) -> Result<PathBuf> {
        match &self.templates_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("templates")),
        }
    }

    /// OCRコマンド（環境変数を優先）
    pub fn ocr_command(&self) -> String {
        std::env::var(OCR_COMMAND_ENV)
            .ok()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.ocr_command.clone())
    }

    pub fn set_ocr_command(&mut self, command: String) -> Result<()> {
        if !command.contains("{input}") {
            return Err(ScanError::Config(
                "OCRコマンドには {input} を含めてください".into(),
            ));
        }
        self.ocr_command = command;
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: u8) -> Result<()> {
        if threshold > 100 {
            return Err(ScanError::Config(format!("閾値は0〜100です: {}", threshold)));
        }
        self.recognition.matching.threshold = threshold;
        Ok(())
    }
}
