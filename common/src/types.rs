//! 認識パイプラインの共有型
//!
//! CLIとコアで共有される型:
//! - CellType: テンプレートのセル種別
//! - CropRegion / CropSpec: セグメンテーションの出力
//! - CatalogCard / MatchCandidate: カタログ照合の入出力
//! - RecognitionResult: 最終出力（1カードセルにつき1件）

use serde::{Deserialize, Serialize};

/// セル種別
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    /// カード名
    Card,
    /// 価格
    Price,
    /// 除外（切り出さない）
    Exclude,
    /// 未設定
    #[default]
    Empty,
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellType::Card => write!(f, "card"),
            CellType::Price => write!(f, "price"),
            CellType::Exclude => write!(f, "exclude"),
            CellType::Empty => write!(f, "empty"),
        }
    }
}

impl std::str::FromStr for CellType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "card" | "c" | "カード" => Ok(CellType::Card),
            "price" | "p" | "価格" => Ok(CellType::Price),
            "exclude" | "x" | "除外" => Ok(CellType::Exclude),
            "empty" | "e" | "-" => Ok(CellType::Empty),
            _ => Err(format!("Unknown cell type: {}. Use card, price, exclude, or empty", s)),
        }
    }
}

/// 画像上の矩形（ピクセル）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// 1セル分の切り出し指示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropSpec {
    pub row: usize,
    pub col: usize,
    pub cell_type: CellType,
    pub region: CropRegion,
    /// カードセル下部から切り出した価格帯（同じ行に価格セルが無い場合のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_region: Option<CropRegion>,
}

/// OCR対象の部位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CropPart {
    /// セル全体（カードセルでは価格帯を除いた上部）
    Cell,
    /// カードセルから切り出した価格帯
    PriceStrip,
}

/// OCRテキストの対応付けキー
///
/// OCRの完了順ではなく、このキーで結果を突き合わせる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CropKey {
    pub row: usize,
    pub col: usize,
    pub part: CropPart,
}

impl CropKey {
    pub fn cell(row: usize, col: usize) -> Self {
        Self { row, col, part: CropPart::Cell }
    }

    pub fn price_strip(row: usize, col: usize) -> Self {
        Self { row, col, part: CropPart::PriceStrip }
    }
}

impl std::fmt::Display for CropKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.part {
            CropPart::Cell => write!(f, "{},{}", self.row, self.col),
            CropPart::PriceStrip => write!(f, "{},{},price", self.row, self.col),
        }
    }
}

impl std::str::FromStr for CropKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let parse = |v: &str| v.parse::<usize>().map_err(|_| format!("Invalid crop key: {}", s));
        match parts.as_slice() {
            [row, col] => Ok(CropKey::cell(parse(row)?, parse(col)?)),
            [row, col, "price"] => Ok(CropKey::price_strip(parse(row)?, parse(col)?)),
            _ => Err(format!("Invalid crop key: {}. Use \"row,col\" or \"row,col,price\"", s)),
        }
    }
}

/// カタログの1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCard {
    pub id: i64,
    pub name: String,
}

impl CatalogCard {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// 照合候補
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub catalog_id: i64,
    pub name: String,
    /// 類似度（0〜100）
    pub similarity: u8,
}

/// 認識結果（カードセル1件）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub row: usize,
    pub col: usize,
    pub crop_region: Option<CropRegion>,
    pub price: Option<u64>,
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub candidates: Vec<MatchCandidate>,
}

impl RecognitionResult {
    /// 最上位の候補
    pub fn best_match(&self) -> Option<&MatchCandidate> {
        self.candidates.first()
    }
}

/// テンプレート一覧の1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
}
