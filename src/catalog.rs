//! カタログ読み込み
//!
//! JSON（`[{"id":..,"name":..}]`）、CSV（`id,name`）、XLSX（先頭シート）に対応。

use crate::error::{Result, ScanError};
use calamine::{open_workbook_auto, Data, Reader};
use card_price_common::{CatalogCard, CatalogSource};
use std::path::{Path, PathBuf};

const ID_HEADERS: &[&str] = &["id", "card_id", "番号", "カードid"];
const NAME_HEADERS: &[&str] = &["name", "card_name", "名前", "カード名"];

/// ファイルから読むカタログ
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for FileCatalog {
    fn list_cards(&self) -> card_price_common::Result<Vec<CatalogCard>> {
        load_catalog(&self.path).map_err(|e| match e {
            ScanError::FileNotFound(path) => card_price_common::Error::NotFound(path),
            other => card_price_common::Error::InvalidInput(other.to_string()),
        })
    }
}

/// 拡張子で形式を判定して読み込む
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogCard>> {
    if !path.exists() {
        return Err(ScanError::FileNotFound(path.display().to_string()));
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let cards = match ext.as_str() {
        "json" => {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str::<Vec<CatalogCard>>(&content)?
        }
        "csv" => {
            let content = std::fs::read_to_string(path)?;
            parse_catalog_csv(&content)?
        }
        "xlsx" | "xlsm" | "xls" | "ods" => load_catalog_workbook(path)?,
        _ => {
            return Err(ScanError::InvalidCatalog(format!(
                "対応していない形式です: {}",
                path.display()
            )))
        }
    };

    tracing::debug!(path = %path.display(), cards = cards.len(), "catalog loaded");
    Ok(cards)
}

/// CSVを解析（ヘッダー行があれば列名で id / name を探す）
pub fn parse_catalog_csv(content: &str) -> Result<Vec<CatalogCard>> {
    let rows: Vec<Vec<String>> = content
        .trim_start_matches('\u{feff}')
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_csv_line)
        .collect();

    cards_from_rows(rows)
}

fn load_catalog_workbook(path: &Path) -> Result<Vec<CatalogCard>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ScanError::InvalidCatalog(format!("Excel読み込みエラー: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ScanError::InvalidCatalog("シートがありません".into()))?
        .map_err(|e| ScanError::InvalidCatalog(format!("シート読み込みエラー: {}", e)))?;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .filter(|row: &Vec<String>| row.iter().any(|c| !c.trim().is_empty()))
        .collect();

    cards_from_rows(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Int(i) => i.to_string(),
        // 整数値のIDが小数で入っている場合
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cards_from_rows(rows: Vec<Vec<String>>) -> Result<Vec<CatalogCard>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let find = |names: &[&str]| {
        first
            .iter()
            .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
    };

    // ヘッダーが無ければ 1列目=id, 2列目=name
    let (id_col, name_col, skip) = match (find(ID_HEADERS), find(NAME_HEADERS)) {
        (Some(id), Some(name)) => (id, name, 1),
        _ => (0, 1, 0),
    };

    let mut cards = Vec::new();
    for (index, row) in rows.iter().enumerate().skip(skip) {
        let id_text = row.get(id_col).map(|s| s.trim()).unwrap_or_default();
        let name = row.get(name_col).map(|s| s.trim()).unwrap_or_default();

        let id = id_text.parse::<i64>().map_err(|_| {
            ScanError::InvalidCatalog(format!("{}行目: IDが数値ではありません: {}", index + 1, id_text))
        })?;
        if name.is_empty() {
            return Err(ScanError::InvalidCatalog(format!("{}行目: 名前が空です", index + 1)));
        }
        cards.push(CatalogCard::new(id, name));
    }

    Ok(cards)
}

/// CSV1行を分割（ダブルクォート、`""` エスケープ対応）
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields
}
