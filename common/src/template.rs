//! 価格表テンプレートモジュール
//!
//! 価格表画像を縦線・横線（画像サイズに対する%）で区切り、
//! 各セルに種別（カード名・価格・除外・未設定）を割り当てる。
//!
//! ## 不変条件
//! - 各軸に境界線 0 と 100 が必ず存在し、移動・削除できない
//! - 内側の線は編集後に [1, 99] に収まる
//! - セルは常に (横線数-1) 行 × (縦線数-1) 列
//!
//! 線は内部で `(id, 位置)` として保持し、並べ替え後も同一性を追跡する。
//! 外部（JSON）には位置のリストのみを公開する。

use crate::types::CellType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 内側の線の可動範囲（%）
pub const MIN_INTERIOR_POSITION: f64 = 1.0;
pub const MAX_INTERIOR_POSITION: f64 = 99.0;

const POSITION_EPSILON: f64 = 1e-9;

/// 線の向き
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// 縦線（列を区切る）
    Vertical,
    /// 横線（行を区切る）
    Horizontal,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Vertical => write!(f, "縦線"),
            Axis::Horizontal => write!(f, "横線"),
        }
    }
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v" | "vertical" | "縦" | "縦線" => Ok(Axis::Vertical),
            "h" | "horizontal" | "横" | "横線" => Ok(Axis::Horizontal),
            _ => Err(format!("Unknown axis: {}. Use v(ertical) or h(orizontal)", s)),
        }
    }
}

/// テンプレート編集の拒否理由
///
/// 拒否された操作はテンプレートを一切変更しない。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("{axis}の境界線（index {index}）は移動・削除できません")]
    BoundaryLine { axis: Axis, index: usize },

    #[error("{axis} index {index} は範囲外です（線の数: {len}）")]
    LineIndexOutOfRange { axis: Axis, index: usize, len: usize },

    #[error("{axis}の位置 {position} には既に線があります")]
    PositionCollision { axis: Axis, position: f64 },

    #[error("位置が数値ではありません: {0}")]
    InvalidPosition(f64),

    #[error("セル ({row}, {col}) は範囲外です（{rows}行×{cols}列）")]
    CellOutOfRange { row: usize, col: usize, rows: usize, cols: usize },

    #[error("行 {row} は範囲外です（{rows}行）")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("列 {col} は範囲外です（{cols}列）")]
    ColumnOutOfRange { col: usize, cols: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GridLine {
    id: u32,
    position: f64,
}

/// 価格表テンプレート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TemplateDoc", into = "TemplateDoc")]
pub struct Template {
    pub id: Option<String>,
    pub name: String,
    vertical: Vec<GridLine>,
    horizontal: Vec<GridLine>,
    cells: Vec<Vec<CellType>>,
    next_line_id: u32,
}

/// JSON表現（位置のみ）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    vertical_lines: Vec<f64>,
    #[serde(default)]
    horizontal_lines: Vec<f64>,
    #[serde(default)]
    cells: Vec<Vec<CellType>>,
}

impl From<TemplateDoc> for Template {
    fn from(doc: TemplateDoc) -> Self {
        Template::from_parts(doc.id, doc.name, &doc.vertical_lines, &doc.horizontal_lines, doc.cells)
    }
}

impl From<Template> for TemplateDoc {
    fn from(template: Template) -> Self {
        TemplateDoc {
            vertical_lines: template.vertical_lines(),
            horizontal_lines: template.horizontal_lines(),
            id: template.id,
            name: template.name,
            cells: template.cells,
        }
    }
}

impl Template {
    /// 1セルだけの新規テンプレート
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_parts(None, name.into(), &[], &[], Vec::new())
    }

    /// 均等分割のテンプレート
    pub fn with_grid(name: impl Into<String>, columns: usize, rows: usize) -> Self {
        let even = |n: usize| -> Vec<f64> {
            let n = n.max(1);
            (1..n).map(|i| i as f64 * 100.0 / n as f64).collect()
        };
        Self::from_parts(None, name.into(), &even(columns), &even(rows), Vec::new())
    }

    /// 位置リストとセルから構築し、不変条件を満たすよう修復する
    ///
    /// - 0 と 100 は境界線として扱い、欠けていれば補う
    /// - 内側の線は [1, 99] に丸め、重複は先勝ちで除く
    /// - セルは位置を保ったまま行列数に合わせる
    pub fn from_parts(
        id: Option<String>,
        name: String,
        vertical_lines: &[f64],
        horizontal_lines: &[f64],
        cells: Vec<Vec<CellType>>,
    ) -> Self {
        let mut next_line_id = 0;
        let vertical = build_lines(vertical_lines, &mut next_line_id);
        let horizontal = build_lines(horizontal_lines, &mut next_line_id);

        let mut template = Self {
            id,
            name,
            vertical,
            horizontal,
            cells,
            next_line_id,
        };
        template.repair_grid();
        template
    }

    /// 縦線の位置（%、昇順）
    pub fn vertical_lines(&self) -> Vec<f64> {
        self.vertical.iter().map(|l| l.position).collect()
    }

    /// 横線の位置（%、昇順）
    pub fn horizontal_lines(&self) -> Vec<f64> {
        self.horizontal.iter().map(|l| l.position).collect()
    }

    pub fn lines(&self, axis: Axis) -> Vec<f64> {
        match axis {
            Axis::Vertical => self.vertical_lines(),
            Axis::Horizontal => self.horizontal_lines(),
        }
    }

    pub fn rows(&self) -> usize {
        self.horizontal.len() - 1
    }

    pub fn columns(&self) -> usize {
        self.vertical.len() - 1
    }

    pub fn cells(&self) -> &[Vec<CellType>] {
        &self.cells
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<CellType> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// 列の左右端（%）
    pub fn column_span(&self, col: usize) -> Option<(f64, f64)> {
        span(&self.vertical, col)
    }

    /// 行の上下端（%）
    pub fn row_span(&self, row: usize) -> Option<(f64, f64)> {
        span(&self.horizontal, row)
    }

    pub fn add_vertical_line(&mut self) -> Result<usize, TemplateError> {
        self.add_line(Axis::Vertical)
    }

    pub fn add_horizontal_line(&mut self) -> Result<usize, TemplateError> {
        self.add_line(Axis::Horizontal)
    }

    /// 末尾の2本の中間に線を追加し、追加後の index を返す
    pub fn add_line(&mut self, axis: Axis) -> Result<usize, TemplateError> {
        let lines = self.lines_ref(axis);
        let n = lines.len();
        let midpoint = (lines[n - 2].position + lines[n - 1].position) / 2.0;
        let position = clamp_interior(midpoint);

        if lines.iter().any(|l| same_position(l.position, position)) {
            return Err(TemplateError::PositionCollision { axis, position });
        }

        let id = self.allocate_line_id();
        let lines = self.lines_mut(axis);
        lines.push(GridLine { id, position });
        sort_lines(lines);
        let index = index_of(lines, id);

        self.repair_grid();
        tracing::debug!(%axis, index, position, "line added");
        Ok(index)
    }

    /// 線を移動し、並べ替え後の index を返す
    ///
    /// 位置は [1, 99] に丸める。他の線と同じ位置になる移動は拒否する。
    pub fn move_line(&mut self, axis: Axis, index: usize, new_position: f64) -> Result<usize, TemplateError> {
        self.check_interior(axis, index)?;
        if !new_position.is_finite() {
            return Err(TemplateError::InvalidPosition(new_position));
        }

        let position = clamp_interior(new_position);
        let lines = self.lines_ref(axis);
        let id = lines[index].id;
        if lines
            .iter()
            .any(|l| l.id != id && same_position(l.position, position))
        {
            return Err(TemplateError::PositionCollision { axis, position });
        }

        let lines = self.lines_mut(axis);
        lines[index].position = position;
        sort_lines(lines);
        let new_index = index_of(lines, id);

        self.repair_grid();
        tracing::debug!(%axis, from = index, to = new_index, position, "line moved");
        Ok(new_index)
    }

    /// 内側の線を削除する
    pub fn delete_line(&mut self, axis: Axis, index: usize) -> Result<(), TemplateError> {
        self.check_interior(axis, index)?;
        self.lines_mut(axis).remove(index);
        self.repair_grid();
        tracing::debug!(%axis, index, "line deleted");
        Ok(())
    }

    pub fn set_cell(&mut self, row: usize, col: usize, cell_type: CellType) -> Result<(), TemplateError> {
        let (rows, cols) = (self.rows(), self.columns());
        match self.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = cell_type;
                Ok(())
            }
            None => Err(TemplateError::CellOutOfRange { row, col, rows, cols }),
        }
    }

    pub fn set_row(&mut self, row: usize, cell_type: CellType) -> Result<(), TemplateError> {
        let rows = self.rows();
        let cells = self
            .cells
            .get_mut(row)
            .ok_or(TemplateError::RowOutOfRange { row, rows })?;
        cells.iter_mut().for_each(|c| *c = cell_type);
        Ok(())
    }

    pub fn set_column(&mut self, col: usize, cell_type: CellType) -> Result<(), TemplateError> {
        let cols = self.columns();
        if col >= cols {
            return Err(TemplateError::ColumnOutOfRange { col, cols });
        }
        for row in &mut self.cells {
            row[col] = cell_type;
        }
        Ok(())
    }

    fn check_interior(&self, axis: Axis, index: usize) -> Result<(), TemplateError> {
        let len = self.lines_ref(axis).len();
        if index >= len {
            return Err(TemplateError::LineIndexOutOfRange { axis, index, len });
        }
        if index == 0 || index == len - 1 {
            return Err(TemplateError::BoundaryLine { axis, index });
        }
        Ok(())
    }

    fn lines_ref(&self, axis: Axis) -> &Vec<GridLine> {
        match axis {
            Axis::Vertical => &self.vertical,
            Axis::Horizontal => &self.horizontal,
        }
    }

    fn lines_mut(&mut self, axis: Axis) -> &mut Vec<GridLine> {
        match axis {
            Axis::Vertical => &mut self.vertical,
            Axis::Horizontal => &mut self.horizontal,
        }
    }

    fn allocate_line_id(&mut self) -> u32 {
        let id = self.next_line_id;
        self.next_line_id += 1;
        id
    }

    /// 行列数に合わせてセルを作り直す（位置で保持、新規は Empty）
    fn repair_grid(&mut self) {
        let rows = self.rows();
        let cols = self.columns();
        self.cells.resize_with(rows, Vec::new);
        for row in &mut self.cells {
            row.resize(cols, CellType::Empty);
        }
    }
}

fn build_lines(positions: &[f64], next_id: &mut u32) -> Vec<GridLine> {
    let mut interior: Vec<f64> = Vec::new();
    for &p in positions {
        if !p.is_finite() || p <= 0.0 || p >= 100.0 {
            continue;
        }
        let p = clamp_interior(p);
        if !interior.iter().any(|&q| same_position(q, p)) {
            interior.push(p);
        }
    }
    interior.sort_by(f64::total_cmp);

    std::iter::once(0.0)
        .chain(interior)
        .chain(std::iter::once(100.0))
        .map(|position| {
            let id = *next_id;
            *next_id += 1;
            GridLine { id, position }
        })
        .collect()
}

fn span(lines: &[GridLine], index: usize) -> Option<(f64, f64)> {
    let start = lines.get(index)?;
    let end = lines.get(index + 1)?;
    Some((start.position, end.position))
}

fn clamp_interior(position: f64) -> f64 {
    position.clamp(MIN_INTERIOR_POSITION, MAX_INTERIOR_POSITION)
}

fn same_position(a: f64, b: f64) -> bool {
    (a - b).abs() < POSITION_EPSILON
}

fn sort_lines(lines: &mut [GridLine]) {
    // 安定ソートなので同位置は挿入順を保つ
    lines.sort_by(|a, b| a.position.total_cmp(&b.position));
}

fn index_of(lines: &[GridLine], id: u32) -> usize {
    lines.iter().position(|l| l.id == id).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_columns() -> Template {
        let mut t = Template::new("2列");
        t.add_vertical_line().unwrap();
        t
    }

    #[test]
    fn test_new_template_has_single_empty_cell() {
        let t = Template::new("テスト");
        assert_eq!(t.vertical_lines(), vec![0.0, 100.0]);
        assert_eq!(t.horizontal_lines(), vec![0.0, 100.0]);
        assert_eq!(t.cells(), &[vec![CellType::Empty]]);
    }

    #[test]
    fn test_add_line_inserts_before_trailing_boundary() {
        let mut t = Template::new("テスト");
        assert_eq!(t.add_vertical_line(), Ok(1));
        assert_eq!(t.vertical_lines(), vec![0.0, 50.0, 100.0]);
        assert_eq!(t.add_vertical_line(), Ok(2));
        assert_eq!(t.vertical_lines(), vec![0.0, 50.0, 75.0, 100.0]);
        assert_eq!(t.columns(), 3);
        assert_eq!(t.rows(), 1);
    }

    #[test]
    fn test_add_line_rejects_collision_at_edge() {
        let mut t = Template::from_parts(None, "端".into(), &[99.0], &[], Vec::new());
        let before = t.clone();
        assert!(matches!(
            t.add_vertical_line(),
            Err(TemplateError::PositionCollision { .. })
        ));
        assert_eq!(t, before);
    }

    #[test]
    fn test_grid_repair_preserves_painted_cells() {
        let mut t = two_columns();
        t.set_cell(0, 0, CellType::Card).unwrap();
        t.set_cell(0, 1, CellType::Price).unwrap();

        t.add_vertical_line().unwrap();
        assert_eq!(t.cell(0, 0), Some(CellType::Card));
        assert_eq!(t.cell(0, 1), Some(CellType::Price));
        assert_eq!(t.cell(0, 2), Some(CellType::Empty));

        t.add_horizontal_line().unwrap();
        assert_eq!(t.rows(), 2);
        assert_eq!(t.cells()[1], vec![CellType::Empty; 3]);
        assert_eq!(t.cell(0, 0), Some(CellType::Card));
    }

    #[test]
    fn test_move_line_clamps_and_reports_new_index() {
        let mut t = two_columns();
        t.add_vertical_line().unwrap(); // 0, 50, 75, 100
        assert_eq!(t.move_line(Axis::Vertical, 1, 90.0), Ok(2));
        assert_eq!(t.vertical_lines(), vec![0.0, 75.0, 90.0, 100.0]);

        assert_eq!(t.move_line(Axis::Vertical, 2, 150.0), Ok(2));
        assert_eq!(t.vertical_lines(), vec![0.0, 75.0, 99.0, 100.0]);

        assert_eq!(t.move_line(Axis::Vertical, 1, -5.0), Ok(1));
        assert_eq!(t.vertical_lines(), vec![0.0, 1.0, 99.0, 100.0]);
    }

    #[test]
    fn test_move_line_rejects_collision() {
        let mut t = two_columns();
        t.add_vertical_line().unwrap(); // 0, 50, 75, 100
        let before = t.clone();
        assert_eq!(
            t.move_line(Axis::Vertical, 1, 75.0),
            Err(TemplateError::PositionCollision { axis: Axis::Vertical, position: 75.0 })
        );
        assert_eq!(t, before);
        // 自分自身の位置への移動は許可
        assert_eq!(t.move_line(Axis::Vertical, 1, 50.0), Ok(1));
    }

    #[test]
    fn test_boundary_lines_are_immutable() {
        let mut t = two_columns();
        let before = t.clone();
        let last = t.vertical_lines().len() - 1;

        assert!(matches!(
            t.move_line(Axis::Vertical, 0, 30.0),
            Err(TemplateError::BoundaryLine { index: 0, .. })
        ));
        assert!(matches!(
            t.delete_line(Axis::Vertical, last),
            Err(TemplateError::BoundaryLine { .. })
        ));
        assert!(matches!(
            t.delete_line(Axis::Horizontal, 0),
            Err(TemplateError::BoundaryLine { .. })
        ));
        assert_eq!(t, before);
    }

    #[test]
    fn test_delete_line_shrinks_grid() {
        let mut t = two_columns();
        t.set_cell(0, 0, CellType::Card).unwrap();
        t.set_cell(0, 1, CellType::Price).unwrap();
        t.delete_line(Axis::Vertical, 1).unwrap();
        assert_eq!(t.vertical_lines(), vec![0.0, 100.0]);
        assert_eq!(t.cells(), &[vec![CellType::Card]]);
    }

    #[test]
    fn test_line_index_out_of_range() {
        let mut t = Template::new("テスト");
        assert_eq!(
            t.delete_line(Axis::Vertical, 5),
            Err(TemplateError::LineIndexOutOfRange { axis: Axis::Vertical, index: 5, len: 2 })
        );
    }

    #[test]
    fn test_set_row_and_column() {
        let mut t = Template::with_grid("3x2", 3, 2);
        t.set_row(1, CellType::Price).unwrap();
        t.set_column(0, CellType::Exclude).unwrap();
        assert_eq!(t.cells()[0], vec![CellType::Exclude, CellType::Empty, CellType::Empty]);
        assert_eq!(t.cells()[1], vec![CellType::Exclude, CellType::Price, CellType::Price]);

        assert!(matches!(t.set_row(2, CellType::Card), Err(TemplateError::RowOutOfRange { .. })));
        assert!(matches!(t.set_column(3, CellType::Card), Err(TemplateError::ColumnOutOfRange { .. })));
        assert!(matches!(t.set_cell(0, 3, CellType::Card), Err(TemplateError::CellOutOfRange { .. })));
    }

    #[test]
    fn test_with_grid_even_split() {
        let t = Template::with_grid("4x2", 4, 2);
        assert_eq!(t.vertical_lines(), vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(t.horizontal_lines(), vec![0.0, 50.0, 100.0]);
        assert_eq!(t.column_span(1), Some((25.0, 50.0)));
        assert_eq!(t.row_span(2), None);
    }

    #[test]
    fn test_deserialize_repairs_structure() {
        let json = r#"{
            "name": "壊れたテンプレート",
            "verticalLines": [50, 0.5, 100, 50, 120],
            "horizontalLines": [],
            "cells": [["card"], ["price", "price"]]
        }"#;
        let t: Template = serde_json::from_str(json).unwrap();
        assert_eq!(t.vertical_lines(), vec![0.0, 1.0, 50.0, 100.0]);
        assert_eq!(t.horizontal_lines(), vec![0.0, 100.0]);
        assert_eq!(t.cells(), &[vec![CellType::Card, CellType::Empty, CellType::Empty]]);
    }

    #[test]
    fn test_serialize_exposes_positions_only() {
        let mut t = two_columns();
        t.id = Some("tpl-1".into());
        t.set_cell(0, 0, CellType::Card).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"verticalLines\":[0.0,50.0,100.0]"));
        assert!(json.contains("\"cells\":[[\"card\",\"empty\"]]"));
        assert!(!json.contains("nextLineId"));

        let back: Template = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vertical_lines(), t.vertical_lines());
        assert_eq!(back.cells(), t.cells());
    }

    #[test]
    fn test_axis_from_str() {
        assert_eq!("v".parse::<Axis>(), Ok(Axis::Vertical));
        assert_eq!("横".parse::<Axis>(), Ok(Axis::Horizontal));
        assert!("z".parse::<Axis>().is_err());
    }
}
