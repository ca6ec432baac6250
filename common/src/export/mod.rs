//! 出力の共通処理（CLIから利用）

#[cfg(feature = "excel")]
pub mod excel_core;
