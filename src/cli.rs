use card_price_common::{Axis, CellType, SegmentRatios};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "card-price")]
#[command(about = "トレカ買取価格表の画像認識・カード照合ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// テンプレート（罫線・セル種別）の管理
    Template {
        #[command(subcommand)]
        action: TemplateCommand,
    },

    /// 画像をテンプレートで切り出し、切り出し範囲を表示
    Segment {
        /// テンプレートID
        #[arg(required = true)]
        template: String,

        /// 価格表画像
        #[arg(required = true)]
        image: PathBuf,

        /// 切り出し画像の保存先フォルダ
        #[arg(long)]
        save_crops: Option<PathBuf>,

        #[command(flatten)]
        ratios: RatioArgs,
    },

    /// OCRテキストからカード名を抽出（判定理由を表示）
    Extract {
        /// OCRテキスト（省略時は --file または標準入力）
        text: Option<String>,

        /// OCRテキストファイル
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// カード名をカタログと照合
    Match {
        /// カード名
        #[arg(required = true)]
        name: String,

        /// カタログファイル（JSON/CSV/XLSX）
        #[arg(short, long)]
        catalog: PathBuf,

        /// 類似度の閾値（0〜100）
        #[arg(short, long)]
        threshold: Option<u8>,

        /// 最大候補数
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },

    /// 価格表画像を認識してカタログと照合
    Recognize {
        /// 価格表画像またはフォルダ
        #[arg(required = true)]
        input: PathBuf,

        /// テンプレートID
        #[arg(short, long)]
        template: String,

        /// カタログファイル（JSON/CSV/XLSX）
        #[arg(short, long)]
        catalog: PathBuf,

        /// 出力ファイル/ディレクトリ（デフォルト: 入力フォルダ）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 出力形式 (json/excel/both)
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// 記録済みOCRテキスト（JSON）を使う（外部コマンドを実行しない）
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// OCRコマンド（設定より優先）
        #[arg(long)]
        ocr_command: Option<String>,

        /// キャッシュを使用（OCR再実行をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// 類似度の閾値（0〜100）
        #[arg(long)]
        threshold: Option<u8>,

        #[command(flatten)]
        ratios: RatioArgs,
    },

    /// 認識結果を対話的に確認
    Review {
        /// 認識結果JSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 決定JSONの出力先（省略時は <入力>.review.json）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// OCRコマンドを設定（{input} が画像パスに置換される）
        #[arg(long)]
        set_ocr_command: Option<String>,

        /// 照合の閾値を設定
        #[arg(long)]
        set_threshold: Option<u8>,

        /// テンプレート保存先を設定
        #[arg(long)]
        set_templates_dir: Option<PathBuf>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// OCRキャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}

#[derive(Subcommand)]
pub enum TemplateCommand {
    /// テンプレートを作成（列数・行数で均等分割）
    New {
        #[arg(required = true)]
        name: String,

        #[arg(long, default_value = "1")]
        columns: usize,

        #[arg(long, default_value = "1")]
        rows: usize,
    },

    /// 一覧
    List,

    /// 罫線とセル種別を表示
    Show { id: String },

    Delete { id: String },

    /// 罫線を追加（最後の2本の中間）
    AddLine {
        id: String,
        /// 縦線(v) / 横線(h)
        axis: Axis,
    },

    /// 罫線を移動（位置は0〜100%）
    MoveLine {
        id: String,
        axis: Axis,
        index: usize,
        #[arg(allow_negative_numbers = true)]
        position: f64,
    },

    DeleteLine {
        id: String,
        axis: Axis,
        index: usize,
    },

    /// セル種別を設定 (card/price/exclude/empty)
    SetCell {
        id: String,
        row: usize,
        col: usize,
        cell_type: CellType,
    },

    /// 行全体のセル種別を設定
    SetRow {
        id: String,
        row: usize,
        cell_type: CellType,
    },

    /// 列全体のセル種別を設定
    SetColumn {
        id: String,
        col: usize,
        cell_type: CellType,
    },
}

/// 切り出し比率（省略時は設定値）
#[derive(clap::Args, Clone, Debug, Default)]
pub struct RatioArgs {
    /// 上部ヘッダーの除外帯（画像高さの%）
    #[arg(long)]
    pub header_ratio: Option<f64>,

    /// 下部フッターの除外帯（画像高さの%）
    #[arg(long)]
    pub footer_ratio: Option<f64>,

    /// カードセル下部を価格帯として切り分ける割合（セル高さの%）
    #[arg(long)]
    pub price_row_ratio: Option<f64>,

    /// セル左右の余白（画像幅の%）
    #[arg(long)]
    pub side_padding: Option<f64>,
}

impl RatioArgs {
    /// 指定された比率だけ上書きする
    pub fn apply(&self, ratios: &mut SegmentRatios) {
        if let Some(v) = self.header_ratio {
            ratios.header_ratio = v;
        }
        if let Some(v) = self.footer_ratio {
            ratios.footer_ratio = v;
        }
        if let Some(v) = self.price_row_ratio {
            ratios.price_row_ratio = v;
        }
        if let Some(v) = self.side_padding {
            ratios.side_padding = v;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum ExportFormat {
    #[default]
    Json,
    Excel,
    Both,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "both" => Ok(ExportFormat::Both),
            _ => Err(format!("Unknown format: {}. Use json, excel, or both", s)),
        }
    }
}
