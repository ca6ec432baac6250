use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("OCRコマンドエラー: {0}")]
    OcrCommand(String),

    #[error("OCRフィクスチャが不正: {0}")]
    InvalidFixture(String),

    #[error("カタログが不正: {0}")]
    InvalidCatalog(String),

    #[error("テンプレートが見つかりません: {0}")]
    TemplateNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("対話入力エラー: {0}")]
    Interaction(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("テンプレート編集エラー: {0}")]
    Template(#[from] card_price_common::TemplateError),

    #[error(transparent)]
    Common(#[from] card_price_common::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
