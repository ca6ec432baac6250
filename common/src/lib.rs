//! Card Price Common Library
//!
//! 価格表画像の認識パイプライン（コア）
//!
//! テンプレート → セグメンテーション →（外部OCR）→ カード名抽出 → カタログ照合
//!
//! すべて状態を持たない関数として提供し、編集中のテンプレートなどの
//! セッション状態は呼び出し側が持つ。

pub mod types;
pub mod error;
pub mod template;
pub mod segment;
pub mod extract;
pub mod matcher;
pub mod recognize;
pub mod review;
pub mod store;
pub mod export;

pub use types::{
    CatalogCard, CellType, CropKey, CropPart, CropRegion, CropSpec, MatchCandidate,
    RecognitionResult, TemplateSummary,
};
pub use error::{Error, Result};
pub use template::{Axis, Template, TemplateError};
pub use segment::{segment, SegmentRatios};
pub use extract::{explain_extraction, extract_name, parse_price, Extraction, ExtractionSettings};
pub use matcher::{match_candidates, normalize, similarity, CatalogIndex, MatchOptions};
pub use recognize::{assemble, ocr_jobs, recognize, RecognitionConfig};
pub use review::{review_status, ReviewPolicy, ReviewStatus};
pub use store::{CatalogSource, MemoryTemplateStore, TemplateStore};
