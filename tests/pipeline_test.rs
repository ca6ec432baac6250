//! パイプライン統合テスト
//!
//! 記録済みOCR（フィクスチャ）で 画像 → 切り出し → 抽出 → 照合 → 出力 を通す

use card_price_common::{CatalogCard, CellType, RecognitionConfig, ReviewPolicy, ReviewStatus, Template, TemplateSummary};
use card_price_scan::cli::ExportFormat;
use card_price_scan::export::{export_report, RecognitionReport};
use card_price_scan::cache::CacheFile;
use card_price_scan::ocr::{CommandOcr, FixtureOcr, OcrBackend};
use card_price_scan::pipeline::{recognize_images, PipelineOptions};
use card_price_scan::review::{auto_decide, DecisionSource};
use card_price_scan::scanner::{self, ImageInfo};
use std::path::Path;
use tempfile::tempdir;

const FIXTURE: &str = r#"{
    "0,0": "ピカチュウ\nHP60",
    "0,1": "¥1,200",
    "1,1": "500円"
}"#;

/// 2列×2行（左: カード、右: 価格）
fn price_list_template() -> Template {
    let mut template = Template::with_grid("A店", 2, 2);
    template.set_column(0, CellType::Card).unwrap();
    template.set_column(1, CellType::Price).unwrap();
    template
}

fn catalog() -> Vec<CatalogCard> {
    vec![
        CatalogCard::new(1, "ピカチュウ"),
        CatalogCard::new(2, "ライチュウ"),
        CatalogCard::new(3, "リザードン"),
    ]
}

fn write_image(path: &Path) {
    image::RgbImage::new(200, 100).save(path).expect("画像保存失敗");
}

#[tokio::test]
async fn test_recognize_single_image_with_fixture() {
    let dir = tempdir().expect("Failed to create temp dir");
    let image_path = dir.path().join("list.png");
    write_image(&image_path);

    let images = scanner::scan_input(&image_path).unwrap();
    let backend = OcrBackend::Fixture(FixtureOcr::from_json(FIXTURE).unwrap());

    let recognized = recognize_images(
        &images,
        &price_list_template(),
        &catalog(),
        &RecognitionConfig::default(),
        &backend,
        PipelineOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(recognized.len(), 1);
    let image = &recognized[0];
    assert_eq!(image.source, "list.png");
    assert_eq!((image.width, image.height), (200, 100));
    assert_eq!(image.results.len(), 2);

    let first = &image.results[0];
    assert_eq!((first.row, first.col), (0, 0));
    assert_eq!(first.extracted_text.as_deref(), Some("ピカチュウ"));
    assert_eq!(first.price, Some(1200));
    assert_eq!(first.candidates.len(), 1);
    assert_eq!(first.candidates[0].catalog_id, 1);
    assert_eq!(first.candidates[0].similarity, 100);

    // OCRテキストが無いセル
    let second = &image.results[1];
    assert_eq!((second.row, second.col), (1, 0));
    assert_eq!(second.extracted_text, None);
    assert!(second.candidates.is_empty());
    assert_eq!(second.price, Some(500));
}

#[tokio::test]
async fn test_recognize_folder_keeps_file_order() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_image(&dir.path().join("b.png"));
    write_image(&dir.path().join("a.png"));

    let images = scanner::scan_input(dir.path()).unwrap();
    let backend = OcrBackend::Fixture(FixtureOcr::from_json(FIXTURE).unwrap());

    let recognized = recognize_images(
        &images,
        &price_list_template(),
        &catalog(),
        &RecognitionConfig::default(),
        &backend,
        PipelineOptions { use_cache: true, show_progress: false },
    )
    .await
    .unwrap();

    let sources: Vec<&str> = recognized.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, vec!["a.png", "b.png"]);
    assert_eq!(recognized[0].results, recognized[1].results);
    // フィクスチャではキャッシュを作らない
    assert!(!dir.path().join(".ocr-cache.json").exists());
}

#[tokio::test]
async fn test_unreadable_image_is_skipped() {
    let backend = OcrBackend::Fixture(FixtureOcr::from_json(FIXTURE).unwrap());
    let dir = tempdir().expect("Failed to create temp dir");
    write_image(&dir.path().join("a.png"));
    let images = vec![
        ImageInfo { path: dir.path().join("a.png"), file_name: "a.png".into() },
        ImageInfo { path: "/nonexistent/list.png".into(), file_name: "list.png".into() },
    ];

    let recognized = recognize_images(
        &images,
        &price_list_template(),
        &catalog(),
        &RecognitionConfig::default(),
        &backend,
        PipelineOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(recognized.len(), 1);
    assert_eq!(recognized[0].source, "a.png");
    assert_eq!(recognized[0].results.len(), 2);
}

/// 壊れた画像が混ざっていても、読めた画像のOCR結果はキャッシュに残る
#[cfg(unix)]
#[tokio::test]
async fn test_command_ocr_cache_survives_broken_image() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_image(&dir.path().join("a.png"));
    std::fs::write(dir.path().join("b.png"), b"not a png").unwrap();

    let images = scanner::scan_input(dir.path()).unwrap();
    assert_eq!(images.len(), 2);
    let backend = OcrBackend::Command(CommandOcr::new("echo ピカチュウ {input}", 10, 2).unwrap());

    let recognized = recognize_images(
        &images,
        &price_list_template(),
        &catalog(),
        &RecognitionConfig::default(),
        &backend,
        PipelineOptions { use_cache: true, show_progress: false },
    )
    .await
    .unwrap();

    assert_eq!(recognized.len(), 1);
    assert_eq!(recognized[0].source, "a.png");
    assert!(recognized[0].results[0].full_text.starts_with("ピカチュウ "));

    assert!(dir.path().join(".ocr-cache.json").exists());
    assert!(!CacheFile::load(dir.path()).is_empty());
}

#[tokio::test]
async fn test_export_and_review_decisions() {
    let dir = tempdir().expect("Failed to create temp dir");
    let image_path = dir.path().join("list.png");
    write_image(&image_path);

    let images = scanner::scan_input(&image_path).unwrap();
    let backend = OcrBackend::Fixture(FixtureOcr::from_json(FIXTURE).unwrap());
    let recognized = recognize_images(
        &images,
        &price_list_template(),
        &catalog(),
        &RecognitionConfig::default(),
        &backend,
        PipelineOptions::default(),
    )
    .await
    .unwrap();

    let summary = TemplateSummary { id: "tpl-1".into(), name: "A店".into() };
    let report = RecognitionReport::new(summary, recognized);
    let policy = ReviewPolicy::default();

    let out = dir.path().join("out");
    let written = export_report(&report, &ExportFormat::Both, &out, &policy).unwrap();
    assert_eq!(written, vec![out.join("price-list.json"), out.join("price-list.xlsx")]);

    let loaded = RecognitionReport::load(&written[0]).unwrap();
    assert_eq!(loaded, report);
    assert_eq!(loaded.result_count(), 2);

    let xlsx = std::fs::read(&written[1]).unwrap();
    assert_eq!(&xlsx[..2], b"PK");

    let image = &loaded.images[0];
    let confident = auto_decide(&image.source, &image.results[0], &policy).unwrap();
    assert_eq!(confident.decision, DecisionSource::Auto);
    assert_eq!(confident.catalog_id, Some(1));
    assert_eq!(confident.status, ReviewStatus::Confident);
    assert!(auto_decide(&image.source, &image.results[1], &policy).is_none());
}
