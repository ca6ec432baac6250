//! キャッシュ機能テスト
//!
//! OCR結果キャッシュの動作を検証

use card_price_scan::cache::{compute_crop_hash, CacheFile};
use tempfile::tempdir;

/// 空のキャッシュファイル
#[test]
fn test_cache_file_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let cache = CacheFile::load(dir.path());

    assert_eq!(cache.len(), 0);
    assert!(cache.is_empty());
}

/// キャッシュの保存と読み込み
#[test]
fn test_cache_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");

    let mut cache = CacheFile::load(dir.path());
    let hash = compute_crop_hash(b"crop", "tesseract {input} stdout");
    cache.insert(
        hash.clone(),
        "list.png".to_string(),
        "0,0".to_string(),
        "ピカチュウ\nHP60".to_string(),
    );
    cache.save(dir.path()).expect("キャッシュ保存失敗");

    let loaded = CacheFile::load(dir.path());
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.get(&hash), Some("ピカチュウ\nHP60"));
    assert!(loaded.get("nonexistent_hash").is_none());
}

/// キャッシュの上書き
#[test]
fn test_cache_overwrite() {
    let dir = tempdir().expect("Failed to create temp dir");

    let mut cache = CacheFile::load(dir.path());
    cache.insert("same".into(), "list.png".into(), "0,0".into(), "ピカチュ".into());
    cache.insert("same".into(), "list.png".into(), "0,0".into(), "ピカチュウ".into());

    assert_eq!(cache.get("same"), Some("ピカチュウ"));
    assert_eq!(cache.len(), 1);
}

/// キャッシュファイルが破損している場合
#[test]
fn test_cache_corrupted_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(CacheFile::cache_path(dir.path()), "{ invalid json }").unwrap();

    // 破損したキャッシュは空として扱われる
    let cache = CacheFile::load(dir.path());
    assert!(cache.is_empty());
}

/// バージョン違いのキャッシュは捨てる
#[test]
fn test_cache_version_mismatch() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(
        CacheFile::cache_path(dir.path()),
        r#"{"version": 99, "entries": {"h": {"file_name": "a.png", "crop": "0,0", "text": "x"}}}"#,
    )
    .unwrap();

    let cache = CacheFile::load(dir.path());
    assert!(cache.is_empty());
}

/// キャッシュの削除
#[test]
fn test_cache_clear() {
    let dir = tempdir().expect("Failed to create temp dir");

    assert!(!CacheFile::clear(dir.path()).unwrap());

    let mut cache = CacheFile::default();
    cache.insert("h".into(), "a.png".into(), "0,0".into(), "ミュウ".into());
    cache.save(dir.path()).unwrap();

    assert!(CacheFile::clear(dir.path()).unwrap());
    assert!(!CacheFile::cache_path(dir.path()).exists());
}
