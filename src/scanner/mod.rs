use crate::error::{Result, ScanError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
}

impl ImageInfo {
    fn from_path(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            file_name,
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| is_image_extension(&ext.to_string_lossy()))
        .unwrap_or(false)
}

/// 価格表画像を集める
///
/// ファイルが渡されればその1枚、フォルダなら直下の画像をファイル名順で返す。
pub fn scan_input(input: &Path) -> Result<Vec<ImageInfo>> {
    if input.is_file() {
        if !is_image_path(input) {
            return Err(ScanError::ImageLoad(format!(
                "対応していない形式です: {}",
                input.display()
            )));
        }
        return Ok(vec![ImageInfo::from_path(input)]);
    }
    scan_folder(input)
}

pub fn scan_folder(folder: &Path) -> Result<Vec<ImageInfo>> {
    if !folder.exists() {
        return Err(ScanError::FolderNotFound(folder.display().to_string()));
    }

    let mut images = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && is_image_path(path) {
            images.push(ImageInfo::from_path(path));
        }
    }

    // ファイル名でソート
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;

    #[test]
    fn test_is_image_extension() {
        assert!(is_image_extension("jpg"));
        assert!(is_image_extension("JPG"));
        assert!(is_image_extension("jpeg"));
        assert!(is_image_extension("png"));
        assert!(!is_image_extension("txt"));
        assert!(!is_image_extension("pdf"));
        assert!(!is_image_extension("gif"));
    }

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"));
        assert!(matches!(result, Err(ScanError::FolderNotFound(_))));
    }

    #[test]
    fn test_scan_folder_with_images() {
        let temp_dir = tempfile::tempdir().unwrap();

        File::create(temp_dir.path().join("b_price.jpg")).unwrap().write_all(b"dummy").unwrap();
        File::create(temp_dir.path().join("a_price.PNG")).unwrap().write_all(b"dummy").unwrap();
        File::create(temp_dir.path().join("memo.txt")).unwrap().write_all(b"text").unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        File::create(temp_dir.path().join("sub").join("c.jpg")).unwrap();

        let result = scan_folder(temp_dir.path()).unwrap();
        let names: Vec<&str> = result.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a_price.PNG", "b_price.jpg"]);
    }

    #[test]
    fn test_scan_input_single_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image = temp_dir.path().join("list.jpeg");
        File::create(&image).unwrap();
        let text = temp_dir.path().join("list.txt");
        File::create(&text).unwrap();

        let result = scan_input(&image).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].file_name, "list.jpeg");
        assert!(scan_input(&text).is_err());
    }
}
