//! テンプレート保存先（JSONファイル）
//!
//! 1テンプレート = 1ファイル（`<id>.json`）としてディレクトリに保存する。

use card_price_common::{Error, Result, Template, TemplateStore, TemplateSummary};
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    dir: PathBuf,
}

impl FileTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::InvalidInput(format!("テンプレートIDが不正です: {}", id)));
        }
        Ok(self.dir.join(format!("{}.{}", id, EXTENSION)))
    }

    /// 時刻ベースのIDを採番（衝突時は連番を付ける）
    fn generate_id(&self) -> String {
        let base = format!("tpl-{}", chrono::Local::now().format("%Y%m%d%H%M%S%3f"));
        let mut id = base.clone();
        let mut n = 1;
        while self.dir.join(format!("{}.{}", id, EXTENSION)).exists() {
            n += 1;
            id = format!("{}-{}", base, n);
        }
        id
    }
}

impl TemplateStore for FileTemplateStore {
    fn get_template(&self, id: &str) -> Result<Template> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("template {}", id)));
        }
        let content = std::fs::read_to_string(&path)?;
        let mut template: Template = serde_json::from_str(&content)?;
        template.id = Some(id.to_string());
        Ok(template)
    }

    fn save_template(&mut self, mut template: Template) -> Result<String> {
        std::fs::create_dir_all(&self.dir)?;

        let id = match template.id.clone() {
            Some(id) => id,
            None => self.generate_id(),
        };
        let path = self.path_for(&id)?;
        template.id = Some(id.clone());

        let json = serde_json::to_string_pretty(&template)?;
        std::fs::write(&path, json)?;
        tracing::debug!(id = %id, path = %path.display(), "template saved");
        Ok(id)
    }

    fn delete_template(&mut self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("template {}", id)));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    fn list_templates(&self) -> Result<Vec<TemplateSummary>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut list = Vec::new();
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == EXTENSION).unwrap_or(false) {
                let Some(id) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                    continue;
                };
                // 壊れたファイルは一覧から外す
                match self.get_template(&id) {
                    Ok(template) => list.push(TemplateSummary { id, name: template.name }),
                    Err(e) => tracing::warn!(id = %id, error = %e, "unreadable template skipped"),
                }
            }
        }

        // 名前でソート
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }
}
