//! 外部コラボレーターのインターフェース
//!
//! テンプレート保存先・カタログ取得元はパイプラインの外にあり、
//! ここでは呼び出し口だけを定義する。

use crate::error::{Error, Result};
use crate::template::Template;
use crate::types::{CatalogCard, TemplateSummary};
use std::collections::BTreeMap;

/// テンプレート保存先（CRUDのみ）
pub trait TemplateStore {
    fn get_template(&self, id: &str) -> Result<Template>;
    /// 保存してIDを返す（IDが無ければ採番する）
    fn save_template(&mut self, template: Template) -> Result<String>;
    fn delete_template(&mut self, id: &str) -> Result<()>;
    /// 名前順の一覧
    fn list_templates(&self) -> Result<Vec<TemplateSummary>>;
}

/// カタログ取得元（読み取り専用、照合1回につき1度だけ呼ぶ）
pub trait CatalogSource {
    fn list_cards(&self) -> Result<Vec<CatalogCard>>;
}

impl CatalogSource for Vec<CatalogCard> {
    fn list_cards(&self) -> Result<Vec<CatalogCard>> {
        Ok(self.clone())
    }
}

/// メモリ上のテンプレート保存先
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    templates: BTreeMap<String, Template>,
    next_id: u64,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn get_template(&self, id: &str) -> Result<Template> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("template {}", id)))
    }

    fn save_template(&mut self, mut template: Template) -> Result<String> {
        let id = match template.id.clone() {
            Some(id) => id,
            None => {
                self.next_id += 1;
                format!("mem-{}", self.next_id)
            }
        };
        template.id = Some(id.clone());
        self.templates.insert(id.clone(), template);
        Ok(id)
    }

    fn delete_template(&mut self, id: &str) -> Result<()> {
        self.templates
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("template {}", id)))
    }

    fn list_templates(&self) -> Result<Vec<TemplateSummary>> {
        let mut list: Vec<TemplateSummary> = self
            .templates
            .iter()
            .map(|(id, t)| TemplateSummary {
                id: id.clone(),
                name: t.name.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }
}
