//! 配置模块，负责从JSON映射文件加载实体名和字段名的转换

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// 映射文件加载错误
#[derive(Debug, thiserror::Error)]
#[error("config error: {message}")]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// 将查询中的名称转换为存储使用的名称
pub trait NameTranslator {
    fn entity_name(&self, entity: &str) -> String;

    fn field_name(&self, entity: &str, field: &str) -> String;
}

/// 保持所有名称不变
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl NameTranslator for IdentityTranslator {
    fn entity_name(&self, entity: &str) -> String {
        entity.to_string()
    }

    fn field_name(&self, _entity: &str, field: &str) -> String {
        field.to_string()
    }
}

/// 从JSON读取的名称映射：
///
/// ```json
/// {
///     "entities": { "God": "gods" },
///     "fields": { "God.name": "god_name", "age": "age_years" }
/// }
/// ```
///
/// 字段键为 `Entity.field`，或适用于所有实体的 `field`。
/// 没有映射的名称保持不变。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameMappingConfig {
    #[serde(default)]
    pub entities: HashMap<String, String>,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl NameMappingConfig {
    /// 从JSON文件加载名称映射配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::new(format!(
                "mapping file does not exist: {}",
                path_ref.display()
            )));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|e| {
            ConfigError::new(format!("cannot read mapping file {}: {}", path_ref.display(), e))
        })?;

        // 解析JSON
        Self::from_json_str(&content).map_err(|e| {
            ConfigError::new(format!("{} ({})", e.message, path_ref.display()))
        })
    }

    /// 从JSON字符串解析名称映射配置
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content)
            .map_err(|e| ConfigError::new(format!("cannot parse mapping JSON: {}", e)))
    }

    /// 实体映射与字段映射的总数
    pub fn len(&self) -> usize {
        self.entities.len() + self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NameTranslator for NameMappingConfig {
    fn entity_name(&self, entity: &str) -> String {
        self.entities.get(entity).cloned().unwrap_or_else(|| entity.to_string())
    }

    fn field_name(&self, entity: &str, field: &str) -> String {
        self.fields
            .get(&format!("{entity}.{field}"))
            .or_else(|| self.fields.get(field))
            .cloned()
            .unwrap_or_else(|| field.to_string())
    }
}
