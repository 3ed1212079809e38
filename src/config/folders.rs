// 逻辑文件夹映射
//
// 把调用点使用的逻辑键（如 "alert_images"、"payroll"、"intrastat_purchases"）
// 映射到远程存储中具体的根文件夹 id。
// 缺失的键在第一次使用时报配置错误，而不是启动时。

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 逻辑键 → 根文件夹 id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderMap(BTreeMap<String, String>);

impl FolderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加映射（链式）
    pub fn with(mut self, key: impl Into<String>, folder_id: impl Into<String>) -> Self {
        self.0.insert(key.into(), folder_id.into());
        self
    }

    /// 查找逻辑键对应的根文件夹 id
    pub fn root_for(&self, key: &str) -> Result<&str, ProvisionError> {
        match self.0.get(key) {
            Some(id) if !id.trim().is_empty() => Ok(id.as_str()),
            _ => Err(ProvisionError::Configuration(format!(
                "缺少文件夹映射: folders.{}",
                key
            ))),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn folder_ids(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
