// 上传条目定义
//
// 状态流转：Pending → Uploading → {Succeeded, Failed}
// Succeeded 之后可以（尽力而为地）进入 PermissionsGranted，不影响批量结果分类

use crate::config::UploadConfig;
use crate::error::FieldError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 上传条目状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadItemStatus {
    /// 等待中
    Pending,
    /// 上传中
    Uploading,
    /// 上传成功
    Succeeded,
    /// 上传失败
    Failed,
    /// 上传成功且已公开
    PermissionsGranted,
}

impl UploadItemStatus {
    /// 状态流转是否合法
    pub fn can_transition_to(self, next: UploadItemStatus) -> bool {
        use UploadItemStatus::*;
        matches!(
            (self, next),
            (Pending, Uploading)
                | (Uploading, Succeeded)
                | (Uploading, Failed)
                | (Succeeded, PermissionsGranted)
        )
    }
}

/// 批量上传执行方式
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// 全部同时发起，等待全部结束
    #[default]
    Concurrent,
    /// 逐个上传，上一个结束后才开始下一个（用于存储端按秒限流的场景）
    Sequential,
}

impl FromStr for UploadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(UploadMode::Concurrent),
            "sequential" => Ok(UploadMode::Sequential),
            other => Err(format!("未知的上传模式: {}", other)),
        }
    }
}

/// 单个上传条目（仅在一次批量调用期间存在）
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// 原始文件名（同时作为远程文件名）
    pub original_name: String,
    /// MIME 类型
    pub mime_type: String,
    /// 文件内容
    pub payload: Vec<u8>,
}

impl UploadItem {
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            payload,
        }
    }

    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// 按上传配置校验，`field` 为该条目在请求中的字段路径（如 `files[0]`）
    pub fn validate(&self, field: &str, config: &UploadConfig) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.original_name.trim().is_empty() {
            errors.push(FieldError::new(format!("{}.name", field), "文件名不能为空"));
        }

        if self.payload.is_empty() {
            errors.push(FieldError::new(field, "未附加文件或文件为空"));
        } else if self.size() > config.max_file_size {
            errors.push(FieldError::new(
                field,
                format!(
                    "文件大小 {} 超过上限 {}",
                    self.size(),
                    config.max_file_size
                ),
            ));
        }

        if !config.accepts_mime_type(&self.mime_type) {
            errors.push(FieldError::new(
                format!("{}.mime_type", field),
                format!("不支持的文件类型: {}", self.mime_type),
            ));
        }

        errors
    }
}
