// 错误类型
//
// - Validation    输入缺失/非法，在任何远程调用之前检测
// - Configuration 缺少必需的文件夹映射
// - RemoteStore   远程存储调用失败（批量上传中按条目隔离）
// - TreeBuild     文件夹树创建中途失败（携带已创建部分）

use crate::netdisk::RemoteStoreError;
use crate::provision::TreeBuildError;
use serde::Serialize;
use thiserror::Error;

/// 字段校验失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// 字段名（如 `files[2].mime_type`）
    pub field: String,
    /// 失败原因
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("参数校验失败: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error(transparent)]
    RemoteStore(#[from] RemoteStoreError),

    #[error(transparent)]
    TreeBuild(#[from] TreeBuildError),
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ProvisionError {
    /// 单个字段的校验错误
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ProvisionError::Validation(vec![FieldError::new(field, reason)])
    }

    /// 非空时返回校验错误
    pub fn check(fields: Vec<FieldError>) -> Result<(), ProvisionError> {
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ProvisionError::Validation(fields))
        }
    }

    /// 对外暴露的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ProvisionError::Validation(_) => 400,
            ProvisionError::Configuration(_) => 500,
            ProvisionError::RemoteStore(e) => e.status_code(),
            ProvisionError::TreeBuild(e) => e.source.status_code(),
        }
    }
}
