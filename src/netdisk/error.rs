// 远程存储错误类型

use std::time::Duration;
use thiserror::Error;

/// 远程存储调用失败
///
/// 覆盖网络、鉴权、配额、不存在等所有来自存储客户端的错误
#[derive(Debug, Clone, Error)]
pub enum RemoteStoreError {
    /// API 返回了非 2xx 状态
    #[error("远程存储 API 错误 {status}: {message}")]
    Api { status: u16, message: String },

    /// 网络错误（连接失败、连接中断等）
    #[error("网络错误: {0}")]
    Network(String),

    /// 调用超过了截止时间
    #[error("远程调用超时: {operation} 超过 {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// 响应无法解析
    #[error("解析响应失败: {0}")]
    Decode(String),
}

impl RemoteStoreError {
    /// 错误携带的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RemoteStoreError::Api { status, .. } => *status,
            RemoteStoreError::Network(_) => 502,
            RemoteStoreError::Timeout { .. } => 504,
            RemoteStoreError::Decode(_) => 500,
        }
    }

    /// 是否为“不存在”错误
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteStoreError::Api { status: 404, .. })
    }
}

impl From<reqwest::Error> for RemoteStoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteStoreError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            RemoteStoreError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RemoteStoreError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        let api = RemoteStoreError::Api {
            status: 403,
            message: "quota".to_string(),
        };
        assert_eq!(api.status_code(), 403);
        assert_eq!(RemoteStoreError::Network("reset".into()).status_code(), 502);
        assert_eq!(
            RemoteStoreError::Timeout {
                operation: "create_file",
                timeout: Duration::from_secs(1),
            }
            .status_code(),
            504
        );
    }

    #[test]
    fn test_not_found() {
        let err = RemoteStoreError::Api {
            status: 404,
            message: "File not found".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!RemoteStoreError::Decode("x".into()).is_not_found());
    }
}
