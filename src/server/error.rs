// API 错误处理
//
// 校验错误 → 400 + 字段列表
// 配置错误 → 500 + 缺失的键
// 远程存储错误 → 存储携带的状态码（或 500），只返回通用消息，细节写日志

use crate::error::{FieldError, ProvisionError};
use crate::server::handlers::ApiResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// 请求格式错误（multipart/JSON 无法解析）
    BadRequest(String),
    Provision(ProvisionError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
}

impl From<ProvisionError> for ApiError {
    fn from(e: ProvisionError) -> Self {
        ApiError::Provision(e)
    }
}

/// 错误详情
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Fields { fields: Vec<FieldError> },
    PartialTree { failed_at: String, created_folder_ids: Vec<String> },
}

/// HTTP 状态码；非错误码的上游状态统一视为 500
fn to_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::Provision(err) => {
                let status = to_status(err.status_code());
                match err {
                    ProvisionError::Validation(fields) => (
                        status,
                        "请求参数校验失败".to_string(),
                        Some(ErrorDetail::Fields { fields }),
                    ),
                    ProvisionError::Configuration(message) => {
                        error!("配置错误: {}", message);
                        (status, message, None)
                    }
                    ProvisionError::RemoteStore(e) => {
                        error!("远程存储请求失败: {}", e);
                        (status, "远程存储请求失败".to_string(), None)
                    }
                    ProvisionError::TreeBuild(e) => {
                        error!("{}", e);
                        (
                            status,
                            "创建文件夹树失败".to_string(),
                            Some(ErrorDetail::PartialTree {
                                failed_at: e.failed_at,
                                created_folder_ids: e.created.into_iter().map(|f| f.id).collect(),
                            }),
                        )
                    }
                }
            }
        };

        let body = ApiResponse {
            code: status.as_u16() as i32,
            message,
            data: detail,
        };
        (status, Json(body)).into_response()
    }
}
