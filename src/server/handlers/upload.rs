// 上传API处理器
//
// 只负责解析 multipart 和映射状态码，校验与上传在 ProvisionService 中完成

use crate::error::{FieldError, ProvisionError};
use crate::provision::{PayrollRequest, SingleUpload, UploadTarget};
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;
use crate::uploader::{BatchOutcome, BatchResult, UploadItem, UploadMode};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use std::collections::HashMap;
use tracing::{error, info};

use super::ApiResponse;

/// 未声明类型的文件
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// 解析后的 multipart 表单：文件字段 + 文本字段
#[derive(Debug, Default)]
struct UploadForm {
    files: Vec<UploadItem>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn parse(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            error!("读取 multipart 字段失败: {}", e);
            ApiError::bad_request("无效的 multipart 数据")
        })? {
            let name = field.name().unwrap_or("").to_string();

            if let Some(file_name) = field.file_name().map(|s| s.to_string()) {
                let mime_type = field
                    .content_type()
                    .unwrap_or(FALLBACK_MIME_TYPE)
                    .to_string();
                let payload = field.bytes().await.map_err(|e| {
                    error!("读取文件内容失败: name={}, 错误: {}", file_name, e);
                    ApiError::bad_request("读取文件内容失败")
                })?;
                form.files
                    .push(UploadItem::new(file_name, mime_type, payload.to_vec()));
            } else {
                let value = field.text().await.map_err(|e| {
                    error!("读取表单字段失败: name={}, 错误: {}", name, e);
                    ApiError::bad_request(format!("无效的表单字段: {}", name))
                })?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// `target` 字段（JSON）
    fn target(&self) -> Result<UploadTarget, ProvisionError> {
        let raw = self
            .text("target")
            .ok_or_else(|| ProvisionError::invalid("target", "缺少上传目标"))?;
        serde_json::from_str(raw)
            .map_err(|e| ProvisionError::invalid("target", format!("无法解析: {}", e)))
    }

    fn flag(&self, name: &str) -> Result<bool, ProvisionError> {
        match self.text(name) {
            None => Ok(false),
            Some(v) => v
                .parse::<bool>()
                .map_err(|_| ProvisionError::invalid(name, "必须是 true 或 false")),
        }
    }

    fn mode(&self) -> Result<Option<UploadMode>, ProvisionError> {
        self.text("mode")
            .map(|v| v.parse::<UploadMode>())
            .transpose()
            .map_err(|e| ProvisionError::invalid("mode", e))
    }

    fn number<T: std::str::FromStr>(&self, name: &str, errors: &mut Vec<FieldError>) -> Option<T> {
        match self.text(name) {
            None => {
                errors.push(FieldError::new(name, "缺少必填字段"));
                None
            }
            Some(v) => match v.parse::<T>() {
                Ok(n) => Some(n),
                Err(_) => {
                    errors.push(FieldError::new(name, format!("无效的数字: {}", v)));
                    None
                }
            },
        }
    }
}

/// 批量结果对应的 HTTP 响应
fn batch_response(batch: BatchResult) -> ApiResult<(StatusCode, Json<ApiResponse<BatchResult>>)> {
    // 空批次在服务层已被拒绝
    let outcome = batch
        .outcome()
        .ok_or_else(|| ApiError::from(ProvisionError::invalid("files", "至少需要一个文件")))?;

    let status = StatusCode::from_u16(outcome.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match outcome {
        BatchOutcome::AllSucceeded => format!("{} 个文件全部上传成功", batch.counts.succeeded),
        BatchOutcome::AllFailed => format!("{} 个文件全部上传失败", batch.counts.failed),
        BatchOutcome::PartialSuccess => format!(
            "部分上传成功: 成功 {}, 失败 {}",
            batch.counts.succeeded, batch.counts.failed
        ),
    };

    let code = if outcome == BatchOutcome::AllSucceeded {
        0
    } else {
        status.as_u16() as i32
    };
    Ok((status, Json(ApiResponse::with_message(code, message, batch))))
}

/// POST /api/v1/uploads
/// 单文件上传
///
/// 表单字段：`file`，`target`（JSON），`public`（可选）
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<SingleUpload>>)> {
    let form = UploadForm::parse(multipart).await?;

    let mut files = form.files.iter();
    let item = match (files.next(), files.next()) {
        (Some(item), None) => item,
        (None, _) => return Err(ProvisionError::invalid("file", "未附加文件").into()),
        (Some(_), Some(_)) => {
            return Err(ProvisionError::invalid("file", "单文件上传只能附加一个文件").into())
        }
    };
    let target = form.target()?;
    let make_public = form.flag("public")?;

    info!("API: 单文件上传 name={}, target={:?}", item.original_name, target);

    let upload = state
        .service
        .upload_single(item, &target, make_public)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(upload))))
}

/// POST /api/v1/uploads/batch
/// 批量上传
///
/// 表单字段：`files`（多个），`target`（JSON），`mode`（可选），`public`（可选）
pub async fn upload_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<BatchResult>>)> {
    let form = UploadForm::parse(multipart).await?;
    let target = form.target()?;
    let mode = form.mode()?;
    let make_public = form.flag("public")?;

    info!(
        "API: 批量上传 {} 个文件, target={:?}, mode={:?}",
        form.files.len(),
        target,
        mode
    );

    let batch = state
        .service
        .upload_batch(&form.files, &target, mode, make_public)
        .await?;
    batch_response(batch)
}

/// POST /api/v1/payroll/uploads
/// 工资单上传到 `<year>/<MM>/<category>`
///
/// 表单字段：`year`，`month`，`category`，`files`（多个）
pub async fn upload_payroll(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<BatchResult>>)> {
    let form = UploadForm::parse(multipart).await?;

    let mut errors = Vec::new();
    let year = form.number::<i32>("year", &mut errors);
    let month = form.number::<u32>("month", &mut errors);
    let category = form.text("category").map(|s| s.to_string());
    if category.is_none() {
        errors.push(FieldError::new("category", "缺少必填字段"));
    }

    let request = match (year, month, category) {
        (Some(year), Some(month), Some(category)) if errors.is_empty() => PayrollRequest {
            year,
            month,
            category,
        },
        _ => return Err(ProvisionError::Validation(errors).into()),
    };

    info!(
        "API: 工资单上传 {}/{:02}/{}, {} 个文件",
        request.year,
        request.month,
        request.category,
        form.files.len()
    );

    let batch = state.service.upload_payroll(&request, &form.files).await?;
    batch_response(batch)
}
