// 文件夹API处理器

use crate::provision::{BuiltTree, FolderTreeSpec, UploadTarget};
use crate::server::error::ApiResult;
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiResponse;

/// 查找或创建文件夹请求
#[derive(Debug, Deserialize)]
pub struct ResolveFolderRequest {
    /// 文件夹名称
    pub name: String,
    /// 父文件夹
    pub parent: UploadTarget,
}

#[derive(Debug, Serialize)]
pub struct ResolveFolderResponse {
    pub folder_id: String,
}

/// 创建文件夹树请求
#[derive(Debug, Deserialize)]
pub struct CreateTreeRequest {
    pub tree: FolderTreeSpec,
    pub parent: UploadTarget,
}

/// POST /api/v1/folders/resolve
/// 查找或创建单个文件夹（幂等）
pub async fn resolve_folder(
    State(state): State<AppState>,
    Json(req): Json<ResolveFolderRequest>,
) -> ApiResult<Json<ApiResponse<ResolveFolderResponse>>> {
    info!("API: 解析文件夹 name={}, parent={:?}", req.name, req.parent);

    let folder_id = state.service.resolve_folder(&req.name, &req.parent).await?;
    Ok(Json(ApiResponse::success(ResolveFolderResponse { folder_id })))
}

/// POST /api/v1/folders/tree
/// 创建整棵文件夹树（非幂等，重复调用会创建重复的树）
pub async fn create_folder_tree(
    State(state): State<AppState>,
    Json(req): Json<CreateTreeRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<BuiltTree>>)> {
    info!(
        "API: 创建文件夹树 root={}, 节点数={}",
        req.tree.name,
        req.tree.node_count()
    );

    let built = state
        .service
        .create_folder_tree(&req.tree, &req.parent)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(built))))
}
