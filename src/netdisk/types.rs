// 远程存储数据类型

use serde::{Deserialize, Serialize};

/// 远程存储中文件夹的 MIME 类型
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// 远程文件夹
///
/// 身份由远程存储分配的不透明 id 决定；`(name, parent_id)` 仅作为逻辑键使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    /// 文件夹ID
    pub id: String,
    /// 文件夹名称
    pub name: String,
    /// 父文件夹ID
    pub parent_id: String,
}

/// 远程文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// 文件ID
    pub id: String,
    /// 文件名
    pub name: String,
    /// MIME 类型
    pub mime_type: String,
    /// 内容下载链接
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_link: Option<String>,
    /// 在线查看链接
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_link: Option<String>,
    /// 父文件夹ID
    pub parent_id: String,
}

/// 文件元数据（用于校验目标是否为可用文件夹）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
    /// 是否已在回收站
    pub trashed: bool,
}

impl FileMetadata {
    /// 是否是文件夹
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

// =====================================================
// API 线上格式
// =====================================================

/// API 返回的文件资源
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub trashed: bool,
    pub web_content_link: Option<String>,
    pub web_view_link: Option<String>,
}

impl DriveFile {
    /// 转换为文件夹，`fallback_parent` 用于响应中缺少 parents 的情况
    pub fn into_folder(self, fallback_parent: &str) -> RemoteFolder {
        let parent_id = self
            .parents
            .into_iter()
            .next()
            .unwrap_or_else(|| fallback_parent.to_string());
        RemoteFolder {
            id: self.id,
            name: self.name,
            parent_id,
        }
    }

    /// 转换为文件
    pub fn into_file(self, fallback_parent: &str) -> RemoteFile {
        let parent_id = self
            .parents
            .first()
            .cloned()
            .unwrap_or_else(|| fallback_parent.to_string());
        RemoteFile {
            id: self.id,
            name: self.name,
            mime_type: self.mime_type,
            download_link: self.web_content_link,
            view_link: self.web_view_link,
            parent_id,
        }
    }

    pub fn into_metadata(self) -> FileMetadata {
        FileMetadata {
            id: self.id,
            name: self.name,
            mime_type: self.mime_type,
            parents: self.parents,
            trashed: self.trashed,
        }
    }
}

/// 文件列表响应
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

/// 错误响应外层结构：`{"error": {"code": 404, "message": "..."}}`
#[derive(Debug, Deserialize)]
pub struct DriveErrorResponse {
    pub error: DriveErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct DriveErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}
