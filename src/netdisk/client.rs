// 远程存储 HTTP 客户端实现
//
// 对接 Drive v3 风格的 REST API：
// - files.list    按名称 + 父文件夹查找文件夹
// - files.create  创建文件夹 / multipart 上传文件
// - files.get     读取元数据
// - permissions.create  授予公开只读

use crate::config::StoreConfig;
use crate::netdisk::{
    DriveErrorResponse, DriveFile, DriveFileList, FileMetadata, RemoteFile, RemoteFolder,
    RemoteStore, RemoteStoreError, FOLDER_MIME_TYPE,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// 文件资源返回字段
const FILE_FIELDS: &str = "id,name,mimeType,parents,webContentLink,webViewLink";

/// 元数据返回字段
const METADATA_FIELDS: &str = "id,name,mimeType,parents,trashed";

/// 远程存储客户端
///
/// 进程启动时构造一次，之后以 `Arc<dyn RemoteStore>` 注入各组件
#[derive(Debug, Clone)]
pub struct DriveClient {
    /// HTTP客户端
    client: Client,
    /// 元数据 API 地址（如 https://www.googleapis.com/drive/v3）
    api_base_url: String,
    /// 上传 API 地址（如 https://www.googleapis.com/upload/drive/v3）
    upload_base_url: String,
    /// 访问令牌（由外部认证流程提供）
    access_token: String,
}

impl DriveClient {
    /// 创建客户端
    ///
    /// # 参数
    /// * `config` - 存储配置
    /// * `access_token` - 已获取的访问令牌
    pub fn new(config: &StoreConfig, access_token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            "初始化远程存储客户端: api={}, upload={}, timeout={}s",
            config.api_base_url, config.upload_base_url, config.request_timeout_secs
        );

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            upload_base_url: config.upload_base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.api_base_url)
    }

    /// 单个文件的资源地址，id 作为一个路径段编码
    fn file_url(&self, file_id: &str) -> Result<String, RemoteStoreError> {
        if file_id.is_empty() || file_id.chars().all(|c| c == '.') {
            return Err(RemoteStoreError::Api {
                status: 400,
                message: format!("无效的文件 id: '{}'", file_id),
            });
        }
        Ok(format!(
            "{}/{}",
            self.files_url(),
            urlencoding::encode(file_id)
        ))
    }

    /// 检查状态码并解析响应体
    async fn decode<T: DeserializeOwned>(
        response: Response,
        operation: &str,
    ) -> Result<T, RemoteStoreError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<DriveErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.clone());
            error!(
                "{}失败: status={}, message={}",
                operation,
                status.as_u16(),
                message
            );
            return Err(RemoteStoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("{}响应: status={}, body={}", operation, status, body);

        serde_json::from_str(&body)
            .map_err(|e| RemoteStoreError::Decode(format!("{}: {}", operation, e)))
    }
}

/// 转义查询表达式中的字符串字面量
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// 构造“按名称查找未删除文件夹”的查询表达式
fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and mimeType = '{}' and trashed = false",
        escape_query_value(name),
        escape_query_value(parent_id),
        FOLDER_MIME_TYPE
    )
}

/// 构造 multipart/related 请求体（元数据 JSON + 文件内容）
fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    mime_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn find_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<RemoteFolder>, RemoteStoreError> {
        debug!("查找文件夹: name={}, parent={}", name, parent_id);

        let response = self
            .client
            .get(self.files_url())
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", folder_query(name, parent_id).as_str()),
                ("fields", "files(id,name,mimeType,parents)"),
                ("pageSize", "1"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;

        let list: DriveFileList = Self::decode(response, "查找文件夹").await?;
        Ok(list
            .files
            .into_iter()
            .next()
            .map(|f| f.into_folder(parent_id)))
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<RemoteFolder, RemoteStoreError> {
        info!("创建文件夹: name={}, parent={}", name, parent_id);

        let response = self
            .client
            .post(self.files_url())
            .bearer_auth(&self.access_token)
            .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }))
            .send()
            .await?;

        let created: DriveFile = Self::decode(response, "创建文件夹").await?;
        info!("创建文件夹成功: name={}, id={}", name, created.id);
        Ok(created.into_folder(parent_id))
    }

    async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<RemoteFile, RemoteStoreError> {
        info!(
            "上传文件: name={}, parent={}, mime={}, size={}",
            name,
            parent_id,
            mime_type,
            data.len()
        );

        let boundary = format!("drive-provisioner-{}", Uuid::new_v4().simple());
        let metadata = json!({
            "name": name,
            "mimeType": mime_type,
            "parents": [parent_id],
        });
        let body = multipart_related_body(&boundary, &metadata, mime_type, data);
        let content_type = HeaderValue::from_str(&format!(
            "multipart/related; boundary={}",
            boundary
        ))
        .map_err(|e| RemoteStoreError::Decode(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/files", self.upload_base_url))
            .bearer_auth(&self.access_token)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", FILE_FIELDS),
                ("supportsAllDrives", "true"),
            ])
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let created: DriveFile = Self::decode(response, "上传文件").await?;
        info!("上传文件成功: name={}, id={}", name, created.id);
        Ok(created.into_file(parent_id))
    }

    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata, RemoteStoreError> {
        debug!("获取元数据: id={}", file_id);

        let response = self
            .client
            .get(self.file_url(file_id)?)
            .bearer_auth(&self.access_token)
            .query(&[("fields", METADATA_FIELDS), ("supportsAllDrives", "true")])
            .send()
            .await?;

        let file: DriveFile = Self::decode(response, "获取元数据").await?;
        Ok(file.into_metadata())
    }

    async fn grant_public_read(&self, file_id: &str) -> Result<(), RemoteStoreError> {
        debug!("授予公开只读: id={}", file_id);

        let response = self
            .client
            .post(format!("{}/permissions", self.file_url(file_id)?))
            .bearer_auth(&self.access_token)
            .query(&[("supportsAllDrives", "true")])
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await?;

        let _: serde_json::Value = Self::decode(response, "授予公开只读").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_query_escapes_quotes() {
        let q = folder_query("O'Brien \\ Co", "root");
        assert!(q.starts_with("name = 'O\\'Brien \\\\ Co'"));
        assert!(q.contains("'root' in parents"));
        assert!(q.ends_with("trashed = false"));
    }

    #[test]
    fn test_multipart_related_layout() {
        let metadata = json!({ "name": "a.txt" });
        let body = multipart_related_body("b0", &metadata, "text/plain", b"hola");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with("--b0\r\nContent-Type: application/json"));
        assert!(text.contains("Content-Type: text/plain\r\n\r\nhola\r\n"));
        assert!(text.ends_with("--b0--\r\n"));
    }

    #[test]
    fn test_new_trims_base_urls() {
        let config = StoreConfig {
            api_base_url: "https://api.example.test/drive/v3/".to_string(),
            ..StoreConfig::default()
        };
        let client = DriveClient::new(&config, "token".to_string()).unwrap();
        assert_eq!(client.files_url(), "https://api.example.test/drive/v3/files");
    }

    #[test]
    fn test_file_url_keeps_id_in_one_segment() {
        let config = StoreConfig {
            api_base_url: "https://api.example.test/drive/v3".to_string(),
            ..StoreConfig::default()
        };
        let client = DriveClient::new(&config, "token".to_string()).unwrap();

        let url = reqwest::Url::parse(&client.file_url("../../about?x=1#y").unwrap()).unwrap();
        assert_eq!(url.path(), "/drive/v3/files/..%2F..%2Fabout%3Fx%3D1%23y");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let url = reqwest::Url::parse(&client.file_url("1AbC_d-9").unwrap()).unwrap();
        assert_eq!(url.path(), "/drive/v3/files/1AbC_d-9");

        for bad in ["", ".", ".."] {
            assert!(matches!(
                client.file_url(bad),
                Err(RemoteStoreError::Api { status: 400, .. })
            ));
        }
    }
}
