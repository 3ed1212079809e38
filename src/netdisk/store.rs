// 远程存储接口
//
// 核心只依赖这个 trait：
// - DriveClient  真实 HTTP 实现
// - MemoryStore  进程内实现（测试与本地试运行）
// - DeadlineStore 为每次调用加截止时间的装饰器

use crate::netdisk::{FileMetadata, RemoteFile, RemoteFolder, RemoteStoreError};
use async_trait::async_trait;

/// 远程层级对象存储的最小操作集
///
/// 同一个句柄在所有并发操作之间只读共享，任何调用都不会修改客户端配置
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 查找 `parent_id` 下名称完全等于 `name` 且未进入回收站的文件夹
    async fn find_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<RemoteFolder>, RemoteStoreError>;

    /// 在 `parent_id` 下创建文件夹
    async fn create_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<RemoteFolder, RemoteStoreError>;

    /// 上传文件内容并设置名称、MIME 类型和父文件夹
    async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<RemoteFile, RemoteStoreError>;

    /// 获取文件/文件夹元数据
    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata, RemoteStoreError>;

    /// 授予“任何人凭链接可读”权限
    async fn grant_public_read(&self, file_id: &str) -> Result<(), RemoteStoreError>;
}
