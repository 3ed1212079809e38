// 截止时间装饰器
//
// 为每一次远程调用统一加上显式超时，避免一个挂起的调用无限期阻塞对应条目

use crate::netdisk::{FileMetadata, RemoteFile, RemoteFolder, RemoteStore, RemoteStoreError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// 给内部存储的每次调用加上截止时间
pub struct DeadlineStore {
    inner: Arc<dyn RemoteStore>,
    timeout: Duration,
}

impl DeadlineStore {
    pub fn new(inner: Arc<dyn RemoteStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, RemoteStoreError>
    where
        F: Future<Output = Result<T, RemoteStoreError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("远程调用超时: operation={}, timeout={:?}", operation, self.timeout);
                Err(RemoteStoreError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl RemoteStore for DeadlineStore {
    async fn find_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<RemoteFolder>, RemoteStoreError> {
        self.run("find_folder", self.inner.find_folder(name, parent_id))
            .await
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<RemoteFolder, RemoteStoreError> {
        self.run("create_folder", self.inner.create_folder(name, parent_id))
            .await
    }

    async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<RemoteFile, RemoteStoreError> {
        self.run(
            "create_file",
            self.inner.create_file(name, parent_id, mime_type, data),
        )
        .await
    }

    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata, RemoteStoreError> {
        self.run("get_file_metadata", self.inner.get_file_metadata(file_id))
            .await
    }

    async fn grant_public_read(&self, file_id: &str) -> Result<(), RemoteStoreError> {
        self.run("grant_public_read", self.inner.grant_public_read(file_id))
            .await
    }
}
