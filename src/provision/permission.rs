// 权限管理
//
// 对需要外部访问的新建文件授予“凭链接任何人可读”。
// 授权不再是发后即忘：批量上传收集全部授权任务并等待完成，
// 失败列表随批量结果一起返回。

use crate::netdisk::{RemoteStore, RemoteStoreError};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// 授权失败记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionFailure {
    pub file_id: String,
    pub file_name: String,
    pub error_message: String,
}

/// 权限管理器
#[derive(Clone)]
pub struct PermissionManager {
    store: Arc<dyn RemoteStore>,
}

impl PermissionManager {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// 授予公开只读
    pub async fn make_public_read(&self, file_id: &str) -> Result<(), RemoteStoreError> {
        self.store.grant_public_read(file_id).await?;
        debug!("已授予公开只读: id={}", file_id);
        Ok(())
    }

    /// 并发授权一组文件 `(id, name)`，等待全部完成后返回失败列表
    pub async fn grant_all(&self, targets: &[(String, String)]) -> Vec<PermissionFailure> {
        let results = join_all(
            targets
                .iter()
                .map(|(id, _)| self.make_public_read(id)),
        )
        .await;

        targets
            .iter()
            .zip(results)
            .filter_map(|((id, name), result)| match result {
                Ok(()) => None,
                Err(e) => {
                    warn!("授予公开只读失败: id={}, name={}, 错误: {}", id, name, e);
                    Some(PermissionFailure {
                        file_id: id.clone(),
                        file_name: name.clone(),
                        error_message: e.to_string(),
                    })
                }
            })
            .collect()
    }
}
