// 上传编排器
//
// 核心功能：
// 1. 单文件上传（错误直接向上传播）
// 2. 批量上传：并发或顺序执行，逐条分类成功/失败，任何条目失败都不会中断其他条目
// 3. 成功条目的公开授权在返回结果之前全部等待完成
//
// 并发策略：
// - 并发模式：所有条目的上传 future 同时发起，join_all 等待全部结束，
//   结果顺序与输入顺序一致（而非完成顺序）
// - 顺序模式：第 i+1 个上传只在第 i 个结束（成功或失败）后开始

use crate::error::{FieldError, ProvisionError};
use crate::netdisk::{RemoteFile, RemoteStore, RemoteStoreError};
use crate::provision::PermissionManager;
use crate::uploader::{BatchResult, UploadItem, UploadMode};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 批量上传选项
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// 执行方式
    pub mode: UploadMode,
    /// 是否为成功条目授予公开只读
    pub make_public: bool,
}

impl BatchOptions {
    pub fn new(mode: UploadMode) -> Self {
        Self {
            mode,
            make_public: false,
        }
    }

    pub fn public(mut self) -> Self {
        self.make_public = true;
        self
    }
}

/// 上传编排器
pub struct UploadOrchestrator {
    store: Arc<dyn RemoteStore>,
    permissions: PermissionManager,
}

impl UploadOrchestrator {
    pub fn new(store: Arc<dyn RemoteStore>, permissions: PermissionManager) -> Self {
        Self { store, permissions }
    }

    /// 上传单个文件到已解析的目标文件夹
    pub async fn upload_one(
        &self,
        item: &UploadItem,
        folder_id: &str,
    ) -> Result<RemoteFile, RemoteStoreError> {
        debug!(
            "开始上传: name={}, mime={}, size={}, folder={}",
            item.original_name,
            item.mime_type,
            item.size(),
            folder_id
        );

        let file = self
            .store
            .create_file(&item.original_name, folder_id, &item.mime_type, &item.payload)
            .await?;

        debug!("上传完成: name={}, id={}", item.original_name, file.id);
        Ok(file)
    }

    /// 批量上传
    ///
    /// 空批次在任何远程调用之前被拒绝
    pub async fn upload_batch(
        &self,
        items: &[UploadItem],
        folder_id: &str,
        options: BatchOptions,
    ) -> Result<BatchResult, ProvisionError> {
        if items.is_empty() {
            return Err(ProvisionError::Validation(vec![FieldError::new(
                "files",
                "至少需要一个文件",
            )]));
        }

        info!(
            "开始批量上传: {} 个文件, folder={}, mode={:?}, public={}",
            items.len(),
            folder_id,
            options.mode,
            options.make_public
        );

        let results = match options.mode {
            UploadMode::Concurrent => {
                join_all(items.iter().map(|item| self.upload_one(item, folder_id))).await
            }
            UploadMode::Sequential => {
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    results.push(self.upload_one(item, folder_id).await);
                }
                results
            }
        };

        let outcomes = items
            .iter()
            .zip(results)
            .map(|(item, result)| {
                if let Err(e) = &result {
                    warn!("上传失败: name={}, 错误: {}", item.original_name, e);
                }
                (item.original_name.clone(), result)
            })
            .collect();

        let mut batch = BatchResult::from_outcomes(folder_id, outcomes);

        if options.make_public && !batch.succeeded.is_empty() {
            let failures = self
                .permissions
                .grant_all(&batch.succeeded_targets())
                .await;
            batch.apply_permissions(failures);
        }

        info!(
            "批量上传结束: batch={}, 成功 {}, 失败 {}, 授权失败 {}, 分类={:?}",
            batch.batch_id,
            batch.counts.succeeded,
            batch.counts.failed,
            batch.permission_failures.len(),
            batch.outcome()
        );

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netdisk::{MemoryStore, StoreEvent};
    use crate::uploader::{BatchOutcome, UploadItemStatus};
    use std::time::Duration;

    fn setup() -> (Arc<MemoryStore>, UploadOrchestrator) {
        let store = Arc::new(MemoryStore::new());
        let orchestrator =
            UploadOrchestrator::new(store.clone(), PermissionManager::new(store.clone()));
        (store, orchestrator)
    }

    fn items(names: &[&str]) -> Vec<UploadItem> {
        names
            .iter()
            .map(|n| UploadItem::new(*n, "application/pdf", b"%PDF-1.7".to_vec()))
            .collect()
    }

    #[tokio::test]
    async fn test_upload_one() {
        let (store, orchestrator) = setup();
        let item = UploadItem::new("nomina.pdf", "application/pdf", b"%PDF".to_vec());

        let file = orchestrator.upload_one(&item, "root").await.unwrap();

        assert_eq!(file.name, "nomina.pdf");
        assert_eq!(file.parent_id, "root");
        assert!(file.view_link.is_some());
        assert_eq!(store.files().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_one_propagates_error() {
        let (_store, orchestrator) = setup();
        let item = UploadItem::new("x.pdf", "application/pdf", b"%PDF".to_vec());
        let err = orchestrator.upload_one(&item, "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_empty_batch_rejected_before_store() {
        let (store, orchestrator) = setup();
        let err = orchestrator
            .upload_batch(&[], "root", BatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_middle_item_failure_is_partial_success() {
        for mode in [UploadMode::Concurrent, UploadMode::Sequential] {
            let (store, orchestrator) = setup();
            store.fail_uploads_named("2.pdf");

            let batch = orchestrator
                .upload_batch(&items(&["1.pdf", "2.pdf", "3.pdf"]), "root", BatchOptions::new(mode))
                .await
                .unwrap();

            assert_eq!(batch.succeeded.len(), 2);
            assert_eq!(batch.failed.len(), 1);
            assert_eq!(batch.failed[0].source_name, "2.pdf");
            assert_eq!(batch.counts.total, 3);
            assert_eq!(batch.outcome(), Some(BatchOutcome::PartialSuccess));
        }
    }

    #[tokio::test]
    async fn test_all_failed() {
        let (store, orchestrator) = setup();
        store.fail_uploads_named("a.pdf");
        store.fail_uploads_named("b.pdf");

        let batch = orchestrator
            .upload_batch(&items(&["a.pdf", "b.pdf"]), "root", BatchOptions::default())
            .await
            .unwrap();

        assert_eq!(batch.outcome(), Some(BatchOutcome::AllFailed));
        assert_eq!(batch.counts.total, batch.succeeded.len() + batch.failed.len());
    }

    #[tokio::test]
    async fn test_counts_match_input_size() {
        for n in 1..6 {
            let (_store, orchestrator) = setup();
            let names: Vec<String> = (0..n).map(|i| format!("{}.pdf", i)).collect();
            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();

            let batch = orchestrator
                .upload_batch(&items(&refs), "root", BatchOptions::default())
                .await
                .unwrap();

            assert_eq!(batch.counts.total, n);
            assert_eq!(batch.succeeded.len() + batch.failed.len(), n);
            assert_eq!(batch.outcome(), Some(BatchOutcome::AllSucceeded));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_uploads_do_not_overlap() {
        let (store, orchestrator) = setup();
        store.set_latency(Duration::from_millis(20));
        store.fail_uploads_named("b.pdf");

        orchestrator
            .upload_batch(
                &items(&["a.pdf", "b.pdf", "c.pdf"]),
                "root",
                BatchOptions::new(UploadMode::Sequential),
            )
            .await
            .unwrap();

        let events = store.events();
        assert_eq!(events.len(), 6);
        for pair in events.chunks(2) {
            match (&pair[0], &pair[1]) {
                (StoreEvent::UploadStarted(a), StoreEvent::UploadFinished(b)) => assert_eq!(a, b),
                other => panic!("顺序模式出现重叠: {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_uploads_overlap() {
        let (store, orchestrator) = setup();
        store.set_latency(Duration::from_millis(20));

        orchestrator
            .upload_batch(&items(&["a.pdf", "b.pdf", "c.pdf"]), "root", BatchOptions::default())
            .await
            .unwrap();

        let events = store.events();
        // 所有上传都在第一个完成之前发起
        assert!(events[..3]
            .iter()
            .all(|e| matches!(e, StoreEvent::UploadStarted(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_output_follows_input_order() {
        let (store, orchestrator) = setup();
        store.set_upload_latency("slow.pdf", Duration::from_millis(100));
        store.set_upload_latency("fast.pdf", Duration::from_millis(1));

        let batch = orchestrator
            .upload_batch(&items(&["slow.pdf", "fast.pdf"]), "root", BatchOptions::default())
            .await
            .unwrap();

        let names: Vec<&str> = batch.succeeded.iter().map(|u| u.source_name.as_str()).collect();
        assert_eq!(names, vec!["slow.pdf", "fast.pdf"]);
    }

    #[tokio::test]
    async fn test_public_grants_awaited_before_result() {
        let (store, orchestrator) = setup();
        store.fail_permission_for("b.png");

        let images = vec![
            UploadItem::new("a.png", "image/png", b"png".to_vec()),
            UploadItem::new("b.png", "image/png", b"png".to_vec()),
        ];
        let batch = orchestrator
            .upload_batch(&images, "root", BatchOptions::default().public())
            .await
            .unwrap();

        assert!(store.is_public(&batch.succeeded[0].file.id));
        assert_eq!(batch.succeeded[0].status, UploadItemStatus::PermissionsGranted);
        assert_eq!(batch.succeeded[1].status, UploadItemStatus::Succeeded);
        assert_eq!(batch.permission_failures.len(), 1);
        assert_eq!(batch.permission_failures[0].file_name, "b.png");
        assert_eq!(batch.outcome(), Some(BatchOutcome::AllSucceeded));
    }

    #[tokio::test]
    async fn test_private_batch_skips_grants() {
        let (store, orchestrator) = setup();
        let batch = orchestrator
            .upload_batch(&items(&["a.pdf"]), "root", BatchOptions::default())
            .await
            .unwrap();
        assert!(!store.is_public(&batch.succeeded[0].file.id));
    }
}
