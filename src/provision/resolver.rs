// 文件夹解析器
//
// 幂等的“查找或创建”单个文件夹：
// 1. 查询 parent 下名称完全相同、未删除的文件夹
// 2. 找到则直接返回其 id
// 3. 找不到则创建并返回新 id
//
// 同一进程内按 (name, parent_id) 加锁，把查询+创建作为一个临界区，
// 避免两个并发解析同时看到“不存在”而各自创建一份。
// 跨进程的竞争仍然存在（远程存储不提供幂等键）。

use crate::netdisk::{RemoteStore, RemoteStoreError};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

type FolderKey = (String, String);
type FolderLocks = DashMap<FolderKey, Arc<Mutex<()>>>;

/// 离开作用域时回收没有其他持有者的锁条目
///
/// 调用方的 future 在等待中途被丢弃时同样会执行
struct LockCleanup<'a> {
    locks: &'a FolderLocks,
    key: &'a FolderKey,
}

impl Drop for LockCleanup<'_> {
    fn drop(&mut self) {
        self.locks
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// 文件夹解析器
pub struct FolderResolver {
    store: Arc<dyn RemoteStore>,
    /// (name, parent_id) → 互斥锁
    locks: FolderLocks,
}

impl FolderResolver {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// 查找或创建 `parent_id` 下名为 `name` 的文件夹，返回文件夹 id
    ///
    /// 远程错误直接向上传播，本层不重试
    pub async fn resolve(&self, name: &str, parent_id: &str) -> Result<String, RemoteStoreError> {
        let key = (name.to_string(), parent_id.to_string());
        // 按声明的逆序释放：先释放互斥锁，再释放 Arc，最后回收条目
        let _cleanup = LockCleanup {
            locks: &self.locks,
            key: &key,
        };
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        self.find_or_create(name, parent_id).await
    }

    /// 依次解析多级路径，返回最后一级的 id
    ///
    /// 例如 `["2025", "03", "resumen"]` 在 root 下得到 root/2025/03/resumen
    pub async fn resolve_path<S: AsRef<str>>(
        &self,
        segments: &[S],
        root_id: &str,
    ) -> Result<String, RemoteStoreError> {
        let mut current = root_id.to_string();
        for segment in segments {
            current = self.resolve(segment.as_ref(), &current).await?;
        }
        Ok(current)
    }

    async fn find_or_create(&self, name: &str, parent_id: &str) -> Result<String, RemoteStoreError> {
        if let Some(existing) = self.store.find_folder(name, parent_id).await? {
            debug!(
                "文件夹已存在: name={}, parent={}, id={}",
                name, parent_id, existing.id
            );
            return Ok(existing.id);
        }

        let created = self.store.create_folder(name, parent_id).await?;
        info!(
            "已创建文件夹: name={}, parent={}, id={}",
            name, parent_id, created.id
        );
        Ok(created.id)
    }

    /// 当前持有的锁条目数量
    pub fn pending_locks(&self) -> usize {
        self.locks.len()
    }
}
