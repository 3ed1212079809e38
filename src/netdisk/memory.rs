// 进程内远程存储
//
// 用于单元测试和无凭证的本地试运行（store.backend = "memory"）
// 支持：
// - 按文件名/文件夹名注入失败
// - 人为延迟（模拟网络往返）
// - 记录上传开始/结束事件（验证顺序模式不重叠）

use crate::netdisk::{
    FileMetadata, RemoteFile, RemoteFolder, RemoteStore, RemoteStoreError, FOLDER_MIME_TYPE,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// 上传事件（按发生顺序记录）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    UploadStarted(String),
    UploadFinished(String),
}

#[derive(Debug, Clone)]
struct StoredFolder {
    folder: RemoteFolder,
    trashed: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    roots: HashSet<String>,
    folders: Vec<StoredFolder>,
    files: Vec<RemoteFile>,
    public: HashSet<String>,
    failing_uploads: HashSet<String>,
    failing_permissions: HashSet<String>,
    failing_folders: HashSet<String>,
    latency: Duration,
    upload_latency: HashMap<String, Duration>,
    events: Vec<StoreEvent>,
    create_folder_calls: usize,
}

impl MemoryState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn folder_exists(&self, id: &str) -> bool {
        self.roots.contains(id)
            || self
                .folders
                .iter()
                .any(|f| f.folder.id == id && !f.trashed)
    }
}

/// 进程内存储实现
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// 创建带有一个根文件夹 `root` 的存储
    pub fn new() -> Self {
        let store = Self::default();
        store.add_root("root");
        store
    }

    /// 注册一个已存在的根文件夹（对应配置中的文件夹映射）
    pub fn add_root(&self, id: &str) {
        self.state.lock().roots.insert(id.to_string());
    }

    /// 把文件夹移入回收站
    pub fn trash_folder(&self, id: &str) {
        let mut state = self.state.lock();
        for stored in state.folders.iter_mut().filter(|f| f.folder.id == id) {
            stored.trashed = true;
        }
    }

    /// 为每次调用设置人为延迟
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// 为指定名称文件的上传单独设置延迟（覆盖全局延迟）
    pub fn set_upload_latency(&self, name: &str, latency: Duration) {
        self.state
            .lock()
            .upload_latency
            .insert(name.to_string(), latency);
    }

    /// 上传指定名称的文件时返回错误
    pub fn fail_uploads_named(&self, name: &str) {
        self.state.lock().failing_uploads.insert(name.to_string());
    }

    /// 为指定名称的文件授权时返回错误
    pub fn fail_permission_for(&self, name: &str) {
        self.state.lock().failing_permissions.insert(name.to_string());
    }

    /// 创建指定名称的文件夹时返回错误
    pub fn fail_folders_named(&self, name: &str) {
        self.state.lock().failing_folders.insert(name.to_string());
    }

    /// 所有未删除的文件夹（按创建顺序）
    pub fn folders(&self) -> Vec<RemoteFolder> {
        self.state
            .lock()
            .folders
            .iter()
            .filter(|f| !f.trashed)
            .map(|f| f.folder.clone())
            .collect()
    }

    pub fn folder_count(&self) -> usize {
        self.state.lock().folders.iter().filter(|f| !f.trashed).count()
    }

    pub fn files(&self) -> Vec<RemoteFile> {
        self.state.lock().files.clone()
    }

    pub fn is_public(&self, id: &str) -> bool {
        self.state.lock().public.contains(id)
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.state.lock().events.clone()
    }

    pub fn create_folder_calls(&self) -> usize {
        self.state.lock().create_folder_calls
    }

    async fn simulate_latency(&self) {
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn not_found(id: &str) -> RemoteStoreError {
        RemoteStoreError::Api {
            status: 404,
            message: format!("File not found: {}", id),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn find_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<RemoteFolder>, RemoteStoreError> {
        self.simulate_latency().await;

        let state = self.state.lock();
        let found = state
            .folders
            .iter()
            .find(|f| !f.trashed && f.folder.name == name && f.folder.parent_id == parent_id)
            .map(|f| f.folder.clone());
        debug!("[memory] 查找文件夹: name={}, parent={}, found={}", name, parent_id, found.is_some());
        Ok(found)
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<RemoteFolder, RemoteStoreError> {
        self.simulate_latency().await;

        let mut state = self.state.lock();
        state.create_folder_calls += 1;

        if state.failing_folders.contains(name) {
            return Err(RemoteStoreError::Api {
                status: 500,
                message: format!("injected folder failure: {}", name),
            });
        }
        if !state.folder_exists(parent_id) {
            return Err(Self::not_found(parent_id));
        }

        let folder = RemoteFolder {
            id: state.allocate_id("folder"),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        };
        state.folders.push(StoredFolder {
            folder: folder.clone(),
            trashed: false,
        });
        Ok(folder)
    }

    async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<RemoteFile, RemoteStoreError> {
        let latency = {
            let mut state = self.state.lock();
            state.events.push(StoreEvent::UploadStarted(name.to_string()));
            state
                .upload_latency
                .get(name)
                .copied()
                .unwrap_or(state.latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        let result = if state.failing_uploads.contains(name) {
            Err(RemoteStoreError::Api {
                status: 500,
                message: format!("injected upload failure: {}", name),
            })
        } else if !state.folder_exists(parent_id) {
            Err(Self::not_found(parent_id))
        } else {
            let id = state.allocate_id("file");
            let file = RemoteFile {
                download_link: Some(format!("memory://download/{}?size={}", id, data.len())),
                view_link: Some(format!("memory://view/{}", id)),
                id,
                name: name.to_string(),
                mime_type: mime_type.to_string(),
                parent_id: parent_id.to_string(),
            };
            state.files.push(file.clone());
            Ok(file)
        };

        state
            .events
            .push(StoreEvent::UploadFinished(name.to_string()));
        result
    }

    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata, RemoteStoreError> {
        self.simulate_latency().await;

        let state = self.state.lock();
        if state.roots.contains(file_id) {
            return Ok(FileMetadata {
                id: file_id.to_string(),
                name: file_id.to_string(),
                mime_type: FOLDER_MIME_TYPE.to_string(),
                parents: Vec::new(),
                trashed: false,
            });
        }
        if let Some(stored) = state.folders.iter().find(|f| f.folder.id == file_id) {
            return Ok(FileMetadata {
                id: stored.folder.id.clone(),
                name: stored.folder.name.clone(),
                mime_type: FOLDER_MIME_TYPE.to_string(),
                parents: vec![stored.folder.parent_id.clone()],
                trashed: stored.trashed,
            });
        }
        if let Some(file) = state.files.iter().find(|f| f.id == file_id) {
            return Ok(FileMetadata {
                id: file.id.clone(),
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                parents: vec![file.parent_id.clone()],
                trashed: false,
            });
        }
        Err(Self::not_found(file_id))
    }

    async fn grant_public_read(&self, file_id: &str) -> Result<(), RemoteStoreError> {
        self.simulate_latency().await;

        let mut state = self.state.lock();
        let name = match state.files.iter().find(|f| f.id == file_id) {
            Some(file) => file.name.clone(),
            None if state.folder_exists(file_id) => String::new(),
            None => return Err(Self::not_found(file_id)),
        };

        if state.failing_permissions.contains(&name) {
            return Err(RemoteStoreError::Api {
                status: 403,
                message: format!("injected permission failure: {}", name),
            });
        }

        state.public.insert(file_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_folder_requires_parent() {
        let store = MemoryStore::new();
        let err = store.create_folder("x", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_trashed_folder_is_not_found() {
        let store = MemoryStore::new();
        let folder = store.create_folder("2025", "root").await.unwrap();
        store.trash_folder(&folder.id);

        assert!(store.find_folder("2025", "root").await.unwrap().is_none());
        let meta = store.get_file_metadata(&folder.id).await.unwrap();
        assert!(meta.trashed);
    }

    #[tokio::test]
    async fn test_upload_records_events() {
        let store = MemoryStore::new();
        store.fail_uploads_named("bad.pdf");

        store
            .create_file("ok.pdf", "root", "application/pdf", b"%PDF")
            .await
            .unwrap();
        assert!(store
            .create_file("bad.pdf", "root", "application/pdf", b"%PDF")
            .await
            .is_err());

        assert_eq!(
            store.events(),
            vec![
                StoreEvent::UploadStarted("ok.pdf".into()),
                StoreEvent::UploadFinished("ok.pdf".into()),
                StoreEvent::UploadStarted("bad.pdf".into()),
                StoreEvent::UploadFinished("bad.pdf".into()),
            ]
        );
        assert_eq!(store.files().len(), 1);
    }
}
