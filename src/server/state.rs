// 应用状态

use crate::config::{AppConfig, StoreBackend};
use crate::netdisk::{DeadlineStore, DriveClient, MemoryStore, RemoteStore};
use crate::provision::ProvisionService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 文件夹准备与上传服务
    pub service: Arc<ProvisionService>,
    /// 应用配置（只读）
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// 按配置构造存储句柄和服务
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let store = build_store(&config)?;
        Self::with_store(config, store)
    }

    /// 使用给定的存储句柄（测试时注入 MemoryStore）
    pub fn with_store(config: AppConfig, store: Arc<dyn RemoteStore>) -> anyhow::Result<Self> {
        let service = ProvisionService::new(store, &config)?;
        Ok(Self {
            service: Arc::new(service),
            config: Arc::new(config),
        })
    }
}

/// 创建远程存储，每次调用都带截止时间
fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RemoteStore>> {
    let inner: Arc<dyn RemoteStore> = match config.store.backend {
        StoreBackend::Drive => {
            let token = config.store.resolve_access_token()?;
            info!("远程存储: {}", config.store.api_base_url);
            Arc::new(DriveClient::new(&config.store, token)?)
        }
        StoreBackend::Memory => {
            warn!("远程存储: 进程内存储（数据不会持久化）");
            let store = MemoryStore::new();
            for id in config.folders.folder_ids() {
                store.add_root(id);
            }
            Arc::new(store)
        }
    };

    let timeout = Duration::from_secs(config.store.request_timeout_secs);
    Ok(Arc::new(DeadlineStore::new(inner, timeout)))
}
