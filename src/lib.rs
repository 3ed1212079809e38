// Drive Provisioner Library
// 远程存储文件夹准备与批量上传核心库

// 配置管理模块
pub mod config;

// 错误类型
pub mod error;

// 日志系统
pub mod logging;

// 远程存储模块
pub mod netdisk;

// 文件夹准备模块
pub mod provision;

// Web服务器模块
pub mod server;

// 上传编排模块
pub mod uploader;

// 导出常用类型
pub use config::{AppConfig, FolderMap};
pub use error::{FieldError, ProvisionError};
pub use netdisk::{
    DeadlineStore, DriveClient, MemoryStore, RemoteFile, RemoteFolder, RemoteStore,
    RemoteStoreError,
};
pub use provision::{
    BuiltTree, FolderResolver, FolderTreeBuilder, FolderTreeSpec, PayrollRequest,
    PermissionManager, ProvisionService, SingleUpload, UploadTarget,
};
pub use server::AppState;
pub use uploader::{BatchOutcome, BatchResult, UploadItem, UploadMode, UploadOrchestrator};
