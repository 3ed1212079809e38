// 上传编排模块
//
// - task    上传条目、条目状态、执行方式
// - batch   批量结果与三分类
// - engine  单文件/批量上传编排

pub mod batch;
pub mod engine;
pub mod task;

pub use batch::{BatchCounts, BatchOutcome, BatchResult, FailedUpload, UploadedFile};
pub use engine::{BatchOptions, UploadOrchestrator};
pub use task::{UploadItem, UploadItemStatus, UploadMode};
