// 文件夹准备模块
//
// - naming      命名规则（纯函数）
// - resolver    幂等的单文件夹查找或创建
// - tree        声明式文件夹树的一次性创建
// - permission  公开只读授权
// - service     各调用点的完整流程

pub mod naming;
pub mod permission;
pub mod resolver;
pub mod service;
pub mod tree;

pub use naming::{sanitize_name, Clock, FixedClock, SystemClock};
pub use permission::{PermissionFailure, PermissionManager};
pub use resolver::FolderResolver;
pub use service::{PayrollRequest, ProvisionService, SingleUpload, UploadTarget};
pub use tree::{BuiltTree, FolderTreeBuilder, FolderTreeSpec, TreeBuildError, MAX_TREE_DEPTH};
