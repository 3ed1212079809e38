// 远程存储模块

pub mod client;
pub mod deadline;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use client::DriveClient;
pub use deadline::DeadlineStore;
pub use error::RemoteStoreError;
pub use memory::{MemoryStore, StoreEvent};
pub use store::RemoteStore;
pub use types::*;
