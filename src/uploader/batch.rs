// 批量上传结果
//
// 分类规则（纯函数，与并发方式无关）：
// - 成功 0、失败 > 0  → AllFailed
// - 成功 > 0、失败 0  → AllSucceeded
// - 成功 > 0、失败 > 0 → PartialSuccess（无论比例）
// - 条目为 0 不是合法输入，调用前即被拒绝

use crate::netdisk::{RemoteFile, RemoteStoreError};
use crate::provision::PermissionFailure;
use crate::uploader::UploadItemStatus;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// 批量结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    AllSucceeded,
    AllFailed,
    PartialSuccess,
}

impl BatchOutcome {
    /// 根据成功/失败数量分类，总数为 0 时返回 None
    pub fn classify(succeeded: usize, failed: usize) -> Option<Self> {
        match (succeeded, failed) {
            (0, 0) => None,
            (0, _) => Some(BatchOutcome::AllFailed),
            (_, 0) => Some(BatchOutcome::AllSucceeded),
            _ => Some(BatchOutcome::PartialSuccess),
        }
    }

    /// HTTP 边界上的状态码：201 / 500 / 206
    pub fn status_code(&self) -> u16 {
        match self {
            BatchOutcome::AllSucceeded => 201,
            BatchOutcome::AllFailed => 500,
            BatchOutcome::PartialSuccess => 206,
        }
    }
}

/// 上传成功的条目
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    /// 原始文件名
    pub source_name: String,
    #[serde(flatten)]
    pub file: RemoteFile,
    /// Succeeded 或 PermissionsGranted
    pub status: UploadItemStatus,
}

/// 上传失败的条目
#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub source_name: String,
    pub error_message: String,
    /// 存储错误携带的状态码
    pub status_code: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// 批量上传结果（每次调用构建一次，不持久化）
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// 批次ID（用于日志关联）
    pub batch_id: String,
    /// 目标文件夹
    pub folder_id: String,
    /// 成功列表（按输入顺序）
    pub succeeded: Vec<UploadedFile>,
    /// 失败列表（按输入顺序）
    pub failed: Vec<FailedUpload>,
    /// 公开授权失败列表（不参与分类）
    pub permission_failures: Vec<PermissionFailure>,
    pub counts: BatchCounts,
}

impl BatchResult {
    /// 由按输入顺序排列的条目结果构建
    pub fn from_outcomes(
        folder_id: &str,
        outcomes: Vec<(String, Result<RemoteFile, RemoteStoreError>)>,
    ) -> Self {
        let total = outcomes.len();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for (source_name, result) in outcomes {
            match result {
                Ok(file) => succeeded.push(UploadedFile {
                    source_name,
                    file,
                    status: UploadItemStatus::Succeeded,
                }),
                Err(e) => failed.push(FailedUpload {
                    source_name,
                    status_code: e.status_code(),
                    error_message: e.to_string(),
                }),
            }
        }

        let counts = BatchCounts {
            total,
            succeeded: succeeded.len(),
            failed: failed.len(),
        };

        Self {
            batch_id: Uuid::new_v4().to_string(),
            folder_id: folder_id.to_string(),
            succeeded,
            failed,
            permission_failures: Vec::new(),
            counts,
        }
    }

    /// 三分类结果
    pub fn outcome(&self) -> Option<BatchOutcome> {
        BatchOutcome::classify(self.counts.succeeded, self.counts.failed)
    }

    /// 成功条目的 `(file_id, source_name)`
    pub fn succeeded_targets(&self) -> Vec<(String, String)> {
        self.succeeded
            .iter()
            .map(|u| (u.file.id.clone(), u.source_name.clone()))
            .collect()
    }

    /// 合并公开授权结果：未失败的成功条目标记为 PermissionsGranted
    pub fn apply_permissions(&mut self, failures: Vec<PermissionFailure>) {
        let failed_ids: HashSet<&str> = failures.iter().map(|f| f.file_id.as_str()).collect();
        for uploaded in &mut self.succeeded {
            if !failed_ids.contains(uploaded.file.id.as_str())
                && uploaded
                    .status
                    .can_transition_to(UploadItemStatus::PermissionsGranted)
            {
                uploaded.status = UploadItemStatus::PermissionsGranted;
            }
        }
        self.permission_failures = failures;
    }
}
