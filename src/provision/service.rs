// 文件夹准备与上传服务
//
// 组合解析器、树构建器、上传编排器，对应各个调用点的完整流程：
// 1. 校验全部输入（任何远程调用之前）
// 2. 解析目标文件夹（每批只解析一次）
// 3. 上传并汇总结果
//
// 存储句柄在启动时构造一次，经构造函数注入，不使用全局状态。

use crate::config::{AppConfig, FolderMap, PayrollConfig, UploadConfig};
use crate::error::{FieldError, ProvisionError};
use crate::netdisk::{RemoteFile, RemoteStore};
use crate::provision::naming::{self, Clock, SystemClock};
use crate::provision::{
    BuiltTree, FolderResolver, FolderTreeBuilder, FolderTreeSpec, PermissionFailure,
    PermissionManager,
};
use crate::uploader::{
    BatchOptions, BatchResult, UploadItem, UploadItemStatus, UploadMode, UploadOrchestrator,
};
use anyhow::Result;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 允许的工资单年份
const PAYROLL_YEARS: std::ops::RangeInclusive<i32> = 2000..=2100;

/// 上传目标描述
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadTarget {
    /// 已知的文件夹 id（上传前确认其为未删除的文件夹）
    FolderId { folder_id: String },
    /// 逻辑键映射的根文件夹本身
    Key { key: String },
    /// 根文件夹下的当日文件夹
    DayFolder { key: String },
    /// 根文件夹下的指定名称文件夹
    Named { key: String, name: String },
    /// 根文件夹下以 `sanitize_name(source_name)` 命名的文件夹
    DerivedFrom { key: String, source_name: String },
    /// 根文件夹下的多级路径
    Path { key: String, segments: Vec<String> },
}

impl UploadTarget {
    pub fn folder_id(id: impl Into<String>) -> Self {
        UploadTarget::FolderId {
            folder_id: id.into(),
        }
    }

    pub fn day_folder(key: impl Into<String>) -> Self {
        UploadTarget::DayFolder { key: key.into() }
    }

    /// 不需要远程调用就能发现的问题
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match self {
            UploadTarget::FolderId { folder_id } => {
                if folder_id.trim().is_empty() {
                    errors.push(FieldError::new("target.folder_id", "不能为空"));
                }
            }
            UploadTarget::Key { key } | UploadTarget::DayFolder { key } => {
                check_key(key, &mut errors);
            }
            UploadTarget::Named { key, name } => {
                check_key(key, &mut errors);
                if name.trim().is_empty() {
                    errors.push(FieldError::new("target.name", "不能为空"));
                }
            }
            UploadTarget::DerivedFrom { key, source_name } => {
                check_key(key, &mut errors);
                if naming::sanitize_name(source_name).is_empty() {
                    errors.push(FieldError::new(
                        "target.source_name",
                        "无法从该名称派生文件夹名",
                    ));
                }
            }
            UploadTarget::Path { key, segments } => {
                check_key(key, &mut errors);
                if segments.is_empty() {
                    errors.push(FieldError::new("target.segments", "至少需要一级路径"));
                }
                for (i, segment) in segments.iter().enumerate() {
                    if segment.trim().is_empty() {
                        errors.push(FieldError::new(
                            format!("target.segments[{}]", i),
                            "不能为空",
                        ));
                    }
                }
            }
        }
        errors
    }
}

fn check_key(key: &str, errors: &mut Vec<FieldError>) {
    if key.trim().is_empty() {
        errors.push(FieldError::new("target.key", "不能为空"));
    }
}

/// 工资单上传请求（年/月/类别）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PayrollRequest {
    pub year: i32,
    pub month: u32,
    pub category: String,
}

impl PayrollRequest {
    fn validate(&self, config: &PayrollConfig) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if !PAYROLL_YEARS.contains(&self.year) {
            errors.push(FieldError::new(
                "year",
                format!(
                    "必须在 {}..={} 之间",
                    PAYROLL_YEARS.start(),
                    PAYROLL_YEARS.end()
                ),
            ));
        }
        if naming::month_folder_name(self.month).is_none() {
            errors.push(FieldError::new("month", "必须在 1..=12 之间"));
        }
        if !config.categories.iter().any(|c| c == &self.category) {
            errors.push(FieldError::new(
                "category",
                format!(
                    "未知类别 '{}'，可选: {}",
                    self.category,
                    config.categories.join(", ")
                ),
            ));
        }
        errors
    }

    fn segments(&self) -> Vec<String> {
        vec![
            naming::year_folder_name(self.year),
            naming::month_folder_name(self.month).unwrap_or_default(),
            self.category.clone(),
        ]
    }
}

/// 单文件上传结果
///
/// 文件已经写入存储后，授权失败只记录在 `permission_failure` 中
#[derive(Debug, Clone, Serialize)]
pub struct SingleUpload {
    #[serde(flatten)]
    pub file: RemoteFile,
    /// Succeeded 或 PermissionsGranted
    pub status: UploadItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_failure: Option<PermissionFailure>,
}

/// 文件夹准备与上传服务
pub struct ProvisionService {
    store: Arc<dyn RemoteStore>,
    folders: FolderMap,
    resolver: FolderResolver,
    trees: FolderTreeBuilder,
    orchestrator: UploadOrchestrator,
    permissions: PermissionManager,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    upload: UploadConfig,
    payroll: PayrollConfig,
}

impl ProvisionService {
    /// 使用系统时钟创建
    pub fn new(store: Arc<dyn RemoteStore>, config: &AppConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn RemoteStore>,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let timezone = config.naming.tz()?;
        let permissions = PermissionManager::new(store.clone());

        Ok(Self {
            resolver: FolderResolver::new(store.clone()),
            trees: FolderTreeBuilder::new(store.clone()),
            orchestrator: UploadOrchestrator::new(store.clone(), permissions.clone()),
            permissions,
            store,
            folders: config.folders.clone(),
            clock,
            timezone,
            upload: config.upload.clone(),
            payroll: config.payroll.clone(),
        })
    }

    /// 当日文件夹名（固定时区）
    pub fn day_folder_name(&self) -> String {
        naming::day_folder_name(self.clock.as_ref(), self.timezone)
    }

    /// 把上传目标解析为具体的文件夹 id
    pub async fn resolve_target(&self, target: &UploadTarget) -> Result<String, ProvisionError> {
        ProvisionError::check(target.validate())?;

        let folder_id = match target {
            UploadTarget::FolderId { folder_id } => {
                let metadata = self.store.get_file_metadata(folder_id).await?;
                if !metadata.is_folder() || metadata.trashed {
                    return Err(ProvisionError::invalid(
                        "target.folder_id",
                        format!("{} 不是可用的文件夹", folder_id),
                    ));
                }
                metadata.id
            }
            UploadTarget::Key { key } => self.folders.root_for(key)?.to_string(),
            UploadTarget::DayFolder { key } => {
                let root = self.folders.root_for(key)?;
                let day = self.day_folder_name();
                self.resolver.resolve(&day, root).await?
            }
            UploadTarget::Named { key, name } => {
                let root = self.folders.root_for(key)?;
                self.resolver.resolve(name.trim(), root).await?
            }
            UploadTarget::DerivedFrom { key, source_name } => {
                let root = self.folders.root_for(key)?;
                let name = naming::sanitize_name(source_name);
                self.resolver.resolve(&name, root).await?
            }
            UploadTarget::Path { key, segments } => {
                let root = self.folders.root_for(key)?;
                let segments: Vec<&str> = segments.iter().map(|s| s.trim()).collect();
                self.resolver.resolve_path(&segments, root).await?
            }
        };

        debug!("目标已解析: {:?} -> {}", target, folder_id);
        Ok(folder_id)
    }

    /// 在 `parent` 下查找或创建名为 `name` 的文件夹
    pub async fn resolve_folder(
        &self,
        name: &str,
        parent: &UploadTarget,
    ) -> Result<String, ProvisionError> {
        if name.trim().is_empty() {
            return Err(ProvisionError::invalid("name", "不能为空"));
        }
        let parent_id = self.resolve_target(parent).await?;
        Ok(self.resolver.resolve(name.trim(), &parent_id).await?)
    }

    /// 在 `parent` 下创建整棵文件夹树（非幂等）
    pub async fn create_folder_tree(
        &self,
        spec: &FolderTreeSpec,
        parent: &UploadTarget,
    ) -> Result<BuiltTree, ProvisionError> {
        ProvisionError::check(spec.validate())?;
        let parent_id = self.resolve_target(parent).await?;
        Ok(self.trees.build_tree(spec, &parent_id).await?)
    }

    /// 单文件上传
    ///
    /// 解析与上传的远程错误直接返回；授权失败不影响已上传的文件，随结果一起返回
    pub async fn upload_single(
        &self,
        item: &UploadItem,
        target: &UploadTarget,
        make_public: bool,
    ) -> Result<SingleUpload, ProvisionError> {
        ProvisionError::check(item.validate("file", &self.upload))?;

        let folder_id = self.resolve_target(target).await?;
        let file = self.orchestrator.upload_one(item, &folder_id).await?;

        let mut status = UploadItemStatus::Succeeded;
        let mut permission_failure = None;
        if make_public {
            match self.permissions.make_public_read(&file.id).await {
                Ok(()) => status = UploadItemStatus::PermissionsGranted,
                Err(e) => {
                    warn!("授予公开只读失败: id={}, name={}, 错误: {}", file.id, file.name, e);
                    permission_failure = Some(PermissionFailure {
                        file_id: file.id.clone(),
                        file_name: file.name.clone(),
                        error_message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "单文件上传完成: name={}, id={}, folder={}",
            file.name, file.id, folder_id
        );
        Ok(SingleUpload {
            file,
            status,
            permission_failure,
        })
    }

    /// 批量上传：校验 → 解析目标一次 → 并发或顺序上传
    pub async fn upload_batch(
        &self,
        items: &[UploadItem],
        target: &UploadTarget,
        mode: Option<UploadMode>,
        make_public: bool,
    ) -> Result<BatchResult, ProvisionError> {
        self.validate_items(items)?;

        let folder_id = self.resolve_target(target).await?;
        let options = BatchOptions {
            mode: mode.unwrap_or(self.upload.default_mode),
            make_public,
        };
        self.orchestrator.upload_batch(items, &folder_id, options).await
    }

    /// 工资单上传：`<year>/<MM>/<category>`，顺序执行
    pub async fn upload_payroll(
        &self,
        request: &PayrollRequest,
        items: &[UploadItem],
    ) -> Result<BatchResult, ProvisionError> {
        let mut errors = request.validate(&self.payroll);
        errors.extend(self.item_errors(items));
        ProvisionError::check(errors)?;

        let target = UploadTarget::Path {
            key: self.payroll.folder_key.clone(),
            segments: request.segments(),
        };
        let folder_id = self.resolve_target(&target).await?;

        info!(
            "工资单上传: {}/{:02}/{}, {} 个文件",
            request.year,
            request.month,
            request.category,
            items.len()
        );
        self.orchestrator
            .upload_batch(items, &folder_id, BatchOptions::new(UploadMode::Sequential))
            .await
    }

    fn validate_items(&self, items: &[UploadItem]) -> Result<(), ProvisionError> {
        ProvisionError::check(self.item_errors(items))
    }

    fn item_errors(&self, items: &[UploadItem]) -> Vec<FieldError> {
        if items.is_empty() {
            return vec![FieldError::new("files", "至少需要一个文件")];
        }
        items
            .iter()
            .enumerate()
            .flat_map(|(i, item)| item.validate(&format!("files[{}]", i), &self.upload))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netdisk::MemoryStore;
    use crate::provision::naming::FixedClock;
    use crate::uploader::BatchOutcome;
    use chrono::{TimeZone, Utc};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.folders = FolderMap::new()
            .with("alert_images", "root")
            .with("payroll", "payroll-root");
        config.upload.allowed_mime_types = vec!["application/pdf".to_string(), "image/*".to_string()];
        config
    }

    fn setup() -> (Arc<MemoryStore>, ProvisionService) {
        let store = Arc::new(MemoryStore::new());
        store.add_root("payroll-root");
        // 2025-03-14 23:30 UTC = 2025-03-15 00:30 Europe/Madrid
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 3, 14, 23, 30, 0).unwrap());
        let service =
            ProvisionService::with_clock(store.clone(), &config(), Arc::new(clock)).unwrap();
        (store, service)
    }

    fn pdf(name: &str) -> UploadItem {
        UploadItem::new(name, "application/pdf", b"%PDF-1.7".to_vec())
    }

    #[tokio::test]
    async fn test_day_folder_uses_fixed_timezone() {
        let (store, service) = setup();

        let id = service
            .resolve_target(&UploadTarget::day_folder("alert_images"))
            .await
            .unwrap();

        let folder = store.folders().into_iter().find(|f| f.id == id).unwrap();
        assert_eq!(folder.name, "15-03-2025");
        assert_eq!(folder.parent_id, "root");
    }

    #[tokio::test]
    async fn test_batch_resolves_day_folder_once() {
        let (store, service) = setup();

        let batch = service
            .upload_batch(
                &[pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")],
                &UploadTarget::day_folder("alert_images"),
                Some(UploadMode::Sequential),
                false,
            )
            .await
            .unwrap();

        assert_eq!(store.create_folder_calls(), 1);
        assert_eq!(batch.outcome(), Some(BatchOutcome::AllSucceeded));
        assert!(store.files().iter().all(|f| f.parent_id == batch.folder_id));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_store_call() {
        let (store, service) = setup();

        let items = vec![
            pdf("ok.pdf"),
            UploadItem::new("empty.pdf", "application/pdf", Vec::new()),
            UploadItem::new("sheet.csv", "text/csv", b"a,b".to_vec()),
        ];
        let err = service
            .upload_batch(&items, &UploadTarget::day_folder("alert_images"), None, false)
            .await
            .unwrap_err();

        match err {
            ProvisionError::Validation(fields) => {
                assert!(fields.iter().any(|f| f.field == "files[1]"));
                assert!(fields.iter().any(|f| f.field == "files[2].mime_type"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.folders().is_empty());
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let (_store, service) = setup();
        let err = service
            .upload_batch(&[], &UploadTarget::day_folder("alert_images"), None, false)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_missing_folder_mapping_is_configuration_error() {
        let (store, service) = setup();
        let err = service
            .upload_batch(
                &[pdf("a.pdf")],
                &UploadTarget::Key {
                    key: "intrastat_purchases".to_string(),
                },
                None,
                false,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Configuration(_)));
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_folder_id_target_must_be_folder() {
        let (store, service) = setup();

        let file = service
            .upload_single(&pdf("a.pdf"), &UploadTarget::folder_id("root"), false)
            .await
            .unwrap();

        let err = service
            .resolve_target(&UploadTarget::folder_id(file.file.id.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));

        let err = service
            .resolve_target(&UploadTarget::folder_id("nope"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(store.files().len(), 1);
    }

    #[tokio::test]
    async fn test_trashed_folder_id_rejected() {
        let (store, service) = setup();
        let id = service
            .resolve_folder("old", &UploadTarget::Key { key: "alert_images".into() })
            .await
            .unwrap();
        store.trash_folder(&id);

        let err = service
            .resolve_target(&UploadTarget::folder_id(id))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_derived_folder_name() {
        let (store, service) = setup();
        let id = service
            .resolve_target(&UploadTarget::DerivedFrom {
                key: "alert_images".to_string(),
                source_name: "Ventas Marzo.xlsx".to_string(),
            })
            .await
            .unwrap();

        let folder = store.folders().into_iter().find(|f| f.id == id).unwrap();
        assert_eq!(folder.name, "Ventas_Marzo");
    }

    #[tokio::test]
    async fn test_upload_single_public() {
        let (store, service) = setup();
        let image = UploadItem::new("alert.jpg", "image/jpeg", b"jpg".to_vec());

        let upload = service
            .upload_single(&image, &UploadTarget::day_folder("alert_images"), true)
            .await
            .unwrap();
        assert!(store.is_public(&upload.file.id));
        assert_eq!(upload.status, UploadItemStatus::PermissionsGranted);
        assert!(upload.permission_failure.is_none());
    }

    #[tokio::test]
    async fn test_upload_single_keeps_file_when_grant_fails() {
        let (store, service) = setup();
        store.fail_permission_for("alert.png");
        let image = UploadItem::new("alert.png", "image/png", b"png".to_vec());

        let upload = service
            .upload_single(&image, &UploadTarget::day_folder("alert_images"), true)
            .await
            .unwrap();

        assert_eq!(store.files().len(), 1);
        assert!(!store.is_public(&upload.file.id));
        assert_eq!(upload.status, UploadItemStatus::Succeeded);
        let failure = upload.permission_failure.clone().unwrap();
        assert_eq!(failure.file_id, upload.file.id);
        assert_eq!(failure.file_name, "alert.png");

        let json = serde_json::to_value(&upload).unwrap();
        assert_eq!(json["name"], "alert.png");
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["permission_failure"]["file_name"], "alert.png");
    }

    #[tokio::test]
    async fn test_upload_single_propagates_store_error() {
        let (store, service) = setup();
        store.fail_uploads_named("a.pdf");

        let err = service
            .upload_single(&pdf("a.pdf"), &UploadTarget::Key { key: "alert_images".into() }, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::RemoteStore(_)));
    }

    #[tokio::test]
    async fn test_payroll_path() {
        let (store, service) = setup();
        let request = PayrollRequest {
            year: 2025,
            month: 3,
            category: "resumenes".to_string(),
        };

        let batch = service
            .upload_payroll(&request, &[pdf("enero.pdf"), pdf("febrero.pdf")])
            .await
            .unwrap();
        assert_eq!(batch.outcome(), Some(BatchOutcome::AllSucceeded));

        let folders = store.folders();
        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["2025", "03", "resumenes"]);
        assert_eq!(folders[0].parent_id, "payroll-root");
        assert_eq!(folders[2].id, batch.folder_id);

        // 再次上传复用同一路径
        service
            .upload_payroll(&request, &[pdf("marzo.pdf")])
            .await
            .unwrap();
        assert_eq!(store.folders().len(), 3);
    }

    #[tokio::test]
    async fn test_payroll_validation() {
        let (store, service) = setup();
        let request = PayrollRequest {
            year: 1999,
            month: 13,
            category: "vacaciones".to_string(),
        };

        let err = service.upload_payroll(&request, &[]).await.unwrap_err();
        match err {
            ProvisionError::Validation(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["year", "month", "category", "files"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.folders().is_empty());
    }

    #[tokio::test]
    async fn test_create_folder_tree_under_key() {
        let (store, service) = setup();
        let spec = FolderTreeSpec::node(
            "Cliente",
            vec![FolderTreeSpec::leaf("Facturas"), FolderTreeSpec::leaf("Contratos")],
        );

        let built = service
            .create_folder_tree(&spec, &UploadTarget::Key { key: "alert_images".into() })
            .await
            .unwrap();

        assert_eq!(built.folders.len(), 3);
        assert_eq!(built.folders[0].parent_id, "root");
        assert_eq!(store.folder_count(), 3);
    }

    #[tokio::test]
    async fn test_create_folder_tree_rejects_blank_names() {
        let (store, service) = setup();
        let spec = FolderTreeSpec::node("Cliente", vec![FolderTreeSpec::leaf("  ")]);

        let err = service
            .create_folder_tree(&spec, &UploadTarget::Key { key: "alert_images".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
        assert_eq!(store.folder_count(), 0);
    }

    #[test]
    fn test_target_deserialize() {
        let target: UploadTarget =
            serde_json::from_str(r#"{"kind":"day_folder","key":"alert_images"}"#).unwrap();
        assert_eq!(target, UploadTarget::day_folder("alert_images"));

        let target: UploadTarget = serde_json::from_str(
            r#"{"kind":"path","key":"payroll","segments":["2025","03"]}"#,
        )
        .unwrap();
        assert!(matches!(target, UploadTarget::Path { .. }));
    }
}
