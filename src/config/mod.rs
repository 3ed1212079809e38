// 配置管理模块

pub mod folders;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub use folders::FolderMap;

use crate::uploader::UploadMode;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 远程存储配置
    #[serde(default)]
    pub store: StoreConfig,
    /// 命名配置
    #[serde(default)]
    pub naming: NamingConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 逻辑键 → 根文件夹 id
    #[serde(default)]
    pub folders: FolderMap,
    /// 工资单文件夹配置
    #[serde(default)]
    pub payroll: PayrollConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 50MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// CORS允许的源
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// 请求体大小上限（字节）
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

fn default_body_limit() -> usize {
    100 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18890,
            cors_origins: vec!["*".to_string()],
            body_limit: default_body_limit(),
        }
    }
}

/// 远程存储后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// HTTP API
    #[default]
    Drive,
    /// 进程内存储（本地试运行，无需凭证）
    Memory,
}

/// 远程存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// 元数据 API 地址
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// 上传 API 地址
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,
    /// 访问令牌（留空时从环境变量读取）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// 保存访问令牌的环境变量名
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    /// 单次远程调用的截止时间（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_upload_base_url() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}

fn default_access_token_env() -> String {
    "DRIVE_ACCESS_TOKEN".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            api_base_url: default_api_base_url(),
            upload_base_url: default_upload_base_url(),
            access_token: None,
            access_token_env: default_access_token_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// 获取访问令牌：优先配置文件，其次环境变量
    pub fn resolve_access_token(&self) -> Result<String> {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.trim().is_empty()) {
            return Ok(token.clone());
        }
        std::env::var(&self.access_token_env).with_context(|| {
            format!(
                "未配置访问令牌: store.access_token 为空且环境变量 {} 未设置",
                self.access_token_env
            )
        })
    }
}

/// 命名配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// 日期文件夹使用的固定时区（IANA 名称）
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "Europe/Madrid".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl NamingConfig {
    /// 解析时区
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("无效的时区 {}: {}", self.timezone, e))
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 未指定时的执行方式
    #[serde(default)]
    pub default_mode: UploadMode,
    /// 单个文件大小上限（字节）
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// 允许的 MIME 类型（支持 `image/*`，空表示允许所有）
    #[serde(default)]
    pub allowed_mime_types: Vec<String>,
}

fn default_max_file_size() -> u64 {
    25 * 1024 * 1024 // 25MB
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_mode: UploadMode::default(),
            max_file_size: default_max_file_size(),
            allowed_mime_types: Vec::new(),
        }
    }
}

impl UploadConfig {
    /// MIME 类型是否被允许
    pub fn accepts_mime_type(&self, mime_type: &str) -> bool {
        if self.allowed_mime_types.is_empty() {
            return true;
        }
        let mime_type = mime_type.trim().to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|allowed| {
            let allowed = allowed.trim().to_ascii_lowercase();
            match allowed.strip_suffix("/*") {
                Some(prefix) => mime_type
                    .split_once('/')
                    .map(|(top, _)| top == prefix)
                    .unwrap_or(false),
                None => allowed == mime_type,
            }
        })
    }
}

/// 工资单文件夹配置（年/月/类别）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollConfig {
    /// 根文件夹在 `folders` 中的逻辑键
    #[serde(default = "default_payroll_folder_key")]
    pub folder_key: String,
    /// 允许的类别
    #[serde(default = "default_payroll_categories")]
    pub categories: Vec<String>,
}

fn default_payroll_folder_key() -> String {
    "payroll".to_string()
}

fn default_payroll_categories() -> Vec<String> {
    vec![
        "nominas".to_string(),
        "resumenes".to_string(),
        "seguros_sociales".to_string(),
    ]
}

impl Default for PayrollConfig {
    fn default() -> Self {
        Self {
            folder_key: default_payroll_folder_key(),
            categories: default_payroll_categories(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("配置文件校验失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.validate().context("保存配置失败")?;

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("创建配置目录失败: {:?}", parent))?;
            }
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                let default_config = Self::default();

                if !std::path::Path::new(path).exists() {
                    if let Err(e) = default_config.save_to_file(path).await {
                        tracing::error!("保存默认配置失败: {:#}", e);
                    }
                }

                default_config
            }
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        self.naming.tz()?;

        if self.store.request_timeout_secs == 0 {
            anyhow::bail!("store.request_timeout_secs 必须大于 0");
        }
        if self.upload.max_file_size == 0 {
            anyhow::bail!("upload.max_file_size 必须大于 0");
        }
        if self.payroll.categories.iter().any(|c| c.trim().is_empty()) {
            anyhow::bail!("payroll.categories 不能包含空类别");
        }

        Ok(())
    }
}
