use drive_provisioner::{
    config::{AppConfig, LogConfig, DEFAULT_CONFIG_PATH},
    logging, server, AppState,
};
use tracing::info;

/// 加载日志配置
///
/// 日志系统要在完整配置之前初始化，这里只读取 `[log]` 段，失败时返回默认配置
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(DEFAULT_CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = load_log_config().await;

    // 必须保持 _log_guard 存活
    let _log_guard = logging::init_logging(&log_config);

    info!(
        "{} v{} 启动中...",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await;
    config.validate()?;

    if config.folders.is_empty() {
        tracing::warn!("未配置任何文件夹映射 ([folders])，按逻辑键上传将返回配置错误");
    } else {
        info!(
            "文件夹映射: {}",
            config.folders.keys().collect::<Vec<_>>().join(", ")
        );
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config)?;
    info!("应用状态初始化完成");

    let app = server::build_router(app_state);

    info!("服务器启动在: http://{}", addr);
    info!("API 基础路径: http://{}/api/v1", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始关闭...");
        }
    }

    info!("应用已退出");
    Ok(())
}
