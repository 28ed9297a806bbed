//! bucket-console 主入口

use bucket_console::{
    auth::JwtService,
    config::{AppConfig, StorageBackendKind},
    handlers::health,
    middleware::AppState,
    repository::{
        AuditIndex, CognitoIdentityProvider, IdentityProvider, LocalObjectStore, ObjectStore,
        OpenSearchIndex, S3ObjectStore,
    },
    routes,
    services::{AccessPolicy, AuditQuery, AuthService, ResourceGateway},
    telemetry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("bucket-console {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量，不依赖 .env 文件
    if let Ok(env) = std::env::var("CONSOLE_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bucket-console starting...");

    // 3. 构建应用状态
    let app_state = build_state(config.clone())?;

    // 4. 构建路由
    let app = routes::create_router(app_state);

    // 5. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 6. 优雅关闭
    // 连接信息供 IP 白名单读取对端地址
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackendKind::S3 => Arc::new(S3ObjectStore::new(&config.aws, &config.storage)?),
        StorageBackendKind::Local => {
            tracing::warn!(
                path = %config.storage.local_path,
                "Using local filesystem storage backend"
            );
            Arc::new(LocalObjectStore::new(&config.storage.local_path))
        }
    };
    let index: Arc<dyn AuditIndex> = Arc::new(OpenSearchIndex::new(&config.audit, &config.aws)?);
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(CognitoIdentityProvider::new(&config.identity, &config.aws)?);

    let policy = AccessPolicy::new(config.buckets.clone());
    let jwt_service = Arc::new(JwtService::from_config(&config)?);

    tracing::info!(
        buckets = ?config.buckets.names(),
        role_resolution = ?config.identity.role_resolution,
        "Services initialized"
    );

    Ok(Arc::new(AppState {
        gateway: Arc::new(ResourceGateway::new(store, policy.clone())),
        audit_query: Arc::new(AuditQuery::new(index)),
        auth_service: Arc::new(AuthService::new(
            identity,
            jwt_service.clone(),
            config.identity.role_resolution,
        )),
        jwt_service,
        policy,
        config,
    }))
}

/// 优雅关闭信号处理
///
/// 收到信号后开始关闭，超过超时时间仍未结束则强制退出。
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("bucket-console {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: bucket-console [--version | --help]");
    println!();
    println!("All configuration is read from CONSOLE_* environment variables");
    println!("(nested keys use '__', e.g. CONSOLE_BUCKETS__PUBLIC).");
}
