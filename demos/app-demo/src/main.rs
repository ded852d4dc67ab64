use autodi_core::prelude::*;
use autodi_macros::{registration_functions, AutoRegister, Injectable};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const CONFIG_FILE: &str = "autodi.toml";

// ==================== 基础服务 ====================

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u128;
}

#[derive(Injectable, AutoRegister)]
#[autodi(singleton, interface = dyn Clock)]
struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    }
}

pub trait Repository: Send + Sync {
    fn name(&self) -> &str;
    fn find_orders(&self) -> Vec<String>;
}

/// 开发环境使用的内存仓库
#[derive(Injectable, AutoRegister)]
#[autodi(singleton, interface = dyn Repository, filters = "dev,!prod")]
struct InMemoryRepository;

impl Repository for InMemoryRepository {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn find_orders(&self) -> Vec<String> {
        vec!["order-1001".to_string(), "order-1002".to_string()]
    }
}

/// 生产环境使用的只读副本
#[derive(Injectable, AutoRegister)]
#[autodi(singleton, interface = dyn Repository, filters = "prod")]
struct ReplicaRepository;

impl Repository for ReplicaRepository {
    fn name(&self) -> &str {
        "replica"
    }

    fn find_orders(&self) -> Vec<String> {
        Vec::new()
    }
}

// ==================== 自定义注册 ====================

#[derive(Debug)]
struct MetricsRegistry {
    namespace: String,
    recorded: AtomicUsize,
}

impl MetricsRegistry {
    fn record(&self) -> usize {
        self.recorded.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(AutoRegister)]
#[autodi(custom = "install")]
struct Metrics;

#[registration_functions]
impl Metrics {
    /// 命名空间取自描述符的过滤标签
    fn install(services: &mut ServiceCollection, descriptor: &RegistrationDescriptor) {
        let namespace = if descriptor.filters().is_empty() {
            "demo".to_string()
        } else {
            descriptor.filters().to_string()
        };

        services.add_instance(Arc::new(MetricsRegistry {
            namespace,
            recorded: AtomicUsize::new(0),
        }));
    }
}

// ==================== 业务服务 ====================

static REQUEST_IDS: AtomicUsize = AtomicUsize::new(1);

/// 每个 scope 一个请求上下文
#[derive(AutoRegister)]
#[autodi(scoped)]
struct RequestContext {
    id: usize,
}

impl Injectable for RequestContext {
    fn construct(_: &ServiceProvider) -> ContainerResult<Self> {
        Ok(RequestContext {
            id: REQUEST_IDS.fetch_add(1, Ordering::SeqCst),
        })
    }
}

#[derive(Injectable, AutoRegister)]
#[autodi(transient)]
struct ReportService {
    #[inject]
    repository: Arc<dyn Repository>,
    #[inject]
    clock: Arc<dyn Clock>,
    #[inject]
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ReportService {
    fn build(&self, request: &RequestContext) -> String {
        if let Some(metrics) = &self.metrics {
            let count = metrics.record();
            tracing::debug!("[{}] reports built: {}", metrics.namespace, count);
        }

        format!(
            "request #{} at {}: {} order(s) from {}",
            request.id,
            self.clock.now_millis(),
            self.repository.find_orders().len(),
            self.repository.name()
        )
    }
}

// ==================== 托管服务 ====================

/// 心跳服务 - 单例 + 托管服务，共享同一实例
#[derive(Injectable, AutoRegister)]
#[autodi_hosted_singleton]
struct Heartbeat {
    beats: Arc<AtomicUsize>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    fn beats(&self) -> usize {
        self.beats.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostedService for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn start(&self) -> anyhow::Result<()> {
        let beats = Arc::clone(&self.beats);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(100));
            loop {
                interval.tick().await;
                let count = beats.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!("heartbeat #{}", count);
            }
        });

        *self.task.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        tracing::info!("Heartbeat stopped after {} beat(s)", self.beats());
        Ok(())
    }
}

/// 缓存预热 - 仅开发环境
#[derive(Injectable, AutoRegister)]
#[autodi_hosted(filters = "dev")]
struct CacheWarmer;

#[async_trait]
impl HostedService for CacheWarmer {
    fn name(&self) -> &str {
        "cache-warmer"
    }

    async fn start(&self) -> anyhow::Result<()> {
        tracing::info!("Cache warmed");
        Ok(())
    }
}

fn load_config() -> anyhow::Result<Option<String>> {
    let path = std::path::Path::new(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(std::fs::read_to_string(path)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    let logging = match &config {
        Some(content) => LoggingConfig::from_toml_str(content)?,
        None => LoggingConfig::from_env(),
    };
    logging.init()?;

    let settings = match &config {
        Some(content) => Settings::from_toml_str(content)?,
        None => Settings::default(),
    }
    .apply_env()?;
    tracing::info!("Active filters: [{}]", settings.filters());
    settings::configure(settings);

    // 扫描所有派生了 AutoRegister 的类型
    let mut services = ServiceCollection::new();
    services.auto_register_all()?;
    tracing::info!("{} registration(s) collected", services.len());

    let provider = services.build_provider();
    let mut host = Host::new(provider.clone());
    host.start().await?;
    tracing::info!("Running hosted services: {:?}", host.running_services());

    for _ in 0..2 {
        let scope = provider.create_scope();
        let request = scope.get_required::<RequestContext>()?;
        let report = scope.get_required::<ReportService>()?;
        tracing::info!("{}", report.build(&request));
    }

    tokio::time::sleep(Duration::from_millis(350)).await;

    let heartbeat = provider.get_required::<Heartbeat>()?;
    tracing::info!("Heartbeat so far: {} beat(s)", heartbeat.beats());

    if std::env::args().any(|arg| arg == "--serve") {
        host.stop().await;
        return Host::new(provider).run_until_shutdown().await;
    }

    host.stop().await;
    tracing::info!("Demo finished");
    Ok(())
}
