//! 托管服务
//!
//! 托管服务以 `dyn HostedService` 为服务标识注册，由 [`Host`] 统一启动和停止。

use async_trait::async_trait;
use std::sync::Arc;

use crate::{ContainerResult, ServiceProvider};

/// 长期运行的后台服务
#[async_trait]
pub trait HostedService: Send + Sync + 'static {
    /// 服务名称，用于日志
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 启动阶段
    async fn start(&self) -> anyhow::Result<()>;

    /// 停止阶段
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 托管服务宿主
///
/// 按注册顺序启动，逆序停止。
pub struct Host {
    provider: ServiceProvider,
    started: Vec<Arc<dyn HostedService>>,
}

impl Host {
    pub fn new(provider: ServiceProvider) -> Self {
        Self {
            provider,
            started: Vec::new(),
        }
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// 已启动的服务名称
    pub fn running_services(&self) -> Vec<&str> {
        self.started.iter().map(|s| s.name()).collect()
    }

    /// 解析并启动全部托管服务
    ///
    /// 某个服务启动失败时，已启动的服务会先被停止，再返回错误。
    pub async fn start(&mut self) -> anyhow::Result<()> {
        let services: Vec<Arc<dyn HostedService>> = self.resolve_services()?;
        tracing::info!("Starting {} hosted service(s)", services.len());

        for service in services {
            tracing::info!("Starting hosted service: {}", service.name());
            if let Err(e) = service.start().await {
                tracing::error!("Failed to start hosted service {}: {}", service.name(), e);
                self.stop().await;
                return Err(e.context(format!("hosted service '{}' failed to start", service.name())));
            }
            self.started.push(service);
        }

        Ok(())
    }

    /// 逆序停止已启动的服务，停止失败只记录日志
    pub async fn stop(&mut self) {
        while let Some(service) = self.started.pop() {
            tracing::info!("Stopping hosted service: {}", service.name());
            if let Err(e) = service.stop().await {
                tracing::error!("Failed to stop hosted service {}: {}", service.name(), e);
            }
        }
    }

    /// 启动服务并等待 Ctrl+C，收到信号后停止服务
    pub async fn run_until_shutdown(mut self) -> anyhow::Result<()> {
        self.start().await?;

        tracing::info!("Host started, press Ctrl+C to shut down");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown signal received");

        self.stop().await;
        Ok(())
    }

    fn resolve_services(&self) -> ContainerResult<Vec<Arc<dyn HostedService>>> {
        self.provider.get_all::<dyn HostedService>()
    }
}
