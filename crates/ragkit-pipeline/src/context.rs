use parking_lot::RwLock;
use std::sync::Arc;

use ragkit_core::clock::Clock;
use ragkit_core::config::RagConfig;
use ragkit_core::Result;
use ragkit_rerank::Reranker;

use crate::metrics::PipelineMetrics;

/// One consistent view of the tunables: the configuration and the reranker
/// built from it are always swapped together.
#[derive(Clone)]
pub struct ActiveSettings {
    pub config: Arc<RagConfig>,
    pub reranker: Arc<Reranker>,
}

impl ActiveSettings {
    fn build(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let reranker = Reranker::from_config(&config.rerank)?;
        Ok(Self { config: Arc::new(config), reranker: Arc::new(reranker) })
    }
}

/// State shared by every request: the active settings, the metrics sink and
/// the time source.
pub struct RagContext {
    active: RwLock<ActiveSettings>,
    metrics: PipelineMetrics,
    clock: Arc<dyn Clock>,
}

impl RagContext {
    pub fn new(config: RagConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            active: RwLock::new(ActiveSettings::build(config)?),
            metrics: PipelineMetrics::default(),
            clock,
        })
    }

    /// The settings in force when this is called. In-flight requests keep
    /// the snapshot they started with.
    pub fn active(&self) -> ActiveSettings {
        self.active.read().clone()
    }

    pub fn config(&self) -> Arc<RagConfig> {
        self.active.read().config.clone()
    }

    /// Validate `config` and build its reranker without installing it.
    pub(crate) fn prepare(config: RagConfig) -> Result<ActiveSettings> {
        ActiveSettings::build(config)
    }

    pub(crate) fn install(&self, settings: ActiveSettings) {
        *self.active.write() = settings;
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
