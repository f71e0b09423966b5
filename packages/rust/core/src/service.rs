//! The funnel as a service: matcher lookups plus display-text rephrasing.
//!
//! [`FunnelBackend`] is the seam the conversation wizard talks through.
//! [`FunnelService`] answers in-process; [`HttpBackend`](crate::client::HttpBackend)
//! forwards to a running server, which itself wraps a `FunnelService`.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use servicefunnel_dataset::LoadOptions;
use servicefunnel_shared::{
    AppConfig, FunnelStep, NextStep, RephraseConfig, Result, StepReply, rephrase_api_key,
};
use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::client::HttpBackend;
use crate::rephrase::ChatRephraser;

/// Something that can run one funnel turn.
pub trait FunnelBackend {
    /// First question of a category.
    fn start(&self, category_id: &str) -> impl Future<Output = Result<FunnelStep>> + Send;

    /// Next question, or the service id once `answers` completes a funnel.
    fn answer(
        &self,
        category_id: &str,
        answers: &[String],
    ) -> impl Future<Output = Result<StepReply>> + Send;
}

/// Matcher over a loaded catalog, with optional question rephrasing.
#[derive(Debug, Clone)]
pub struct FunnelService {
    catalog: Arc<Catalog>,
    rephraser: Option<ChatRephraser>,
}

impl FunnelService {
    /// A service that shows questions exactly as the dataset words them.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            rephraser: None,
        }
    }

    /// Attach a rephraser.
    pub fn with_rephraser(mut self, rephraser: ChatRephraser) -> Self {
        self.rephraser = Some(rephraser);
        self
    }

    /// Build a service, enabling rephrasing when configured and a key is available.
    pub fn from_config(catalog: Arc<Catalog>, config: &RephraseConfig) -> Self {
        let service = Self::new(catalog);
        if !config.enabled {
            info!("question rephrasing disabled by config");
            return service;
        }

        let api_key = match rephrase_api_key(config) {
            Ok(key) => key,
            Err(e) => {
                info!(reason = %e, "question rephrasing disabled");
                return service;
            }
        };

        match ChatRephraser::new(config, api_key) {
            Ok(rephraser) => {
                info!(model = %rephraser.model(), "question rephrasing enabled");
                service.with_rephraser(rephraser)
            }
            Err(e) => {
                warn!(error = %e, "question rephrasing unavailable");
                service
            }
        }
    }

    /// Load the configured dataset, or `dataset` when given, and build a
    /// service over it. Prefix-tree ambiguities are logged, not rejected.
    pub fn load(config: &AppConfig, dataset: Option<&Path>, rephrase: bool) -> Result<Self> {
        let path = dataset.unwrap_or_else(|| Path::new(&config.dataset.path));
        let opts = LoadOptions {
            sheet: config.dataset.sheet.clone(),
        };
        let catalog = Catalog::load(path, &opts)?;

        for ambiguity in catalog.ambiguities() {
            warn!(
                category_id = %ambiguity.category_id,
                winner = %ambiguity.winner,
                shadowed = %ambiguity.shadowed,
                "ambiguous funnels, later record is shadowed"
            );
        }

        let catalog = Arc::new(catalog);
        if rephrase {
            Ok(Self::from_config(catalog, &config.rephrase))
        } else {
            info!("question rephrasing disabled by flag");
            Ok(Self::new(catalog))
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn rephrasing_enabled(&self) -> bool {
        self.rephraser.is_some()
    }

    /// Text to show for `question`: the rephrased version when that works,
    /// otherwise the question itself.
    pub async fn display_question(&self, question: &str) -> String {
        let Some(rephraser) = &self.rephraser else {
            return question.to_string();
        };

        match rephraser.rephrase(question).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                warn!(%question, "rephrasing returned no text, using literal question");
                question.to_string()
            }
            Err(e) => {
                warn!(%question, error = %e, "rephrasing failed, using literal question");
                question.to_string()
            }
        }
    }

    async fn displayed(&self, step: FunnelStep) -> FunnelStep {
        FunnelStep {
            question: self.display_question(&step.question).await,
            options: step.options,
        }
    }
}

impl FunnelBackend for FunnelService {
    #[instrument(skip(self))]
    async fn start(&self, category_id: &str) -> Result<FunnelStep> {
        let step = self.catalog.first_question(category_id)?;
        Ok(self.displayed(step).await)
    }

    #[instrument(skip(self), fields(depth = answers.len()))]
    async fn answer(&self, category_id: &str, answers: &[String]) -> Result<StepReply> {
        match self.catalog.next_step(category_id, answers)? {
            NextStep::Question(step) => Ok(self.displayed(step).await.into()),
            NextStep::Complete { service_id } => {
                info!(category_id, %service_id, "service matched");
                Ok(StepReply::complete(service_id))
            }
        }
    }
}

/// Either backend, picked at runtime from command-line flags.
#[derive(Debug, Clone)]
pub enum Backend {
    Local(FunnelService),
    Remote(HttpBackend),
}

impl Backend {
    /// Short human label for status lines and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Local(service) => format!("local dataset ({} records)", service.catalog().len()),
            Self::Remote(http) => format!("server {}", http.base_url()),
        }
    }
}

impl FunnelBackend for Backend {
    async fn start(&self, category_id: &str) -> Result<FunnelStep> {
        match self {
            Self::Local(service) => service.start(category_id).await,
            Self::Remote(http) => http.start(category_id).await,
        }
    }

    async fn answer(&self, category_id: &str, answers: &[String]) -> Result<StepReply> {
        match self {
            Self::Local(service) => service.answer(category_id, answers).await,
            Self::Remote(http) => http.answer(category_id, answers).await,
        }
    }
}
