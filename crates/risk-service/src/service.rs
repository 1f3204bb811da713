use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use metrics_store::{open_store, MetricsStore, StorageConfig};
use risk_classifier::RiskClassifier;
use risk_core::{
    Business, BusinessId, CheckinHistoryEntry, CheckinReceipt, DailyCheckin, FinancialInput,
    NewBusiness, RiskError, RiskResult, RollingMetricsSnapshot, RollingWindow,
};
use risk_pipeline::{PredictionMode, RiskAssessment, RiskPipeline};
use rule_engine::RuleOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{prepare_sqlite_dir, ServiceConfig};

/// One day's figures as submitted by an owner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckinRequest {
    pub business_id: BusinessId,
    /// Defaults to today (local time)
    #[serde(default)]
    pub checkin_date: Option<NaiveDate>,
    pub daily_sales: f64,
    pub daily_expenses: f64,
    #[serde(default)]
    pub receivables: f64,
    #[serde(default)]
    pub loan_emi: f64,
    #[serde(default)]
    pub cash_balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub business_id: Option<BusinessId>,
    #[serde(default)]
    pub figures: FinancialInput,
    #[serde(default)]
    pub mode: PredictionMode,
    #[serde(default)]
    pub explain: bool,
}

/// Storage plus pipeline: every operation the front end calls.
#[derive(Clone)]
pub struct RiskService {
    store: Arc<dyn MetricsStore>,
    pipeline: RiskPipeline,
    history_limit: usize,
}

impl RiskService {
    pub fn new(store: Arc<dyn MetricsStore>, pipeline: RiskPipeline) -> Self {
        Self {
            store,
            pipeline,
            history_limit: metrics_store::DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Load the model, open storage and build the generator chain.
    pub async fn bootstrap(config: &ServiceConfig) -> Result<Self> {
        let classifier = RiskClassifier::load(&config.model_path, config.model_sha256.as_deref())
            .with_context(|| {
                format!("Failed to load risk model from {}", config.model_path.display())
            })?;
        tracing::info!(
            model = classifier.source(),
            sha256 = classifier.sha256(),
            "Risk model loaded"
        );

        if let StorageConfig::Sql { database_url } = &config.storage {
            prepare_sqlite_dir(database_url)?;
        }
        let store = open_store(&config.storage)
            .await
            .context("Failed to open metrics store")?;

        let generator = config.generation.build_chain();
        if generator.is_none() {
            tracing::info!("Text generation disabled, template explanations only");
        }

        let pipeline = RiskPipeline::new(Arc::new(classifier)).with_generator(generator);
        Ok(Self::new(store, pipeline).with_history_limit(config.history_limit))
    }

    pub fn store(&self) -> &Arc<dyn MetricsStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &RiskPipeline {
        &self.pipeline
    }

    pub async fn register(&self, name: &str, email: &str) -> RiskResult<Business> {
        let business = self.store.create_business(&NewBusiness::new(name, email)).await?;
        tracing::info!(business_id = business.id, "Business registered");
        Ok(business)
    }

    /// Look a business up by email. `None` when nobody registered it.
    pub async fn login(&self, email: &str) -> RiskResult<Option<Business>> {
        let email = email.trim();
        if email.is_empty() {
            return Err(RiskError::Validation("email is required".into()));
        }
        self.store.find_business_by_email(email).await
    }

    pub async fn get_business(&self, id: BusinessId) -> RiskResult<Business> {
        self.store
            .get_business(id)
            .await?
            .ok_or(RiskError::NotFound(id))
    }

    pub async fn submit_checkin(&self, request: &CheckinRequest) -> RiskResult<CheckinReceipt> {
        let checkin = DailyCheckin {
            business_id: request.business_id,
            checkin_date: request.checkin_date.unwrap_or_else(today),
            daily_sales: request.daily_sales,
            daily_expenses: request.daily_expenses,
            receivables: request.receivables,
            loan_emi: request.loan_emi,
            cash_balance: request.cash_balance,
        };
        let receipt = self.store.upsert_checkin(&checkin).await?;
        tracing::info!(
            business_id = checkin.business_id,
            date = %checkin.checkin_date,
            updated = receipt.updated,
            window_days = receipt.snapshot.window_days,
            "Check-in stored"
        );
        Ok(receipt)
    }

    pub async fn metrics(&self, id: BusinessId) -> RiskResult<Option<RollingMetricsSnapshot>> {
        self.store.snapshot(id).await
    }

    pub async fn history(
        &self,
        id: BusinessId,
        limit: Option<usize>,
    ) -> RiskResult<Vec<CheckinHistoryEntry>> {
        let limit = limit.unwrap_or(self.history_limit).max(1);
        self.store.history(id, limit).await
    }

    pub async fn rolling_window(
        &self,
        id: BusinessId,
        as_of: Option<NaiveDate>,
    ) -> RiskResult<RollingWindow> {
        self.store
            .rolling_window(id, as_of.unwrap_or_else(today))
            .await
    }

    pub fn check_input(&self, input: &FinancialInput) -> RuleOutcome {
        self.pipeline.check_input(input)
    }

    pub async fn predict(&self, request: &PredictionRequest) -> RiskResult<RiskAssessment> {
        let input = self.resolve_input(request).await?;
        Ok(self.pipeline.assess(&input, request.explain).await)
    }

    /// Pick the figures a prediction runs on.
    pub async fn resolve_input(&self, request: &PredictionRequest) -> RiskResult<FinancialInput> {
        if let Some(id) = request.business_id {
            self.get_business(id).await?;
        }

        match (request.mode, request.business_id) {
            (PredictionMode::Manual, _) => Ok(request.figures.clone()),
            (PredictionMode::Auto, None) => Ok(request.figures.clone()),
            (PredictionMode::Auto, Some(_)) if !request.figures.is_empty() => {
                Ok(request.figures.clone())
            }
            (PredictionMode::Auto, Some(id)) | (PredictionMode::Rolling, Some(id)) => {
                self.rolling_input(id, &request.figures).await
            }
            (PredictionMode::Rolling, None) => Err(RiskError::Validation(
                "rolling predictions need a business id".into(),
            )),
        }
    }

    /// Window sales and expenses, with receivables, EMI and cash taken from
    /// the supplied figures first and the cached snapshot second.
    async fn rolling_input(
        &self,
        id: BusinessId,
        supplied: &FinancialInput,
    ) -> RiskResult<FinancialInput> {
        let snapshot = self.store.snapshot(id).await?;
        let as_of = snapshot
            .as_ref()
            .map(|s| s.last_checkin_date)
            .unwrap_or_else(today);
        let window = self.store.rolling_window(id, as_of).await?;

        let from_window = if window.current_days > 0 {
            FinancialInput::from(&window)
        } else {
            FinancialInput::default()
        };
        let supplied_balances = FinancialInput {
            receivables: supplied.receivables,
            loan_emi: supplied.loan_emi,
            cash_balance: supplied.cash_balance,
            ..Default::default()
        };
        let from_snapshot = snapshot
            .as_ref()
            .map(FinancialInput::from)
            .unwrap_or_default();

        tracing::debug!(
            business_id = id,
            as_of = %as_of,
            current_days = window.current_days,
            prior_days = window.prior_days,
            "Resolved rolling figures"
        );
        Ok(from_window.or(&supplied_balances).or(&from_snapshot))
    }
}

impl std::fmt::Debug for RiskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskService")
            .field("store", &self.store.backend_name())
            .field("pipeline", &self.pipeline)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
