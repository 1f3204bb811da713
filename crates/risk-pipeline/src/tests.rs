#[cfg(test)]
mod pipeline_tests {
    use crate::explanation::{simplify, ExplanationSource};
    use crate::pipeline::{PredictionMode, RiskPipeline};
    use crate::survival::PriorityActionKind;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use risk_classifier::{ModelArtifact, ModelKind, RiskClassifier};
    use risk_core::{FeatureVector, FinancialInput, RiskLevel};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use text_generation::{GenerationError, GenerationResult, ProviderChain, TextGenerator};

    fn classifier() -> Arc<RiskClassifier> {
        let artifact = ModelArtifact {
            name: Some("test".into()),
            feature_names: FeatureVector::CLASSIFIER_FEATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            model: ModelKind::Logistic {
                coefficients: vec![-4.0, 3.5, 5.0, -1.6],
                intercept: 0.4,
                scaler: None,
            },
        };
        Arc::new(RiskClassifier::from_artifact(artifact, "inline").unwrap())
    }

    fn input(sales: f64, expenses: f64, receivables: f64, emi: f64, cash: f64) -> FinancialInput {
        FinancialInput {
            monthly_sales: Some(sales),
            monthly_expenses: Some(expenses),
            receivables: Some(receivables),
            loan_emi: Some(emi),
            cash_balance: Some(cash),
            ..Default::default()
        }
    }

    fn distressed() -> FinancialInput {
        input(50_000.0, 80_000.0, 20_000.0, 16_000.0, 30_000.0)
    }

    struct Scripted {
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> GenerationResult<String> {
            assert!(prompt.contains("Risk score:"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .ok_or_else(|| GenerationError::ServiceUnavailable("down".into()))
        }
    }

    fn chain(reply: Option<&'static str>) -> (ProviderChain, Arc<Scripted>) {
        let scripted = Arc::new(Scripted {
            reply,
            calls: AtomicUsize::new(0),
        });
        let providers: Vec<Arc<dyn TextGenerator>> = vec![scripted.clone()];
        (ProviderChain::new(providers, Duration::from_secs(5)), scripted)
    }

    #[tokio::test]
    async fn test_missing_fields_short_circuit() {
        let pipeline = RiskPipeline::new(classifier());
        let partial = FinancialInput {
            monthly_sales: Some(50_000.0),
            monthly_expenses: Some(80_000.0),
            ..Default::default()
        };

        let result = pipeline.assess(&partial, true).await;
        assert_eq!(result.risk_level, RiskLevel::InsufficientData);
        assert_eq!(result.risk_score, 0);
        assert!(result.probability.is_none());
        assert_eq!(
            result.reasons,
            vec!["Missing required inputs: receivables, loan_emi, cash_balance"]
        );
        assert_eq!(result.actions, vec!["Please fill all fields to analyze financial risk"]);

        // Survival still answers from what is there
        assert_relative_eq!(result.survival.monthly_loss, 30_000.0);
        assert_eq!(
            result.survival.priority_action.kind,
            PriorityActionKind::ReduceExpenses
        );
        let explanation = result.explanation.unwrap();
        assert_eq!(explanation.source, ExplanationSource::Template);

        let json = serde_json::to_value(&result.risk_level).unwrap();
        assert_eq!(json, "INSUFFICIENT DATA");
    }

    #[tokio::test]
    async fn test_distressed_business() {
        let pipeline = RiskPipeline::new(classifier());
        let result = pipeline.assess(&distressed(), false).await;

        // z = 0.4 + 2.4 + 1.4 + 1.6 - 0.6 = 5.2
        assert_relative_eq!(
            result.probability.unwrap(),
            1.0 / (1.0 + (-5.2_f64).exp()),
            epsilon = 1e-12
        );
        assert_eq!(result.risk_score, 99);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(
            result.reasons,
            vec![
                "High outstanding customer payments",
                "High EMI burden compared to revenue",
                "Low cash buffer to absorb expense shocks",
            ]
        );
        assert_eq!(result.actions.len(), 3);
        assert_eq!(
            result.optimization_actions,
            vec![
                "Improve customer payment collection cycle",
                "Explore loan restructuring or EMI reduction",
                "Reduce discretionary operating expenses",
            ]
        );
        assert_eq!(
            result.survival.priority_action.kind,
            PriorityActionKind::CollectReceivables
        );
        assert!(result.explanation.is_none());
    }

    #[tokio::test]
    async fn test_healthy_business() {
        let pipeline = RiskPipeline::new(classifier());
        let result = pipeline
            .assess(&input(100_000.0, 70_000.0, 10_000.0, 5_000.0, 150_000.0), true)
            .await;

        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.reasons.is_empty());
        assert!(result.optimization_actions.is_empty());
        assert!(result.survival.runway_is_capped);

        let explanation = result.explanation.unwrap();
        assert_eq!(explanation.key_drivers.len(), 2);
        assert_eq!(explanation.immediate_actions.len(), 2);
    }

    #[tokio::test]
    async fn test_explanation_without_generator_uses_rules() {
        let pipeline = RiskPipeline::new(classifier());
        let result = pipeline.assess(&distressed(), true).await;

        let explanation = result.explanation.unwrap();
        assert_eq!(explanation.source, ExplanationSource::Template);
        let expected: Vec<String> = result.reasons.iter().map(|r| simplify(r)).collect();
        assert_eq!(explanation.key_drivers, expected);
    }

    #[tokio::test]
    async fn test_failing_generator_never_fails_request() {
        let (chain, scripted) = chain(None);
        let pipeline = RiskPipeline::new(classifier()).with_generator(Some(chain));
        let result = pipeline.assess(&distressed(), true).await;

        assert_eq!(scripted.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.risk_level, RiskLevel::High);
        let explanation = result.explanation.unwrap();
        assert_eq!(explanation.source, ExplanationSource::Template);
        let expected: Vec<String> = result.actions.iter().map(|a| simplify(a)).collect();
        assert_eq!(explanation.immediate_actions, expected);
    }

    #[tokio::test]
    async fn test_generated_explanation() {
        let (chain, _) = chain(Some(
            r#"{"summary": "Expenses exceed sales by 30000 a month.",
                "key_drivers": ["Spending is 60% above sales"],
                "immediate_actions": ["Cut 2 non-essential costs this week"]}"#,
        ));
        let pipeline = RiskPipeline::new(classifier()).with_generator(Some(chain));
        assert!(pipeline.has_generator());

        let explanation = pipeline.assess(&distressed(), true).await.explanation.unwrap();
        assert_eq!(explanation.source, ExplanationSource::Generated);
        assert_eq!(explanation.summary, "Expenses exceed sales by 30000 a month.");
        assert_eq!(explanation.key_drivers[0], "Spending is 60% above sales");
        assert_eq!(explanation.key_drivers.len(), 4);
    }

    #[tokio::test]
    async fn test_generator_skipped_without_explain() {
        let (chain, scripted) = chain(Some("{}"));
        let pipeline = RiskPipeline::new(classifier()).with_generator(Some(chain));
        pipeline.assess(&distressed(), false).await;
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_check_input_needs_two_fields() {
        let pipeline = RiskPipeline::new(classifier());

        let one = FinancialInput {
            receivables: Some(90_000.0),
            ..Default::default()
        };
        assert!(pipeline.check_input(&one).is_empty());

        let two = FinancialInput {
            monthly_sales: Some(100_000.0),
            receivables: Some(90_000.0),
            ..Default::default()
        };
        let outcome = pipeline.check_input(&two);
        assert_eq!(outcome.warnings, vec!["High outstanding customer payments"]);
        assert_eq!(outcome.suggestions, vec!["Improve collection cycle or follow up on dues"]);
    }

    #[test]
    fn test_prediction_mode_parsing() {
        assert_eq!("".parse::<PredictionMode>().unwrap(), PredictionMode::Auto);
        assert_eq!(" Rolling ".parse::<PredictionMode>().unwrap(), PredictionMode::Rolling);
        assert_eq!("manual".parse::<PredictionMode>().unwrap(), PredictionMode::Manual);
        assert!("weekly".parse::<PredictionMode>().is_err());
    }
}
