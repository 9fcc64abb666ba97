use std::sync::Arc;
use std::time::Duration;
use stratflow::application::catalog::{Toolbox, VariantCatalog};
use stratflow::application::evaluation::{BacktestEvaluator, Evaluator};
use stratflow::application::optimization::{Optimizer, OptimizerContext, StopSignal};
use stratflow::config::{OptimizerSettings, SearchMode};
use stratflow::domain::outcomes::RoundOutcome;
use stratflow::domain::ports::{GenerationConstraints, SeriesSource};
use stratflow::infrastructure::market_data::ResilientDataFeed;
use stratflow::infrastructure::news::{LexiconSentimentScorer, MockNewsFeed};
use stratflow::infrastructure::{EventBus, TtlCache};

fn offline_context(settings: &OptimizerSettings) -> OptimizerContext {
    let toolbox = Arc::new(Toolbox::new(
        Arc::new(MockNewsFeed::new()),
        Arc::new(LexiconSentimentScorer::new()),
    ));
    let catalog = Arc::new(VariantCatalog::with_builtins(toolbox).unwrap());
    let source: Arc<dyn SeriesSource> = Arc::new(ResilientDataFeed::offline(
        Arc::new(TtlCache::new(Duration::from_secs(600))),
        99,
    ));

    OptimizerContext {
        catalog: Arc::clone(&catalog),
        search_evaluator: Arc::new(BacktestEvaluator::new(
            Arc::clone(&catalog),
            Arc::clone(&source),
            settings.quick_eval.clone(),
        )) as Arc<dyn Evaluator>,
        evaluator: Arc::new(BacktestEvaluator::new(
            catalog,
            source,
            settings.full_eval.clone(),
        )) as Arc<dyn Evaluator>,
        generation: None,
        constraints: GenerationConstraints::default(),
        events: EventBus::new(),
        stop: StopSignal::new(),
    }
}

fn settings(rounds: usize, mode: SearchMode) -> OptimizerSettings {
    let mut settings = OptimizerSettings {
        max_rounds: rounds,
        seed: Some(11),
        ..OptimizerSettings::default()
    };
    settings.search.simulations = 6;
    settings.search.mode = mode;
    settings
}

#[tokio::test]
async fn test_offline_run_keeps_best_monotone() {
    let settings = settings(4, SearchMode::Variants);
    let ctx = offline_context(&settings);
    let mut optimizer = Optimizer::new("AAPL", &settings, ctx).unwrap();

    let result = optimizer.run().await;

    assert_eq!(result.history.len(), 4);
    let rounds: Vec<usize> = result.history.iter().map(|r| r.round).collect();
    assert_eq!(rounds, vec![1, 2, 3, 4]);

    let mut previous = result.initial_score;
    for record in &result.history {
        if let Some(best) = record.best_score() {
            assert!(best >= previous, "best went from {} to {}", previous, best);
            previous = best;
        }
    }
    assert_eq!(result.best_score, previous);
    assert!((0.0..=1.0).contains(&result.best_score));

    let evaluation = result
        .best_evaluation
        .as_ref()
        .expect("best variant was evaluated");
    assert!(evaluation.synthetic_data);
    assert_eq!(evaluation.variant_id, result.best_variant.id);
}

#[tokio::test]
async fn test_transformation_mode_derives_variants() {
    let settings = settings(3, SearchMode::Transformations);
    let ctx = offline_context(&settings);
    let mut optimizer = Optimizer::new("MSFT", &settings, ctx).unwrap();

    let result = optimizer.run().await;

    assert_eq!(result.history.len(), 3);
    assert_eq!(result.initial_variant, settings.search.base_variant);
    for record in &result.history {
        if let RoundOutcome::Completed { candidate_id, .. } = &record.outcome {
            assert!(
                candidate_id.starts_with(&settings.search.base_variant),
                "unexpected candidate {}",
                candidate_id
            );
        }
    }
}

#[tokio::test]
async fn test_same_seed_same_history() {
    let settings = settings(3, SearchMode::Variants);

    let first = Optimizer::new("TSLA", &settings, offline_context(&settings))
        .unwrap()
        .run()
        .await;
    let second = Optimizer::new("TSLA", &settings, offline_context(&settings))
        .unwrap()
        .run()
        .await;

    let outcomes = |r: &stratflow::domain::outcomes::OptimizationResult| {
        r.history
            .iter()
            .map(|h| h.outcome.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(outcomes(&first), outcomes(&second));
    assert_eq!(first.best_variant.id, second.best_variant.id);
}
