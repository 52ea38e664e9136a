//! End-to-end sensitivity runs
//!
//! These tests verify that:
//! - The logistic scenario yields both metrics with plausible indices
//! - A metric that ignores the parameters gets zero indices
//! - Records stay aligned with the sample rows they came from
//! - A fixed seed reproduces the run exactly

use crate::analysis::{DesignBlock, NamedDistribution, SensitivityConfig, run_sensitivity};
use crate::integrator::{FixedStepIntegrator, Integrator, IntegratorOptions};
use crate::metrics::MetricSet;
use crate::model::{DerivativeModel, ExponentialGrowth, LogisticGrowth};

fn logistic_config(num_samples: usize, seed: u64) -> SensitivityConfig {
    SensitivityConfig {
        num_samples,
        num_bootstrap: 200,
        seed: Some(seed),
        integrator: IntegratorOptions {
            substeps: 4,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// 2000 samples of r ~ N(0.05, 0.01), K ~ N(200, 50) over 200 years
#[test]
fn test_logistic_scenario_indices_are_plausible() {
    let model = LogisticGrowth::new();
    let report = run_sensitivity(&model, &logistic_config(2000, 20240501), None).unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.retained_samples(), 2000);
    assert_eq!(report.metric_names, vec!["maxpop", "threshyear"]);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.records.len(), 2000 * 4);

    for result in &report.results {
        assert_eq!(result.indices.len(), 2);
        assert!(result.variance > 0.0, "{}", result.metric);
        for p in &result.indices {
            for est in [p.first_order, p.total_effect] {
                assert!(
                    (-0.2..=1.2).contains(&est.estimate),
                    "{} {} {:?}",
                    result.metric,
                    p.parameter,
                    est
                );
                assert!(est.ci[0] <= est.ci[1]);
            }
        }
    }

    // peak population after 200 years is essentially the capacity
    let maxpop = report.result("maxpop").unwrap();
    let k = maxpop.get("K").unwrap();
    let r = maxpop.get("r").unwrap();
    assert!(k.first_order.estimate > 0.7, "{k:?}");
    assert!(r.total_effect.estimate < 0.3, "{r:?}");

    // both parameters matter for when the threshold is crossed
    let threshyear = report.result("threshyear").unwrap();
    assert!(threshyear.get("r").unwrap().total_effect.estimate > 0.1);
    assert!(threshyear.get("K").unwrap().total_effect.estimate > 0.05);
}

#[test]
fn test_parameter_free_metric_has_zero_indices() {
    // an empty population never grows, whatever r is
    let model = ExponentialGrowth::new();
    let config = SensitivityConfig {
        num_samples: 200,
        parameters: vec![NamedDistribution::normal("r", 0.1, 0.05)],
        initial_state: vec![0.0],
        num_bootstrap: 100,
        seed: Some(3),
        ..Default::default()
    };
    let report = run_sensitivity(&model, &config, None).unwrap();

    for result in &report.results {
        assert_eq!(result.variance, 0.0);
        for p in &result.indices {
            assert!(p.first_order.ci_contains(0.0), "{p:?}");
            assert!(p.total_effect.ci_contains(0.0), "{p:?}");
        }
    }
}

#[test]
fn test_records_align_with_sample_rows() {
    let model = LogisticGrowth::new();
    let config = logistic_config(64, 11);
    let report = run_sensitivity(&model, &config, None).unwrap();

    assert!(report.records.windows(2).all(|w| w[0].index < w[1].index));

    let mut integrator = FixedStepIntegrator::new(config.integrator.clone()).unwrap();
    for record in report
        .records
        .iter()
        .filter(|r| r.index.block == DesignBlock::B)
        .take(10)
    {
        let row = report.sample_b.row(record.index.sample).unwrap();
        let params = model.schema().bind(row).unwrap();
        let traj = integrator
            .integrate(&model, &config.initial_state, &report.output_times, &params)
            .unwrap();
        let expected = MetricSet::population().evaluate(&traj, config.threshold);
        assert_eq!(record.metrics, expected);
    }
}

#[test]
fn test_seed_reproduces_run() {
    let model = LogisticGrowth::new();
    let first = run_sensitivity(&model, &logistic_config(50, 99), None).unwrap();
    let second = run_sensitivity(
        &model,
        &SensitivityConfig {
            workers: Some(1),
            ..logistic_config(50, 99)
        },
        None,
    )
    .unwrap();

    assert_eq!(first.seed, 99);
    assert_eq!(first.sample_a, second.sample_a);
    assert_eq!(first.records, second.records);
    assert_eq!(first.results, second.results);
}

#[test]
fn test_report_serializes() {
    let model = LogisticGrowth::new();
    let report = run_sensitivity(&model, &logistic_config(16, 5), None).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["seed"], 5);
    assert_eq!(json["results"].as_array().map(Vec::len), Some(2));
    assert!(json["results"][0]["indices"][0]["first_order"]["ci"].is_array());
}

#[test]
fn test_config_errors_fail_before_sampling() {
    let model = LogisticGrowth::new();
    let config = SensitivityConfig {
        threshold: f64::NAN,
        ..logistic_config(10, 0)
    };
    let err = run_sensitivity(&model, &config, None).unwrap_err();
    assert!(err.to_string().contains("threshold"));
}
