//! Reduction of trajectories to scalar summary metrics.
//!
//! A [`MetricSet`] is an ordered list of named reductions. Evaluating it on a
//! trajectory gives one [`MetricsRecord`] whose values follow the set's order,
//! so every record in a run shares the same schema.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, ensure_finite};
use crate::trajectory::Trajectory;

/// A single trajectory reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKind {
    /// Largest value of the component over the whole trajectory.
    MaxValue,
    /// Smallest value of the component over the whole trajectory.
    MinValue,
    /// Value at the final output time.
    FinalValue,
    /// Time of the first point strictly above the threshold, or the final
    /// time when the threshold is never exceeded. Without an explicit
    /// threshold the run-wide one is used.
    TimeToThreshold {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
    },
}

impl MetricKind {
    /// Apply the reduction to one state component.
    pub fn evaluate(&self, trajectory: &Trajectory, component: usize, threshold: f64) -> f64 {
        match self {
            Self::MaxValue => trajectory
                .component(component)
                .fold(f64::NEG_INFINITY, f64::max),
            Self::MinValue => trajectory
                .component(component)
                .fold(f64::INFINITY, f64::min),
            Self::FinalValue => trajectory
                .final_state()
                .get(component)
                .copied()
                .unwrap_or(f64::NAN),
            Self::TimeToThreshold { threshold: own } => {
                let threshold = own.unwrap_or(threshold);
                trajectory
                    .first_time_above(component, threshold)
                    .unwrap_or_else(|| trajectory.final_time())
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MaxValue => "max value",
            Self::MinValue => "min value",
            Self::FinalValue => "final value",
            Self::TimeToThreshold { .. } => "time to threshold",
        }
    }
}

/// A named metric on one state component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: MetricKind,
    #[serde(default)]
    pub component: usize,
}

impl MetricSpec {
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
            component: 0,
        }
    }
}

/// Ordered list of metrics computed for every sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet {
    metrics: Vec<MetricSpec>,
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::population()
    }
}

impl MetricSet {
    pub fn new(metrics: Vec<MetricSpec>) -> Self {
        Self { metrics }
    }

    /// `maxpop` (peak population) and `threshyear` (first time above the
    /// threshold).
    pub fn population() -> Self {
        Self::new(vec![
            MetricSpec::new("maxpop", MetricKind::MaxValue),
            MetricSpec::new("threshyear", MetricKind::TimeToThreshold { threshold: None }),
        ])
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSpec> {
        self.metrics.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m.name == name)
    }

    /// Check names are unique and components exist in a `dimension`-sized
    /// state.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(ConfigError::Empty { field: "metrics" });
        }
        for (i, metric) in self.metrics.iter().enumerate() {
            if metric.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "metrics",
                    reason: format!("metric #{i} has a blank name"),
                });
            }
            if self.metrics[..i].iter().any(|m| m.name == metric.name) {
                return Err(ConfigError::Invalid {
                    field: "metrics",
                    reason: format!("duplicate metric name '{}'", metric.name),
                });
            }
            if metric.component >= dimension {
                return Err(ConfigError::IndexOutOfRange {
                    field: "metrics.component",
                    index: metric.component,
                    len: dimension,
                });
            }
            if let MetricKind::TimeToThreshold {
                threshold: Some(t),
            } = metric.kind
            {
                ensure_finite("metrics.threshold", t)?;
            }
        }
        Ok(())
    }

    /// Compute every metric on `trajectory`.
    pub fn evaluate(&self, trajectory: &Trajectory, threshold: f64) -> MetricsRecord {
        MetricsRecord {
            values: self
                .metrics
                .iter()
                .map(|m| m.kind.evaluate(trajectory, m.component, threshold))
                .collect(),
        }
    }
}

/// Metric values for one sample, in [`MetricSet`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    values: Vec<f64>,
}

impl MetricsRecord {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, metric: usize) -> Option<f64> {
        self.values.get(metric).copied()
    }

    /// Pair values with the names of the set that produced them.
    pub fn named<'a>(&'a self, set: &'a MetricSet) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        set.iter()
            .map(|m| m.name.as_str())
            .zip(self.values.iter().copied())
    }
}

/// Peak value and threshold crossing time of a single-component trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationMetrics {
    pub max_value: f64,
    pub time_to_threshold: f64,
}

/// The two standard population metrics on component 0.
pub fn extract_metrics(trajectory: &Trajectory, threshold: f64) -> PopulationMetrics {
    PopulationMetrics {
        max_value: MetricKind::MaxValue.evaluate(trajectory, 0, threshold),
        time_to_threshold: MetricKind::TimeToThreshold { threshold: None }.evaluate(
            trajectory,
            0,
            threshold,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Trajectory {
        let times = (1..=values.len()).map(|t| t as f64).collect();
        Trajectory::from_series(times, values.to_vec()).unwrap()
    }

    #[test]
    fn test_threshold_never_crossed_falls_back_to_final_time() {
        let m = extract_metrics(&series(&[10.0, 20.0, 30.0]), 100.0);
        assert_eq!(m.time_to_threshold, 3.0);
        assert_eq!(m.max_value, 30.0);
    }

    #[test]
    fn test_first_crossing() {
        let m = extract_metrics(&series(&[10.0, 150.0, 200.0]), 100.0);
        assert_eq!(m.time_to_threshold, 2.0);
        assert_eq!(m.max_value, 200.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let m = extract_metrics(&series(&[50.0, 100.0, 101.0]), 100.0);
        assert_eq!(m.time_to_threshold, 3.0);
    }

    #[test]
    fn test_other_reductions() {
        let traj = series(&[5.0, -2.0, 7.0, 3.0]);
        assert_eq!(MetricKind::MinValue.evaluate(&traj, 0, 0.0), -2.0);
        assert_eq!(MetricKind::FinalValue.evaluate(&traj, 0, 0.0), 3.0);
        let own = MetricKind::TimeToThreshold {
            threshold: Some(6.0),
        };
        // explicit threshold wins over the run-wide one
        assert_eq!(own.evaluate(&traj, 0, 100.0), 3.0);
    }

    #[test]
    fn test_metric_set_evaluate_order() {
        let set = MetricSet::population();
        let record = set.evaluate(&series(&[10.0, 150.0, 200.0]), 100.0);
        assert_eq!(record.values(), &[200.0, 2.0]);
        assert_eq!(
            record.named(&set).collect::<Vec<_>>(),
            vec![("maxpop", 200.0), ("threshyear", 2.0)]
        );
    }

    #[test]
    fn test_metric_set_validation() {
        assert!(MetricSet::population().validate(1).is_ok());
        assert!(MetricSet::new(vec![]).validate(1).is_err());

        let dup = MetricSet::new(vec![
            MetricSpec::new("a", MetricKind::MaxValue),
            MetricSpec::new("a", MetricKind::MinValue),
        ]);
        assert!(dup.validate(1).is_err());

        let mut far = MetricSpec::new("b", MetricKind::MaxValue);
        far.component = 2;
        let err = MetricSet::new(vec![far]).validate(2).unwrap_err();
        assert!(err.to_string().contains("metrics.component"));
    }

    #[test]
    fn test_metric_set_serde() {
        let json = r#"[{"name":"peak","kind":"max_value"},
                       {"name":"cross","kind":"time_to_threshold","threshold":50.0,"component":0}]"#;
        let set: MetricSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.names(), vec!["peak".to_string(), "cross".to_string()]);
        assert_eq!(
            set.iter().nth(1).map(|m| m.kind.clone()),
            Some(MetricKind::TimeToThreshold {
                threshold: Some(50.0)
            })
        );
    }
}
