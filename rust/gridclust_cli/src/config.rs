use gridclust::{
    CleanupConfig,
    ClusteringConfig,
    CutConfig,
    DistanceMetric,
    Linkage,
    PointProperties,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::path::Path;

use crate::error::CliError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub clustering: ClusteringConfig,
    /// How to flatten the merge tree, the clusters left open by the engine
    /// are reported when missing.
    #[serde(default)]
    pub cut: Option<CutConfig>,
    #[serde(default)]
    pub cleanup: Option<CleanupConfig>,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let config: Config = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Ok(config)
    }

    /// Two dimensional (retention time, m/z) template. Distances are in
    /// units of 5 seconds and 0.01 Th.
    pub fn template() -> Self {
        Self {
            clustering: ClusteringConfig::new(vec![5.0, 0.01])
                .with_linkage(Linkage::Complete)
                .with_metric(DistanceMetric::ScaledEuclidean {
                    scale: vec![5.0, 0.01],
                })
                .with_threshold(1.0),
            cut: None,
            cleanup: Some(CleanupConfig {
                axis: 0,
                min_span: Some(2.0),
                max_gap: Some(5.0),
            }),
        }
    }
}

/// One point of the input file.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PointInput {
    /// Free text carried through to the output, defaults to the position
    /// in the input file.
    #[serde(default)]
    pub label: Option<String>,
    pub coords: Vec<f64>,
    #[serde(flatten)]
    pub properties: PointProperties,
}
