use gridclust::{
    BoundingBox,
    ClusterSet,
    HierarchicalClusterer,
    PointId,
    PointStore,
};
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use serde::Serialize;
use std::fs::File;
use std::io::{
    BufReader,
    BufWriter,
};
use std::path::Path;
use std::time::Instant;
use tracing::{
    info,
    instrument,
};

use crate::cli::{
    ClusterArgs,
    WriteTemplateArgs,
};
use crate::config::{
    Config,
    PointInput,
};
use crate::error::CliError;

/// A final cluster as written to `clusters.json`.
#[derive(Debug, Serialize)]
struct ClusterOutput<'a> {
    id: PointId,
    size: usize,
    labels: Vec<String>,
    members: &'a [PointId],
    centroid: &'a [f64],
    bounds: &'a BoundingBox,
}

/// Main function for the 'cluster' subcommand.
#[instrument(skip_all)]
pub fn main_cluster(args: ClusterArgs) -> Result<(), CliError> {
    let config = Config::from_path(&args.config)?;
    info!("Using configuration: {:#?}", config);

    info!("Loading points from {}", args.input.display());
    let points = read_points(&args.input)?;
    let dimension = config.clustering.cell_dimension.len();
    let store = build_store(&points, dimension)?;
    info!("Loaded {} points with {} dimensions", store.len(), dimension);
    if let Some(cleanup) = &config.cleanup {
        cleanup.validate(dimension)?;
    }

    let start = Instant::now();
    let mut engine = HierarchicalClusterer::new(&store, config.clustering.clone())?;
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )?;
    let progress = ProgressBar::new(store.len().saturating_sub(1) as u64).with_style(style);
    while engine.step().is_some() {
        progress.inc(1);
    }
    progress.finish_and_clear();
    let result = engine.into_result();
    info!(
        "Performed {} merges in {:?}, {} clusters open",
        result.tree.len(),
        start.elapsed(),
        result.clusters.len()
    );

    let clusters = match &config.cut {
        Some(cut) => {
            let partition = cut.apply(&result.tree)?;
            ClusterSet::from_partition(&partition, &store)?
        }
        None => result.clusters.clone(),
    };
    let clusters = match &config.cleanup {
        Some(cleanup) => cleanup.apply(clusters).0,
        None => clusters,
    };
    info!("Final clusters: {}", clusters.partition().stats());

    std::fs::create_dir_all(&args.output_dir)?;
    let tree_path = args.output_dir.join("merge_tree.json");
    serde_json::to_writer_pretty(BufWriter::new(File::create(&tree_path)?), &result.tree)?;

    let newick_path = args.output_dir.join("tree.nwk");
    std::fs::write(&newick_path, result.tree.to_newick(!args.no_branch_lengths))?;

    let clusters_path = args.output_dir.join("clusters.json");
    write_clusters(&clusters_path, &clusters, &points)?;
    info!(
        "Wrote results to:\n- {}\n- {}\n- {}",
        tree_path.display(),
        newick_path.display(),
        clusters_path.display()
    );
    Ok(())
}

fn read_points(path: &Path) -> Result<Vec<PointInput>, CliError> {
    let points: Vec<PointInput> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    Ok(points)
}

// Point ids match the position of the point in the input file.
fn build_store(points: &[PointInput], dimension: usize) -> Result<PointStore, CliError> {
    let mut store = PointStore::with_capacity(dimension, points.len())?;
    for (index, point) in points.iter().enumerate() {
        store
            .add_with_properties(&point.coords, point.properties)
            .map_err(|source| CliError::InvalidPoint { index, source })?;
    }
    Ok(store)
}

fn write_clusters(path: &Path, clusters: &ClusterSet, points: &[PointInput]) -> Result<(), CliError> {
    let label_of = |id: PointId| {
        points[id]
            .label
            .clone()
            .unwrap_or_else(|| id.to_string())
    };
    let out: Vec<ClusterOutput> = clusters
        .iter()
        .map(|c| ClusterOutput {
            id: c.id,
            size: c.len(),
            labels: c.members.iter().map(|m| label_of(*m)).collect(),
            members: &c.members,
            centroid: &c.centroid,
            bounds: &c.bounds,
        })
        .collect();
    serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &out)?;
    Ok(())
}

const POINTS_TEMPLATE: &str = r#"[
    { "label": "feature_0", "coords": [302.1, 723.8446], "group": 0, "tag": 0 },
    { "label": "feature_1", "coords": [303.4, 723.8451], "group": 0, "tag": 1 },
    { "label": "feature_2", "coords": [354.2, 512.2710] },
    { "label": "feature_3", "coords": [355.0, 512.2702], "tag": 1 }
]"#;

/// Main function for the 'write-template' subcommand.
pub fn main_write_template(args: WriteTemplateArgs) -> Result<(), CliError> {
    let target_dir = args.output_path;
    std::fs::create_dir_all(&target_dir)?;

    let config_path = target_dir.join("config_template.json");
    std::fs::write(
        &config_path,
        serde_json::to_string_pretty(&Config::template())?,
    )?;
    let points_path = target_dir.join("points_template.json");
    std::fs::write(&points_path, POINTS_TEMPLATE)?;
    println!(
        "Wrote templates to:\n- {}\n- {}",
        config_path.display(),
        points_path.display()
    );
    Ok(())
}
