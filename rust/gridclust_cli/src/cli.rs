use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster a set of points.
    Cluster(ClusterArgs),
    /// Write template configuration and input files.
    WriteTemplate(WriteTemplateArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ClusterArgs {
    /// The path to the json file with the clustering configuration.
    #[arg(short, long)]
    pub config: PathBuf,

    /// The path to the json file with the points to cluster.
    #[arg(short, long)]
    pub input: PathBuf,

    /// The directory where the results are written.
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Leave merge distances out of the newick tree.
    #[arg(long, default_value_t = false)]
    pub no_branch_lengths: bool,
}

#[derive(Parser, Debug)]
pub struct WriteTemplateArgs {
    /// The path to the output files.
    #[arg(short, long)]
    pub output_path: PathBuf,
}
