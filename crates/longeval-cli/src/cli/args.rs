use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "longeval",
    version,
    about = "Long-context LLM benchmarks with a resumable, sharded inference runner"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run inference (and scoring) for one or more datasets against a model
    Run(RunArgs),
    /// Print the accumulated score ledger
    Scores(ScoresArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendFamily {
    /// Remote OpenAI-compatible API (bounded-concurrency pool)
    Api,
    /// Per-rank local inference server (static shard path)
    Local,
    /// Deterministic echo backend for pipeline smoke runs
    Fake,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Inference only; leave scoring for later
    Infer,
    /// Inference plus scoring and a ledger entry
    All,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Datasets to run, e.g. stackselect_4k textsort_16k
    #[arg(long, num_args = 1.., required = true)]
    pub data: Vec<String>,

    /// Model name (passed through to the backend)
    #[arg(long)]
    pub model: String,

    #[arg(long, value_enum, default_value = "api")]
    pub backend: BackendFamily,

    #[arg(long, value_enum, default_value = "all")]
    pub mode: RunMode,

    /// Concurrency ceiling for the API pool
    #[arg(long, default_value_t = 4)]
    pub nproc: usize,

    /// Persist accumulated pool results every N completions
    #[arg(long, default_value_t = 20)]
    pub checkpoint_every: usize,

    /// Directory holding dataset JSON files
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for stores, the ledger and barrier markers
    #[arg(long, default_value = ".")]
    pub work_dir: PathBuf,

    /// This process's ordinal for the sharded local path
    #[arg(long, env = "RANK", default_value_t = 0)]
    pub rank: usize,

    /// Number of cooperating processes for the sharded local path
    #[arg(long, env = "WORLD_SIZE", default_value_t = 1)]
    pub world_size: usize,

    /// Launch id shared by all ranks of one sharded launch (unique per launch)
    #[arg(long, env = "LONGEVAL_JOB_ID")]
    pub job_id: Option<String>,

    /// Base URL of this rank's local inference server
    #[arg(long, env = "LONGEVAL_LOCAL_URL", default_value = "http://127.0.0.1:8000/v1")]
    pub local_url: String,
}

#[derive(Parser, Debug)]
pub struct ScoresArgs {
    /// Directory holding the score ledger
    #[arg(long, default_value = ".")]
    pub work_dir: PathBuf,
}
