use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use longeval_core::dataset::stackselect::StackSelect;
use longeval_core::dataset::textsort::TextSort;
use longeval_core::dataset::{Dataset, DatasetMode, Setting};
use longeval_core::engine::JobRunner;
use longeval_core::errors::EvalError;
use longeval_core::providers::llm::fake::FakeBackend;
use longeval_core::providers::llm::local::LocalServerBackend;
use longeval_core::providers::llm::openai::OpenAiBackend;
use longeval_core::providers::llm::TextBackend;
use longeval_core::report::progress::{ProgressEvent, ProgressSink};
use longeval_core::report::summary;
use longeval_core::storage::{ScoreEntry, ScoreLedger, StoreLayout};

use super::args::{BackendFamily, Cli, Command, RunArgs, RunMode, ScoresArgs};

const OK: i32 = 0;
const INCOMPLETE: i32 = 1;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run(args).await,
        Command::Scores(args) => scores(args),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<i32> {
    if args.world_size > 1 && args.job_id.is_none() {
        anyhow::bail!(
            "config error: sharded launches (world_size > 1) need a shared --job-id / LONGEVAL_JOB_ID"
        );
    }
    let job_id = args.job_id.clone().unwrap_or_else(|| "single".to_string());
    let backend = build_backend(&args).await?;
    let dataset_mode = if backend.is_remote() {
        DatasetMode::Less
    } else {
        DatasetMode::Normal
    };

    std::fs::create_dir_all(&args.work_dir)
        .with_context(|| format!("failed to create work dir {}", args.work_dir.display()))?;

    let mut code = OK;
    for name in &args.data {
        let dataset = load_dataset(&args.data_dir, name, dataset_mode)?;
        let layout = StoreLayout::new(&args.work_dir, &args.model, dataset.name());
        let runner = JobRunner {
            backend: backend.clone(),
            layout: layout.clone(),
            rank: args.rank,
            world_size: args.world_size,
            max_concurrency: args.nproc,
            checkpoint_every: args.checkpoint_every,
            job_id: job_id.clone(),
        };

        let items = dataset.work_items();
        tracing::info!(dataset = %dataset.name(), items = items.len(), "starting job");

        match runner.run(&items, Some(console_progress())).await {
            Ok(outcome) => {
                if args.rank == 0 {
                    write_predictions(&layout.predictions_path(), &outcome.records)?;
                    if args.mode == RunMode::All {
                        let score = dataset.evaluate(&outcome.records);
                        println!("{}", summary::accuracy_line(dataset.name(), score));
                        ScoreLedger::new(layout.ledger_path())
                            .record(&layout.job_key(), ScoreEntry::now(score, items.len()))?;
                    }
                }
            }
            Err(e) => match e.downcast_ref::<EvalError>() {
                Some(EvalError::IncompleteRun { missing, total }) => {
                    eprintln!("{}", summary::pending_line(dataset.name(), *missing, *total));
                    code = INCOMPLETE;
                }
                _ => return Err(e),
            },
        }
    }
    Ok(code)
}

fn scores(args: ScoresArgs) -> anyhow::Result<i32> {
    let ledger = ScoreLedger::new(args.work_dir.join("results.json"));
    for (job, entry) in ledger.load()? {
        println!(
            "{job}: {:.1}% ({} items, {})",
            entry.score,
            entry.items,
            entry.at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(OK)
}

async fn build_backend(args: &RunArgs) -> anyhow::Result<Arc<dyn TextBackend>> {
    Ok(match args.backend {
        BackendFamily::Api => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("config error: OPENAI_API_KEY is required for the api backend")?;
            Arc::new(OpenAiBackend::new(args.model.clone(), api_key))
        }
        BackendFamily::Local => Arc::new(
            LocalServerBackend::connect(args.model.clone(), args.local_url.clone()).await?,
        ),
        BackendFamily::Fake => {
            let fake = FakeBackend::new(args.model.clone());
            if args.world_size > 1 {
                Arc::new(fake.local())
            } else {
                Arc::new(fake)
            }
        }
    })
}

fn load_dataset(
    data_dir: &Path,
    name: &str,
    mode: DatasetMode,
) -> anyhow::Result<Box<dyn Dataset>> {
    let (family, setting) = name
        .rsplit_once('_')
        .ok_or_else(|| anyhow::anyhow!("invalid dataset name '{name}' (expected family_setting)"))?;
    let setting: Setting = setting.parse()?;
    match family {
        "stackselect" => Ok(Box::new(StackSelect::load(data_dir, setting, mode)?)),
        "textsort" => Ok(Box::new(TextSort::load(data_dir, setting, mode)?)),
        other => anyhow::bail!("unknown dataset family '{other}'"),
    }
}

fn write_predictions(
    path: &Path,
    records: &[longeval_core::model::ResultRecord],
) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to write predictions to {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), records)?;
    Ok(())
}

fn console_progress() -> ProgressSink {
    Arc::new(|ev: ProgressEvent| {
        if ev.done == ev.total || ev.done % 10 == 0 {
            eprint!("\r  {}/{} items", ev.done, ev.total);
            let _ = std::io::stderr().flush();
            if ev.done == ev.total {
                eprintln!();
            }
        }
    })
}
