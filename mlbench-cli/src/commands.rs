//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::args::SharedArgs;
use anyhow::Context as _;
use mlbench_algos::{
    ForestBench, ForestParams, KMeansBench, KMeansParams, ModelFloat, run_benchmark,
};
use mlbench_core::config::CONFIG_FILE_NAME;
use mlbench_core::data::npy;
use mlbench_core::{BenchParams, DType, Dataset, load_data, load_params};
use std::path::{Path, PathBuf};

/// Locations shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    pub workspace: PathBuf,
    pub config: Option<PathBuf>,
}

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::Kmeans { shared, kmeans } => handle_kmeans(&shared, &kmeans, ctx),
        Commands::DfClsf { shared, forest } => handle_df_clsf(&shared, &forest, ctx),
        Commands::GenData { out_dir, shared } => handle_gen_data(&out_dir, &shared, ctx),
        Commands::Config { action } => handle_config(action, ctx),
    }
}

fn resolve_params(shared: &SharedArgs, ctx: &Context) -> anyhow::Result<BenchParams> {
    let params = load_params(
        Some(ctx.workspace.as_path()),
        ctx.config.as_deref(),
        &shared.overrides(),
    )
    .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    params.validate()?;
    if let Some(threads) = params.run.threads {
        tracing::debug!(threads, "linfa runs single-threaded here, thread count recorded only");
    }
    tracing::debug!(?params, "Resolved parameters");
    Ok(params)
}

fn handle_kmeans(
    shared: &SharedArgs,
    kmeans: &KMeansParams,
    ctx: &Context,
) -> anyhow::Result<()> {
    let params = resolve_params(shared, ctx)?;
    match params.run.dtype {
        DType::F32 => run_kmeans::<f32>(&params, kmeans),
        DType::F64 => run_kmeans::<f64>(&params, kmeans),
    }
}

fn run_kmeans<F: ModelFloat>(params: &BenchParams, kmeans: &KMeansParams) -> anyhow::Result<()> {
    let data: Dataset<F> =
        load_data(&params.data, params.run.seed, false).context("Failed to load data")?;
    let bench = KMeansBench::prepare(kmeans, &data, params.run.seed)
        .context("Failed to prepare K-means")?;
    let report = run_benchmark(&bench, params, &data).context("K-means benchmark failed")?;
    report.emit(&params.output).context("Failed to write report")?;
    Ok(())
}

fn handle_df_clsf(
    shared: &SharedArgs,
    forest: &ForestParams,
    ctx: &Context,
) -> anyhow::Result<()> {
    let params = resolve_params(shared, ctx)?;
    match params.run.dtype {
        DType::F32 => run_df_clsf::<f32>(&params, forest),
        DType::F64 => run_df_clsf::<f64>(&params, forest),
    }
}

fn run_df_clsf<F: ModelFloat>(params: &BenchParams, forest: &ForestParams) -> anyhow::Result<()> {
    let data: Dataset<F> =
        load_data(&params.data, params.run.seed, true).context("Failed to load data")?;
    let bench = ForestBench::prepare(forest, &data, params.run.seed)
        .context("Failed to prepare random forest")?;
    let report =
        run_benchmark(&bench, params, &data).context("Random forest benchmark failed")?;
    report.emit(&params.output).context("Failed to write report")?;
    Ok(())
}

fn handle_gen_data(out_dir: &Path, shared: &SharedArgs, ctx: &Context) -> anyhow::Result<()> {
    let params = resolve_params(shared, ctx)?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    match params.run.dtype {
        DType::F32 => write_split::<f32>(out_dir, &params),
        DType::F64 => write_split::<f64>(out_dir, &params),
    }
}

fn write_split<F: ModelFloat>(out_dir: &Path, params: &BenchParams) -> anyhow::Result<()> {
    let data: Dataset<F> = mlbench_core::data::synthetic::blobs(&params.data.synthetic, params.run.seed)?;
    let (y_train, y_test) = data.labels()?;
    npy::write_matrix(&out_dir.join("x_train.npy"), &data.x_train)?;
    npy::write_matrix(&out_dir.join("x_test.npy"), &data.x_test)?;
    npy::write_labels(&out_dir.join("y_train.npy"), y_train)?;
    npy::write_labels(&out_dir.join("y_test.npy"), y_test)?;
    tracing::info!(
        dir = %out_dir.display(),
        train = %data.size_label(),
        dtype = %F::DTYPE,
        "Wrote synthetic split"
    );
    println!("Wrote x_train.npy, x_test.npy, y_train.npy and y_test.npy to {}", out_dir.display());
    Ok(())
}

fn handle_config(action: ConfigAction, ctx: &Context) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = ctx.workspace.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&BenchParams::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let params = resolve_params(&SharedArgs::default(), ctx)?;
            let toml_str = toml::to_string_pretty(&params)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> Context {
        Context {
            workspace: dir.path().to_path_buf(),
            config: None,
        }
    }

    fn quick_args(output: PathBuf) -> SharedArgs {
        SharedArgs {
            seed: Some(42),
            synthetic_train_rows: Some(60),
            synthetic_test_rows: Some(20),
            synthetic_features: Some(3),
            box_filter_measurements: Some(2),
            output: Some(output),
            ..SharedArgs::default()
        }
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        handle_command(
            Commands::Config {
                action: ConfigAction::Init,
            },
            &ctx,
        )
        .unwrap();

        let content = std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        let parsed: BenchParams = toml::from_str(&content).unwrap();
        assert_eq!(parsed, BenchParams::default());
    }

    #[test]
    fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[run]\nseed = 1\n").unwrap();

        handle_command(
            Commands::Config {
                action: ConfigAction::Init,
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[run]\nseed = 1\n");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let ctx = Context {
            config: Some(dir.path().join("absent.toml")),
            ..context(&dir)
        };
        let result = handle_command(
            Commands::Config {
                action: ConfigAction::Show,
            },
            &ctx,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_kmeans_writes_csv_report() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("kmeans.csv");
        let kmeans = KMeansParams {
            n_clusters: Some(3),
            ..KMeansParams::default()
        };
        handle_command(
            Commands::Kmeans {
                shared: quick_args(out.clone()),
                kmeans,
            },
            &context(&dir),
        )
        .unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(",time,inertia"));
        assert!(lines[1].starts_with("linfa,kmeans,training,KMeans.fit,"));
        assert!(lines[2].contains(",prediction,KMeans.predict,"));
    }

    #[test]
    fn test_kmeans_without_cluster_count_fails() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("kmeans.csv");
        let result = handle_command(
            Commands::Kmeans {
                shared: quick_args(out),
                kmeans: KMeansParams::default(),
            },
            &context(&dir),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_gen_data_then_df_clsf_from_files() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let ctx = context(&dir);
        handle_command(
            Commands::GenData {
                out_dir: data_dir.clone(),
                shared: SharedArgs {
                    dtype: Some(DType::F32),
                    ..quick_args(dir.path().join("unused"))
                },
            },
            &ctx,
        )
        .unwrap();
        for name in ["x_train.npy", "x_test.npy", "y_train.npy", "y_test.npy"] {
            assert!(data_dir.join(name).exists(), "{name} missing");
        }

        let out = dir.path().join("forest.json");
        let shared = SharedArgs {
            file_x_train: Some(data_dir.join("x_train.npy")),
            file_x_test: Some(data_dir.join("x_test.npy")),
            file_y_train: Some(data_dir.join("y_train.npy")),
            file_y_test: Some(data_dir.join("y_test.npy")),
            output_format: Some(mlbench_core::OutputFormat::Json),
            ..quick_args(out.clone())
        };
        let forest = ForestParams {
            num_trees: 3,
            ..ForestParams::default()
        };
        handle_command(Commands::DfClsf { shared, forest }, &ctx).unwrap();

        let rows: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(rows[0]["algorithm"], "decision_forest_classification");
        assert_eq!(rows[0]["input_data"]["rows"], 60);
        assert_eq!(rows[0]["input_data"]["data_type"], "float64");
        assert!(rows[1]["accuracy[%]"].as_f64().unwrap() <= 100.0);
    }
}
