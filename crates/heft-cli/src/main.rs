mod display;

use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use arrow::compute::concat_batches;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::record_batch::RecordBatch;
use clap::{Parser, Subcommand};
use heft_ai::{ArtifactConfig, ArtifactStore, Predictor, results_to_batch, score_batch};
use heft_core::{FeatureSchema, ObesityInput, RawInput};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "heft", version, about = "Obesity category prediction from eight body and lifestyle attributes")]
struct Cli {
    /// Fitted scaler artifact
    #[arg(long, global = true, env = "HEFT_TRANSFORMER", default_value = "models/scaler.json")]
    transformer: PathBuf,

    /// Fitted classifier artifact
    #[arg(long, global = true, env = "HEFT_CLASSIFIER", default_value = "models/obesity_model.json")]
    classifier: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict the category for one person
    Predict {
        /// Weight in kilograms
        #[arg(long, default_value_t = 70.0)]
        weight: f64,
        /// Height in metres
        #[arg(long, default_value_t = 1.70)]
        height: f64,
        /// Age in years
        #[arg(long, default_value_t = 25.0)]
        age: f64,
        /// 1 = male, 0 = female
        #[arg(long, default_value_t = 1.0)]
        gender: f64,
        /// Vegetable intake: 1 rarely, 2 sometimes, 3 always
        #[arg(long, default_value_t = 2.0)]
        fcvc: f64,
        /// Physical activity: 0 never, 1 1-2 days/week, 2 2-4 days, 3 4-5 days
        #[arg(long, default_value_t = 1.0)]
        faf: f64,
        /// Device time: 0 up to 2 hours, 1 3-5 hours, 2 more than 5
        #[arg(long, default_value_t = 1.0)]
        tue: f64,
        /// Water intake: 1 under 1 litre, 2 1-2 litres, 3 over 2 litres
        #[arg(long, default_value_t = 2.0)]
        ch2o: f64,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Score every row of a CSV file with a header row
    Score {
        /// Input CSV
        path: PathBuf,
    },
    /// Print the attribute table
    Schema,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ArtifactConfig::new(cli.transformer, cli.classifier);

    match cli.command {
        Command::Predict {
            weight,
            height,
            age,
            gender,
            fcvc,
            faf,
            tue,
            ch2o,
            json,
        } => {
            let input = ObesityInput {
                weight,
                height,
                fcvc,
                age,
                gender,
                tue,
                ch2o,
                faf,
            };
            cmd_predict(&config, input, json)
        }
        Command::Score { path } => cmd_score(&config, &path),
        Command::Schema => {
            display::print_schema(FeatureSchema::obesity());
            Ok(())
        }
    }
}

fn load_predictor(config: &ArtifactConfig) -> anyhow::Result<Predictor> {
    let store = ArtifactStore::eager(config.clone()).context("loading model artifacts")?;
    Ok(Predictor::from_store(&store)?)
}

fn cmd_predict(config: &ArtifactConfig, input: ObesityInput, json: bool) -> anyhow::Result<()> {
    let raw = RawInput::from(input);
    FeatureSchema::obesity()
        .validate_ranges(&raw)
        .context("invalid input")?;

    let predictor = load_predictor(config)?;
    let result = predictor.predict_raw(&raw).context("prediction failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        display::print_prediction(&raw, &result);
    }
    Ok(())
}

fn cmd_score(config: &ArtifactConfig, path: &Path) -> anyhow::Result<()> {
    let batch = read_csv(path).with_context(|| format!("reading {}", path.display()))?;
    let predictor = load_predictor(config)?;

    let results = score_batch(&predictor, &batch)?;
    let failed = results.iter().filter(|r| r.is_err()).count();
    let out = results_to_batch(&results)?;

    arrow::util::pretty::print_batches(&[out])?;
    info!(rows = results.len(), failed, path = %path.display(), "scored file");
    Ok(())
}

/// Read a whole CSV into one batch, inferring column types from the data.
fn read_csv(path: &Path) -> anyhow::Result<RecordBatch> {
    let mut file = File::open(path)?;
    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(&mut file, None)?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .build(file)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}
