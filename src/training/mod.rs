mod logger;

pub use logger::install_file_logger;

use core::fmt::Display;

use burn::config::Config;
use burn::module::AutodiffModule;
use burn::optim::SgdConfig;
use burn::tensor::backend::AutodiffBackend;
use burn::train::{TrainStep, ValidStep};
use serde::{Deserialize, Serialize};

use crate::data::SyntheticDigits;
use crate::error::GraphError;
use crate::model::{ConvNetConfig, OneLayerConfig, Signature, TwoLayerConfig};
use crate::nn::ClassifierOutput;
use crate::placeholder::{image_placeholder, input_placeholder, target_placeholder};
use crate::placeholder::{Feed, Placeholder};
use crate::session::{
    eval_step, train_step, GradientDescent, MeanLoss, Session, Summaries, Summary,
};

/// The classifier to train.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Architecture {
    /// Logistic regression on flattened images.
    OneLayer(OneLayerConfig),
    /// Two-layer perceptron on flattened images.
    TwoLayer(TwoLayerConfig),
    /// Convolutional network on `[28, 28, 1]` images.
    ConvNet(ConvNetConfig),
}

/// Configuration of a [training run](run).
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// The classifier to train.
    pub architecture: Architecture,
    /// Number of training steps, one minibatch each.
    #[config(default = 300)]
    pub num_steps: usize,
    /// Number of examples per minibatch.
    #[config(default = 64)]
    pub batch_size: usize,
    /// Gradient descent learning rate.
    #[config(default = 0.1)]
    pub learning_rate: f64,
    /// Seed of the backend and of the synthetic data.
    #[config(default = 42)]
    pub seed: u64,
    /// Log a summary every `log_interval` steps.
    #[config(default = 50)]
    pub log_interval: usize,
    /// Number of held-out examples evaluated after training.
    #[config(default = 256)]
    pub eval_size: usize,
}

/// Errors of a [training run](run).
#[derive(thiserror::Error, Debug)]
pub enum TrainingError {
    /// Building the classifier or binding data failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Writing artifacts failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a [training run](run).
#[derive(new, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Number of training steps run.
    pub steps: usize,
    /// Loss of the last training minibatch.
    pub final_loss: f32,
    /// Summary of the held-out minibatch.
    pub eval: Summary,
}

impl Display for TrainingReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} steps, final loss {:.4}, held-out {}",
            self.steps, self.final_loss, self.eval
        )
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<(), GraphError> {
        for (name, value) in [
            ("num_steps", self.num_steps),
            ("batch_size", self.batch_size),
            ("log_interval", self.log_interval),
            ("eval_size", self.eval_size),
        ] {
            if value == 0 {
                return Err(GraphError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        Ok(())
    }
}

fn create_artifact_dir(artifact_dir: &str) -> std::io::Result<()> {
    // Remove existing artifacts so the experiment log only covers this run.
    std::fs::remove_dir_all(artifact_dir).ok();
    std::fs::create_dir_all(artifact_dir)
}

/// Train the configured classifier on synthetic digits with gradient descent.
///
/// The configuration and the experiment log are written to `artifact_dir`.
pub fn run<B: AutodiffBackend>(
    artifact_dir: &str,
    config: TrainingConfig,
    device: B::Device,
) -> Result<TrainingReport, TrainingError> {
    config.validate()?;
    create_artifact_dir(artifact_dir)?;
    config.save(format!("{artifact_dir}/config.json"))?;
    install_file_logger(&format!("{artifact_dir}/experiment.log"));

    B::seed(config.seed);

    let y = target_placeholder();

    match &config.architecture {
        Architecture::OneLayer(model) => {
            let x = input_placeholder();
            let model = model.init::<B>(&x, &y, &device)?;
            fit::<B, _, 2>(model, &x, &y, &config, device)
        }
        Architecture::TwoLayer(model) => {
            let x = input_placeholder();
            let model = model.init::<B>(&x, &y, &device)?;
            fit::<B, _, 2>(model, &x, &y, &config, device)
        }
        Architecture::ConvNet(model) => {
            let x = image_placeholder();
            let model = model.init::<B>(&x, &y, &device)?;
            fit::<B, _, 4>(model, &x, &y, &config, device)
        }
    }
}

fn fit<B, M, const D: usize>(
    model: M,
    x: &Placeholder,
    y: &Placeholder,
    config: &TrainingConfig,
    device: B::Device,
) -> Result<TrainingReport, TrainingError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Signature + TrainStep<Feed<B, D>, ClassifierOutput<B>>,
    M::InnerModule: ValidStep<Feed<B::InnerBackend, D>, ClassifierOutput<B::InnerBackend>>,
{
    log::info!(
        "Training {:?} for {} steps on {}",
        config.architecture,
        config.num_steps,
        x
    );

    let mut data = SyntheticDigits::new(config.seed);
    let mut session = Session::new(model, device);
    let optim = SgdConfig::new().init::<B, M>();
    let mut train_op = GradientDescent::new(optim, config.learning_rate);
    let mut final_loss = f32::NAN;

    for step in 1..=config.num_steps {
        let batch = data.minibatch(config.batch_size)?;
        let (_, loss, summary) = train_step::<B, M, _, _, _, D>(
            &mut session,
            &batch,
            x,
            y,
            &mut train_op,
            &MeanLoss,
            &Summaries,
        )?;
        final_loss = loss;

        if step % config.log_interval == 0 || step == config.num_steps {
            log::info!("Step {step}/{} - {summary}", config.num_steps);
        }
    }

    let mut held_out = SyntheticDigits::new(config.seed.wrapping_add(1));
    let held_out = held_out.minibatch(config.eval_size)?;
    let eval = eval_step::<B, M, _, D>(&session, &held_out, x, y, &Summaries)?;
    log::info!("Evaluation - {eval}");

    Ok(TrainingReport::new(session.global_step(), final_loss, eval))
}
