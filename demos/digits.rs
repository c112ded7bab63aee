#![recursion_limit = "256"]

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use digit_classifiers::training::{self, Architecture, TrainingConfig};
use digit_classifiers::{ConvNetConfig, OneLayerConfig, Padding, TwoLayerConfig};

type Backend = Autodiff<NdArray<f32>>;

static ARTIFACT_DIR: &str = "/tmp/digit-classifiers";

fn architecture(name: &str) -> Result<Architecture, String> {
    match name {
        "onelayer" => Ok(Architecture::OneLayer(OneLayerConfig::new())),
        "twolayer" => Ok(Architecture::TwoLayer(TwoLayerConfig::new())),
        "convnet" => Ok(Architecture::ConvNet(
            ConvNetConfig::new().with_padding(Padding::Same),
        )),
        "convnet-valid" => Ok(Architecture::ConvNet(
            ConvNetConfig::new().with_padding(Padding::Valid),
        )),
        other => Err(format!(
            "Unknown architecture {other:?}, expected onelayer, twolayer, convnet or convnet-valid"
        )),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let name = std::env::args().nth(1).unwrap_or_else(|| "twolayer".to_string());
    let config = TrainingConfig::new(architecture(&name)?);

    let report = training::run::<Backend>(ARTIFACT_DIR, config, NdArrayDevice::Cpu)?;
    println!("{name}: {report}");

    Ok(())
}
