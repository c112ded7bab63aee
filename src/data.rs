use burn::data::dataloader::batcher::Batcher;
use burn::tensor::TensorData;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::placeholder::{IMAGE_FEATURES, IMAGE_SIDE, NUM_CLASSES};

/// One minibatch of raw paired arrays, ready to be bound to placeholders.
#[derive(new, Debug, Clone)]
pub struct Minibatch {
    /// Images, `[batch_size, ...]`.
    pub images: TensorData,
    /// One-hot targets, `[batch_size, num_classes]`.
    pub targets: TensorData,
}

impl Minibatch {
    /// Create a minibatch from row-major images and targets holding `batch_size` rows each.
    pub fn from_vecs(
        images: Vec<f32>,
        targets: Vec<f32>,
        batch_size: usize,
    ) -> Result<Self, GraphError> {
        let images = rows(images, batch_size, "images")?;
        let targets = rows(targets, batch_size, "targets")?;

        Ok(Self::new(images, targets))
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.images.shape.first().copied().unwrap_or_default()
    }

    /// Whether the minibatch holds no example.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn rows(values: Vec<f32>, batch_size: usize, what: &str) -> Result<TensorData, GraphError> {
    if batch_size == 0 || values.is_empty() || values.len() % batch_size != 0 {
        return Err(GraphError::Data(format!(
            "Cannot split {} {what} values into {batch_size} rows",
            values.len()
        )));
    }

    let columns = values.len() / batch_size;
    Ok(TensorData::new(values, [batch_size, columns]))
}

/// One-hot encode `labels` as a `[labels.len(), num_classes]` array.
pub fn one_hot(labels: &[u8], num_classes: usize) -> Result<TensorData, GraphError> {
    let values = encode(labels, num_classes)?;

    Ok(TensorData::new(values, [labels.len(), num_classes]))
}

fn encode(labels: &[u8], num_classes: usize) -> Result<Vec<f32>, GraphError> {
    let mut values = vec![0.0f32; labels.len() * num_classes];

    for (row, label) in labels.iter().enumerate() {
        let label = *label as usize;
        if label >= num_classes {
            return Err(GraphError::Data(format!(
                "Label {label} is out of range for {num_classes} classes"
            )));
        }
        values[row * num_classes + label] = 1.0;
    }

    Ok(values)
}

/// A labelled digit image.
#[derive(new, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitItem {
    /// Flattened pixels in `[0, 1]`.
    pub image: Vec<f32>,
    /// The digit.
    pub label: u8,
}

/// Batches [digit items](DigitItem) into [minibatches](Minibatch).
#[derive(new, Debug, Clone)]
pub struct MinibatchBatcher {
    num_classes: usize,
}

impl Default for MinibatchBatcher {
    fn default() -> Self {
        Self::new(NUM_CLASSES)
    }
}

impl Batcher<DigitItem, Result<Minibatch, GraphError>> for MinibatchBatcher {
    fn batch(&self, items: Vec<DigitItem>) -> Result<Minibatch, GraphError> {
        let features = items.first().map(|item| item.image.len()).unwrap_or_default();

        if let Some(item) = items.iter().find(|item| item.image.len() != features) {
            return Err(GraphError::Data(format!(
                "Expected images of {features} pixels, got {}",
                item.image.len()
            )));
        }

        let labels = items.iter().map(|item| item.label).collect::<Vec<_>>();
        let targets = encode(&labels, self.num_classes)?;
        let images = items.into_iter().flat_map(|item| item.image).collect();

        Minibatch::from_vecs(images, targets, labels.len())
    }
}

/// An endless, seeded source of synthetic digits.
///
/// Each class draws a horizontal and a vertical stroke at class-dependent positions over
/// Gaussian background noise, which is easy enough for every classifier to learn.
#[derive(Debug, Clone)]
pub struct SyntheticDigits {
    rng: StdRng,
    noise: f32,
}

impl SyntheticDigits {
    /// Create a source with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            noise: 0.1,
        }
    }

    /// Draw `batch_size` items and batch them.
    pub fn minibatch(&mut self, batch_size: usize) -> Result<Minibatch, GraphError> {
        let items = self.by_ref().take(batch_size).collect();

        MinibatchBatcher::default().batch(items)
    }

    fn draw(&mut self, label: u8) -> Vec<f32> {
        let stroke = 4 + 2 * label as usize;
        let mut image = Vec::with_capacity(IMAGE_FEATURES);

        for row in 0..IMAGE_SIDE {
            for col in 0..IMAGE_SIDE {
                let noise: f32 = self.rng.sample(StandardNormal);
                let ink = if row == stroke || col == IMAGE_SIDE - 1 - stroke {
                    1.0
                } else {
                    0.0
                };
                image.push((ink + self.noise * noise).clamp(0.0, 1.0));
            }
        }

        image
    }
}

impl Iterator for SyntheticDigits {
    type Item = DigitItem;

    fn next(&mut self) -> Option<Self::Item> {
        let label = self.rng.gen_range(0..NUM_CLASSES as u8);

        Some(DigitItem::new(self.draw(label), label))
    }
}
