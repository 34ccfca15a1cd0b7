use image::{
    imageops::{self, FilterType},
    ImageBuffer, Rgb,
};
use thiserror::Error;
use tracing::info;

use crate::config::{Config, TensorLayout};
use crate::labels::{CatalogError, ClassCatalog};

/// Square input edge the network was trained on.
pub const IMAGE_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;
pub const INPUT_LEN: usize = (IMAGE_SIZE * IMAGE_SIZE) as usize * CHANNELS;

// ImageNet statistics used at training time.
const MEAN: [f32; CHANNELS] = [0.485, 0.456, 0.406];
const STD: [f32; CHANNELS] = [0.229, 0.224, 0.225];

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("inference backend error: {0}")]
    Backend(String),
    #[error("model produced {outputs} scores but {labels} class labels are configured")]
    LabelMismatch { outputs: usize, labels: usize },
    #[error("model produced no usable scores")]
    EmptyOutput,
}

/// One forward pass over a preprocessed image.
pub trait Classifier: Send + Sync {
    /// `input` holds `INPUT_LEN` normalized values in `self.layout()` order.
    /// Returns one score per class.
    fn forward(&self, input: &[f32]) -> Result<Vec<f32>, ModelError>;

    fn layout(&self) -> TensorLayout;

    fn device(&self) -> &str {
        "cpu"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub suggestion: String,
    pub organic_suggestion: String,
}

/// Process-wide model handle. Immutable once built, so it is shared without locking.
pub struct Model {
    classifier: Box<dyn Classifier>,
    catalog: ClassCatalog,
}

impl Model {
    /// Checks once, with a warm-up pass, that the output width matches the label count.
    pub fn new(classifier: Box<dyn Classifier>, catalog: ClassCatalog) -> Result<Self, ModelError> {
        let warmup = classifier.forward(&vec![0.0; INPUT_LEN])?;
        if warmup.len() != catalog.len() {
            return Err(ModelError::LabelMismatch {
                outputs: warmup.len(),
                labels: catalog.len(),
            });
        }
        Ok(Model {
            classifier,
            catalog,
        })
    }

    pub fn load(config: &Config) -> Result<Self, ModelError> {
        let catalog = ClassCatalog::from_files(&config.class_list_path, &config.suggestions_path)?;
        let classifier = crate::tf::load_classifier(config)?;
        let model = Self::new(classifier, catalog)?;
        info!(
            "Model loaded from {} with {} classes on {}",
            config.model_path.display(),
            model.catalog.len(),
            model.device()
        );
        Ok(model)
    }

    pub fn device(&self) -> &str {
        self.classifier.device()
    }

    pub fn predict(&self, image_data: &[u8]) -> Result<Prediction, ModelError> {
        let input = preprocess_image(image_data, self.classifier.layout())?;
        let scores = self.classifier.forward(&input)?;
        let index = argmax(&scores).ok_or(ModelError::EmptyOutput)?;
        let label = self
            .catalog
            .label(index)
            .ok_or(ModelError::LabelMismatch {
                outputs: scores.len(),
                labels: self.catalog.len(),
            })?
            .to_string();

        Ok(Prediction {
            index,
            suggestion: self.catalog.suggestion(&label).to_string(),
            organic_suggestion: self.catalog.organic_suggestion(&label).to_string(),
            label,
        })
    }
}

/// Decode, force RGB, resize to `IMAGE_SIZE` square, scale to [0, 1] and normalize per channel.
pub fn preprocess_image(image_data: &[u8], layout: TensorLayout) -> Result<Vec<f32>, ModelError> {
    let rgb = image::load_from_memory(image_data)?.to_rgb8();
    let resized: ImageBuffer<Rgb<u8>, Vec<u8>> =
        imageops::resize(&rgb, IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle);

    let plane = (IMAGE_SIZE * IMAGE_SIZE) as usize;
    let mut flat_img = vec![0.0f32; INPUT_LEN];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let pos = (y * IMAGE_SIZE + x) as usize;
        for c in 0..CHANNELS {
            let value = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            let idx = match layout {
                TensorLayout::Nchw => c * plane + pos,
                TensorLayout::Nhwc => pos * CHANNELS + c,
            };
            flat_img[idx] = value;
        }
    }

    Ok(flat_img)
}

/// Index of the highest score; ties go to the lowest index, NaN never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}
