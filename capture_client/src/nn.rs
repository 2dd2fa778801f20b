//! Image classifier.
//!
use std::io::{Cursor, Read};

use anyhow::{bail, Context, Result};
use image::{imageops, RgbImage};
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tract_onnx::prelude::*;

use crate::prediction::Prediction;

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Input edge length of Teachable Machine image models.
const DEFAULT_IMAGE_SIZE: u32 = 224;

/// Classifier producing one probability per known class.
#[allow(async_fn_in_trait)]
pub trait Model {
    fn total_classes(&self) -> usize;

    async fn predict(&mut self, frame: &RgbImage) -> Result<Vec<Prediction>>;
}

/// Loads a model from its definition and metadata.
#[allow(async_fn_in_trait)]
pub trait ModelLoader {
    type Model: Model;

    async fn load(&self, model_url: &Url, metadata_url: &Url) -> Result<Self::Model>;
}

/// The bundle holds no weights tract can run, e.g. a plain TensorFlow.js export.
#[derive(Debug, Error)]
#[error("model.json lists no ONNX weights file")]
pub struct MissingOnnxWeights;

/// Contents of `metadata.json` we care about.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub labels: Vec<String>,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
}

fn default_image_size() -> u32 {
    DEFAULT_IMAGE_SIZE
}

/// Contents of `model.json` we care about.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelManifest {
    #[serde(default)]
    weights_manifest: Vec<WeightsGroup>,
}

#[derive(Debug, Deserialize)]
struct WeightsGroup {
    #[serde(default)]
    paths: Vec<String>,
}

impl ModelManifest {
    fn onnx_weights(&self) -> Option<&str> {
        self.weights_manifest
            .iter()
            .flat_map(|group| group.paths.iter())
            .map(String::as_str)
            .find(|path| path.ends_with(".onnx"))
    }
}

/// Fetches a bundle over HTTP and builds a [`TractClassifier`] from it.
pub struct TractLoader {
    client: Client,
}

impl TractLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(bytes.to_vec())
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let bytes = self.fetch(url).await?;
        serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", url))
    }
}

impl ModelLoader for TractLoader {
    type Model = TractClassifier;

    async fn load(&self, model_url: &Url, metadata_url: &Url) -> Result<TractClassifier> {
        let metadata: Metadata = self.fetch_json(metadata_url).await?;
        let manifest: ModelManifest = self.fetch_json(model_url).await?;

        let weights = manifest.onnx_weights().ok_or(MissingOnnxWeights)?;
        let weights_url = model_url.join(weights)?;
        log::info!(
            "Loading {} classes from {}",
            metadata.labels.len(),
            &weights_url
        );
        let weights = self.fetch(&weights_url).await?;

        TractClassifier::from_onnx(&mut Cursor::new(weights), metadata)
    }
}

/// Image classifier running an ONNX graph on tract.
///
/// The graph takes a `[1, size, size, 3]` image with values in `[-1, 1]` and
/// returns one probability per label.
pub struct TractClassifier {
    model: NnModel,
    labels: Vec<String>,
    size: u32,
}

impl TractClassifier {
    pub fn from_onnx(reader: &mut dyn Read, metadata: Metadata) -> Result<Self> {
        if metadata.labels.is_empty() {
            bail!("metadata lists no labels");
        }
        let size = metadata.image_size as usize;

        let input_fact = InferenceFact::dt_shape(f32::datum_type(), tvec!(1, size, size, 3));
        let model = tract_onnx::onnx()
            .model_for_read(reader)?
            .with_input_fact(0, input_fact)?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self {
            model,
            labels: metadata.labels,
            size: metadata.image_size,
        })
    }

    fn preproc(&self, frame: &RgbImage) -> Tensor {
        let resized: RgbImage =
            imageops::resize(frame, self.size, self.size, imageops::FilterType::Triangle);

        let size = self.size as usize;
        tract_ndarray::Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
            resized[(x as _, y as _)][c] as f32 / 127.5 - 1.0
        })
        .into()
    }
}

impl Model for TractClassifier {
    fn total_classes(&self) -> usize {
        self.labels.len()
    }

    async fn predict(&mut self, frame: &RgbImage) -> Result<Vec<Prediction>> {
        let input = self.preproc(frame);
        let outputs = self.model.run(tvec!(input.into()))?;

        let probabilities: Vec<f32> = outputs
            .first()
            .context("model produced no output")?
            .to_array_view::<f32>()?
            .iter()
            .copied()
            .collect();

        label_probabilities(&self.labels, probabilities)
    }
}

/// Pair every label with its probability.
fn label_probabilities(labels: &[String], probabilities: Vec<f32>) -> Result<Vec<Prediction>> {
    if probabilities.len() != labels.len() {
        bail!(
            "model returned {} probabilities for {} labels",
            probabilities.len(),
            labels.len()
        );
    }

    Ok(labels
        .iter()
        .zip(probabilities)
        .map(|(label, probability)| Prediction::new(label.clone(), probability))
        .collect())
}
