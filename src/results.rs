// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Classification results.

use ndarray::Array1;

use crate::utils::argmax;

/// Label reported when a prediction falls at or below the rejection threshold.
pub const REJECTED_LABEL: &str = "검출실패";

/// Timing information for one classification (in milliseconds).
#[derive(Debug, Clone, Default)]
pub struct Speed {
    /// Clip packing into the input tensor.
    pub preprocess: Option<f64>,
    /// Network forward pass.
    pub inference: Option<f64>,
    /// Softmax and label lookup.
    pub postprocess: Option<f64>,
}

impl Speed {
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Sum of the recorded stages.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0) + self.inference.unwrap_or(0.0) + self.postprocess.unwrap_or(0.0)
    }
}

/// Class probabilities with top-k helpers.
#[derive(Debug, Clone, PartialEq)]
pub struct Probs {
    /// Probabilities with shape (`num_classes`,).
    pub data: Array1<f32>,
}

impl Probs {
    #[must_use]
    pub const fn new(data: Array1<f32>) -> Self {
        Self { data }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Class index with the highest probability (0 when empty).
    #[must_use]
    pub fn top1(&self) -> usize {
        argmax(self.data.view()).unwrap_or(0)
    }

    #[must_use]
    pub fn top5(&self) -> Vec<usize> {
        self.top_k(5)
    }

    /// Indices of the `k` most probable classes, most probable first.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.data.len()).collect();
        indices.sort_by(|&a, &b| self.data[b].total_cmp(&self.data[a]).then(a.cmp(&b)));
        indices.truncate(k);
        indices
    }

    /// Probability of the top class (0.0 when empty).
    #[must_use]
    pub fn top1conf(&self) -> f32 {
        self.data.get(self.top1()).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn top5conf(&self) -> Vec<f32> {
        self.top5().iter().map(|&i| self.data[i]).collect()
    }
}

/// Outcome of classifying one clip.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Argmax of the logits.
    pub class_index: usize,
    /// Vocabulary label, or [`REJECTED_LABEL`] when rejected.
    pub label: String,
    pub probs: Probs,
    /// Raw network output.
    pub logits: Array1<f32>,
    /// Whether the confidence fell at or below the configured threshold.
    pub rejected: bool,
    pub speed: Speed,
}

impl Prediction {
    /// Probability of the predicted class.
    #[must_use]
    pub fn confidence(&self) -> f32 {
        self.probs.data.get(self.class_index).copied().unwrap_or(0.0)
    }

    /// One-line summary of the top classes, e.g. `병원 0.91, 아빠 0.05`.
    #[must_use]
    pub fn verbose(&self, names: &[String]) -> String {
        self.probs
            .top5()
            .iter()
            .map(|&i| {
                let name = names.get(i).map_or_else(|| i.to_string(), Clone::clone);
                format!("{} {:.2}", name, self.probs.data[i])
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
