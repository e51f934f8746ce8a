use std::path::Path;
use tract_onnx::prelude::*;

use crate::preprocess::{InputBatch, INPUT_SIZE};

/// Classifieur partagé en lecture seule entre les workers.
pub trait Classifier: Send + Sync {
    /// Vecteur de probabilités, une entrée par classe.
    fn classify(&self, batch: &InputBatch) -> anyhow::Result<Vec<f32>>;

    /// Nombre de classes déclaré par le modèle, s'il est connu.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

/// Modèle ONNX (export Keras, entrée NHWC) exécuté avec tract.
pub struct ModelInference {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    num_classes: Option<usize>,
}

impl ModelInference {
    pub fn load<P: AsRef<Path>>(model_path: P) -> TractResult<Self> {
        let size = INPUT_SIZE as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, size, size, 3)),
            )?
            .into_optimized()?;

        let num_classes = model
            .output_fact(0)?
            .shape
            .as_concrete()
            .and_then(|shape| shape.last().copied());

        Ok(Self {
            model: model.into_runnable()?,
            num_classes,
        })
    }
}

impl Classifier for ModelInference {
    fn classify(&self, batch: &InputBatch) -> anyhow::Result<Vec<f32>> {
        let input: Tensor = batch.clone().into_tensor();
        let outputs = self.model.run(tvec!(input.into()))?;

        let scores: Vec<f32> = outputs[0].to_array_view::<f32>()?.iter().copied().collect();
        if scores.is_empty() {
            anyhow::bail!("aucune sortie du modèle");
        }
        Ok(scores)
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Matched(usize),
    Unidentified,
}

/// Arrondit chaque score (demi vers le pair) et n'accepte qu'un vecteur
/// one-hot. Somme nulle ou supérieure à 1 : pas d'identification.
pub fn decide(scores: &[f32]) -> Decision {
    let rounded: Vec<f32> = scores.iter().map(|s| s.round_ties_even()).collect();
    let total: f32 = rounded.iter().sum();
    if total != 1.0 {
        return Decision::Unidentified;
    }

    let mut hot = rounded
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == 1.0)
        .map(|(i, _)| i);
    match (hot.next(), hot.next()) {
        (Some(index), None) => Decision::Matched(index),
        _ => Decision::Unidentified,
    }
}
