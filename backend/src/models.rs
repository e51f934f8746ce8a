use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::inference::{decide, Decision};

/// Table de référence livrée avec le binaire (ordre = index de classe du modèle).
const BUILTIN_REFERENCE: &str = include_str!("../data/reference.json");

pub const UNIDENTIFIED_MESSAGE: &str = "Hasil Identifikasi: Tidak Diketahui";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum WasteCategory {
    Organik,
    Anorganik,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReferenceRecord {
    pub name: String,
    pub category: WasteCategory,
    pub hazard: String,
    pub handling: String,
}

/// Liste immuable des fiches, indexée par classe de sortie du classifieur.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    records: Vec<ReferenceRecord>,
}

impl ReferenceTable {
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_json(BUILTIN_REFERENCE).context("table de référence intégrée invalide")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("lecture impossible: {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("table invalide: {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let records: Vec<ReferenceRecord> = serde_json::from_str(raw)?;
        if records.is_empty() {
            anyhow::bail!("la table de référence est vide");
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ReferenceRecord> {
        self.records.get(index)
    }

    /// Associe un vecteur de prédiction brut à une fiche. `Ok(None)` si le
    /// vecteur ne désigne pas exactement une classe.
    pub fn lookup(&self, scores: &[f32]) -> anyhow::Result<Option<&ReferenceRecord>> {
        if scores.len() != self.records.len() {
            anyhow::bail!(
                "vecteur de prédiction de taille {} pour {} classes",
                scores.len(),
                self.records.len()
            );
        }

        match decide(scores) {
            Decision::Matched(index) => Ok(self.records.get(index)),
            Decision::Unidentified => Ok(None),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct WasteInfo {
    #[serde(rename = "nama")]
    pub name: String,
    #[serde(rename = "Jenis Sampah")]
    pub category: WasteCategory,
    #[serde(rename = "Bahaya")]
    pub hazard: String,
    #[serde(rename = "Pengolahan")]
    pub handling: String,
}

impl From<&ReferenceRecord> for WasteInfo {
    fn from(record: &ReferenceRecord) -> Self {
        WasteInfo {
            name: record.name.clone(),
            category: record.category,
            hazard: record.hazard.clone(),
            handling: record.handling.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn unidentified() -> Self {
        MessageBody {
            message: UNIDENTIFIED_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
