//! Catalog record types
//!
//! A `Model` is one entry in the repository's project listing; a
//! `SimulationResult` is one downloadable result bundle belonging to a
//! model. Records are built only by parsing a catalog snapshot and are
//! immutable once constructed.

use serde::{Deserialize, Serialize};

/// A vascular model from the repository catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Unique model identifier (e.g., "0001_H_AO_SVD")
    pub name: String,

    /// Previous naming convention identifier
    #[serde(default)]
    pub legacy_name: String,

    /// Image reference number
    #[serde(default)]
    pub image_number: String,

    /// Patient sex (Male/Female)
    #[serde(default)]
    pub sex: String,

    /// Patient age in years, if recorded
    #[serde(default)]
    pub age: Option<f64>,

    /// Species (Human/Animal)
    #[serde(default)]
    pub species: String,

    /// Patient ethnicity if available
    #[serde(default)]
    pub ethnicity: String,

    /// Animal type when species is Animal
    #[serde(default)]
    pub animal: String,

    /// Anatomical region (e.g., Aorta, Coronary)
    #[serde(default)]
    pub anatomy: String,

    /// Disease condition label (e.g., "Healthy", "Coarctation of Aorta")
    #[serde(default)]
    pub disease: String,

    /// Medical procedure if any
    #[serde(default)]
    pub procedure: String,

    /// Whether the bundle includes imaging data
    #[serde(default)]
    pub has_images: bool,

    /// Whether the bundle includes centerline paths
    #[serde(default)]
    pub has_paths: bool,

    /// Whether the bundle includes segmentations
    #[serde(default)]
    pub has_segmentations: bool,

    /// Whether the bundle includes 3D models
    #[serde(default)]
    pub has_models: bool,

    /// Whether the bundle includes computational meshes
    #[serde(default)]
    pub has_meshes: bool,

    /// Whether simulation result bundles exist for this model
    #[serde(default)]
    pub has_simulations: bool,

    /// Whether results are available
    #[serde(default)]
    pub has_results: bool,

    /// Additional notes
    #[serde(default)]
    pub notes: String,

    /// Digital Object Identifier for citation
    #[serde(default)]
    pub doi: String,

    /// Citation information
    #[serde(default)]
    pub citation: String,

    /// Creator of the model
    #[serde(default)]
    pub model_creator: String,

    /// Size of the downloadable bundle in bytes, if published
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl Model {
    /// URL of the model's ZIP bundle.
    pub fn download_url(&self, base_url: &str) -> String {
        format!("{}/svprojects/{}.zip", base_url, self.name)
    }

    /// URL of the model's PDF documentation.
    pub fn pdf_url(&self, base_url: &str) -> String {
        format!("{}/vmr-pdfs/{}.pdf", base_url, self.name)
    }

    /// URL of the model's preview image.
    pub fn image_url(&self, base_url: &str) -> String {
        format!("{}/img/vmr-images/{}.png", base_url, self.name)
    }

    /// One-line "name | anatomy | disease | species" label for listings.
    pub fn display_label(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        for field in [&self.anatomy, &self.disease, &self.species] {
            if !field.is_empty() {
                parts.push(field);
            }
        }
        parts.join(" | ")
    }
}

/// A simulation result bundle belonging to a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Name of the owning model
    pub model_name: String,

    /// Filename of the downloadable archive
    pub full_filename: String,

    /// Model image reference number
    #[serde(default)]
    pub image_number: String,

    /// Short display name for the simulation
    #[serde(default)]
    pub short_name: String,

    /// Previous naming convention
    #[serde(default)]
    pub legacy_name: String,

    /// Simulation fidelity descriptor (e.g., "3D")
    #[serde(default)]
    pub fidelity: String,

    /// Simulation method (e.g., "RIGID", "FSI")
    #[serde(default)]
    pub method: String,

    /// Simulation condition
    #[serde(default)]
    pub condition: String,

    /// Type of results in the bundle
    #[serde(default)]
    pub results_type: String,

    /// Result file format (e.g., "VTP", "VTU")
    #[serde(default)]
    pub file_type: String,

    /// Simulation creator
    #[serde(default)]
    pub creator: String,

    /// Additional notes
    #[serde(default)]
    pub notes: String,

    /// Size of the downloadable archive in bytes, if published
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl SimulationResult {
    /// URL of the simulation result archive.
    pub fn download_url(&self, base_url: &str) -> String {
        format!(
            "{}/svresults/{}/{}",
            base_url, self.model_name, self.full_filename
        )
    }

    /// Short name when present, filename otherwise.
    pub fn display_name(&self) -> &str {
        if self.short_name.is_empty() {
            &self.full_filename
        } else {
            &self.short_name
        }
    }
}
