//! Catalog snapshot parsing and lookup
//!
//! A snapshot is the full set of model and simulation records as last
//! fetched from the repository. It is built in one shot from the three
//! remote CSV resources and replaced wholesale on refresh - a failed
//! parse never yields a partial snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::record::{Model, SimulationResult};
use crate::error::{Result, VmrError};

/// An immutable point-in-time copy of the repository catalog.
///
/// Record order matches the remote listing; queries preserve it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// When the snapshot was fetched (Unix timestamp, seconds)
    pub fetched_at: u64,

    /// All model records, in listing order
    pub models: Vec<Model>,

    /// All simulation result records, in listing order
    pub simulations: Vec<SimulationResult>,
}

impl CatalogSnapshot {
    /// Parse a snapshot from the repository's CSV resources.
    ///
    /// `sizes_csv` maps repository paths (e.g. `svprojects/<name>.zip`)
    /// to byte counts; matching sizes are joined onto the records.
    /// Rows without a name are skipped, as are unparseable header-only
    /// artifacts - but a malformed resource fails the whole parse.
    pub fn parse(
        projects_csv: &str,
        results_csv: &str,
        sizes_csv: &str,
        fetched_at: u64,
    ) -> Result<Self> {
        let sizes = parse_file_sizes(sizes_csv)?;

        let mut models = Vec::new();
        let mut reader = csv_reader(projects_csv);
        for row in reader.deserialize::<ProjectRow>() {
            let row = row?;
            if row.name.is_empty() {
                continue;
            }
            let mut model = row.into_model();
            model.file_size = sizes
                .get(&format!("svprojects/{}.zip", model.name))
                .copied();
            models.push(model);
        }

        let mut simulations = Vec::new();
        let mut reader = csv_reader(results_csv);
        for row in reader.deserialize::<ResultRow>() {
            let row = row?;
            if row.model_name.is_empty() || row.full_filename.is_empty() {
                continue;
            }
            let mut sim = row.into_simulation();
            sim.file_size = sizes
                .get(&format!(
                    "svresults/{}/{}",
                    sim.model_name, sim.full_filename
                ))
                .copied();
            simulations.push(sim);
        }

        Ok(Self {
            fetched_at,
            models,
            simulations,
        })
    }

    /// Exact-match model lookup by identifier.
    pub fn get_model(&self, name: &str) -> Result<&Model> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| VmrError::ModelNotFound {
                name: name.to_string(),
            })
    }

    /// All simulation records owned by a model, in listing order.
    pub fn simulations_for(&self, model_name: &str) -> Vec<&SimulationResult> {
        self.simulations
            .iter()
            .filter(|s| s.model_name == model_name)
            .collect()
    }

    /// Exact-match simulation lookup by owning model and archive filename.
    pub fn get_simulation(&self, model_name: &str, filename: &str) -> Result<&SimulationResult> {
        self.simulations
            .iter()
            .find(|s| s.model_name == model_name && s.full_filename == filename)
            .ok_or_else(|| VmrError::SimulationNotFound {
                model: model_name.to_string(),
                filename: filename.to_string(),
            })
    }

    /// Number of model records.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Number of simulation records.
    pub fn simulation_count(&self) -> usize {
        self.simulations.len()
    }
}

fn csv_reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

fn parse_file_sizes(content: &str) -> Result<HashMap<String, u64>> {
    let mut sizes = HashMap::new();
    let mut reader = csv_reader(content);
    for row in reader.deserialize::<SizeRow>() {
        let row = row?;
        if let Some(size) = row.size {
            if !row.name.is_empty() {
                sizes.insert(row.name, size);
            }
        }
    }
    Ok(sizes)
}

/// One row of `dataset-svprojects.csv`, keyed by the listing's headers.
#[derive(Debug, Deserialize)]
struct ProjectRow {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Legacy Name", default)]
    legacy_name: String,
    #[serde(rename = "Image Number", default)]
    image_number: String,
    #[serde(rename = "Sex", default)]
    sex: String,
    #[serde(rename = "Age", default, deserialize_with = "de_opt_f64")]
    age: Option<f64>,
    #[serde(rename = "Species", default)]
    species: String,
    #[serde(rename = "Ethnicity", default)]
    ethnicity: String,
    #[serde(rename = "Animal", default)]
    animal: String,
    #[serde(rename = "Anatomy", default)]
    anatomy: String,
    #[serde(rename = "Disease", default)]
    disease: String,
    #[serde(rename = "Procedure", default)]
    procedure: String,
    #[serde(rename = "Images", default, deserialize_with = "de_flag")]
    has_images: bool,
    #[serde(rename = "Paths", default, deserialize_with = "de_flag")]
    has_paths: bool,
    #[serde(rename = "Segmentations", default, deserialize_with = "de_flag")]
    has_segmentations: bool,
    #[serde(rename = "Models", default, deserialize_with = "de_flag")]
    has_models: bool,
    #[serde(rename = "Meshes", default, deserialize_with = "de_flag")]
    has_meshes: bool,
    #[serde(rename = "Simulations", default, deserialize_with = "de_flag")]
    has_simulations: bool,
    #[serde(rename = "Results", default, deserialize_with = "de_flag")]
    has_results: bool,
    #[serde(rename = "Notes", default)]
    notes: String,
    #[serde(rename = "DOI", default)]
    doi: String,
    #[serde(rename = "Citation", default)]
    citation: String,
    #[serde(rename = "Model Creator", default)]
    model_creator: String,
}

impl ProjectRow {
    fn into_model(self) -> Model {
        Model {
            name: self.name,
            legacy_name: self.legacy_name,
            image_number: self.image_number,
            sex: self.sex,
            age: self.age,
            species: self.species,
            ethnicity: self.ethnicity,
            animal: self.animal,
            anatomy: self.anatomy,
            disease: self.disease,
            procedure: self.procedure,
            has_images: self.has_images,
            has_paths: self.has_paths,
            has_segmentations: self.has_segmentations,
            has_models: self.has_models,
            has_meshes: self.has_meshes,
            has_simulations: self.has_simulations,
            has_results: self.has_results,
            notes: self.notes,
            doi: self.doi,
            citation: self.citation,
            model_creator: self.model_creator,
            file_size: None,
        }
    }
}

/// One row of `dataset-svresults.csv`.
#[derive(Debug, Deserialize)]
struct ResultRow {
    #[serde(rename = "Model Name", default)]
    model_name: String,
    #[serde(rename = "Full Simulation File Name", default)]
    full_filename: String,
    #[serde(rename = "Model Image Number", default)]
    image_number: String,
    #[serde(rename = "Short Simulation File Name", default)]
    short_name: String,
    #[serde(rename = "Legacy Simulation File Name", default)]
    legacy_name: String,
    #[serde(rename = "Simulation Fidelity", default)]
    fidelity: String,
    #[serde(rename = "Simulation Method", default)]
    method: String,
    #[serde(rename = "Simulation Condition", default)]
    condition: String,
    #[serde(rename = "Results Type", default)]
    results_type: String,
    #[serde(rename = "Results File Type", default)]
    file_type: String,
    #[serde(rename = "Simulation Creator", default)]
    creator: String,
    #[serde(rename = "Notes", default)]
    notes: String,
}

impl ResultRow {
    fn into_simulation(self) -> SimulationResult {
        SimulationResult {
            model_name: self.model_name,
            full_filename: self.full_filename,
            image_number: self.image_number,
            short_name: self.short_name,
            legacy_name: self.legacy_name,
            fidelity: self.fidelity,
            method: self.method,
            condition: self.condition,
            results_type: self.results_type,
            file_type: self.file_type,
            creator: self.creator,
            notes: self.notes,
            file_size: None,
        }
    }
}

/// One row of `file_sizes.csv`.
#[derive(Debug, Deserialize)]
struct SizeRow {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Size", default, deserialize_with = "de_opt_u64")]
    size: Option<u64>,
}

/// The listing encodes availability flags as `1`/`0`, `yes`/`no`, or an
/// empty cell; anything unrecognized reads as absent.
fn de_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "yes" | "true"))
        .unwrap_or(false))
}

fn de_opt_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse::<f64>().ok()))
}

fn de_opt_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let s = s.trim();
        s.parse::<u64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|f| f as u64))
    }))
}
