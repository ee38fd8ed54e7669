//! Search filters and summary statistics
//!
//! A filter is a set of independent optional predicates combined with
//! logical AND; omitted predicates impose no constraint. Queries preserve
//! snapshot order and never deduplicate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::record::{Model, SimulationResult};
use super::snapshot::CatalogSnapshot;
use crate::error::{Result, VmrError};

/// Filter predicates for model search.
///
/// Matching rules per field:
/// - `name`, `disease`, `model_creator`: case-insensitive substring.
///   Substring matching for `disease` is deliberate - the catalog mixes
///   full labels and abbreviations, so "Coarctation" should match
///   "Coarctation of Aorta". Pass the full label for an exact hit.
/// - `anatomy`, `sex`: case-insensitive exact match.
/// - `species`: case-insensitive exact match, also accepting the
///   listing's `H`/`A` codes for Human/Animal.
/// - `age_min`/`age_max`: inclusive bounds; records without a recorded
///   age are excluded whenever either bound is set.
/// - `has_*` flags: exact match against the availability flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelFilter {
    pub name: Option<String>,
    pub anatomy: Option<String>,
    pub species: Option<String>,
    pub disease: Option<String>,
    pub sex: Option<String>,
    pub age_min: Option<f64>,
    pub age_max: Option<f64>,
    pub has_simulations: Option<bool>,
    pub has_meshes: Option<bool>,
    pub has_segmentations: Option<bool>,
    pub has_images: Option<bool>,
    pub has_paths: Option<bool>,
    pub has_results: Option<bool>,
    pub model_creator: Option<String>,
}

impl ModelFilter {
    /// Reject semantically malformed filter combinations.
    pub fn validate(&self) -> Result<()> {
        if let (Some(lo), Some(hi)) = (self.age_min, self.age_max) {
            if lo > hi {
                return Err(VmrError::InvalidFilter {
                    reason: format!("age_min ({lo}) is greater than age_max ({hi})"),
                });
            }
        }
        Ok(())
    }

    /// Whether a model satisfies every supplied predicate.
    pub fn matches(&self, model: &Model) -> bool {
        if let Some(ref pattern) = self.name {
            if !contains_ci(&model.name, pattern) {
                return false;
            }
        }
        if let Some(ref pattern) = self.anatomy {
            if !eq_ci(&model.anatomy, pattern) {
                return false;
            }
        }
        if let Some(ref pattern) = self.species {
            if !species_matches(&model.species, pattern) {
                return false;
            }
        }
        if let Some(ref pattern) = self.disease {
            if !contains_ci(&model.disease, pattern) {
                return false;
            }
        }
        if let Some(ref pattern) = self.sex {
            if !eq_ci(&model.sex, pattern) {
                return false;
            }
        }
        if self.age_min.is_some() || self.age_max.is_some() {
            let Some(age) = model.age else {
                return false;
            };
            if self.age_min.is_some_and(|lo| age < lo) {
                return false;
            }
            if self.age_max.is_some_and(|hi| age > hi) {
                return false;
            }
        }
        if let Some(wanted) = self.has_simulations {
            if model.has_simulations != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.has_meshes {
            if model.has_meshes != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.has_segmentations {
            if model.has_segmentations != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.has_images {
            if model.has_images != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.has_paths {
            if model.has_paths != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.has_results {
            if model.has_results != wanted {
                return false;
            }
        }
        if let Some(ref pattern) = self.model_creator {
            if !contains_ci(&model.model_creator, pattern) {
                return false;
            }
        }
        true
    }
}

/// Query a snapshot with a filter set.
///
/// All supplied predicates combine with logical AND. Results keep the
/// snapshot's record order and may be empty.
pub fn query<'a>(snapshot: &'a CatalogSnapshot, filter: &ModelFilter) -> Result<Vec<&'a Model>> {
    filter.validate()?;
    Ok(snapshot.models.iter().filter(|m| filter.matches(m)).collect())
}

/// Filter predicates for simulation results.
///
/// All fields are case-insensitive substring matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationFilter {
    pub model_name: Option<String>,
    pub fidelity: Option<String>,
    pub method: Option<String>,
    pub condition: Option<String>,
    pub results_type: Option<String>,
    pub file_type: Option<String>,
    pub creator: Option<String>,
}

impl SimulationFilter {
    /// Whether a simulation satisfies every supplied predicate.
    pub fn matches(&self, sim: &SimulationResult) -> bool {
        fn check(pattern: &Option<String>, value: &str) -> bool {
            pattern.as_deref().map_or(true, |p| contains_ci(value, p))
        }

        check(&self.model_name, &sim.model_name)
            && check(&self.fidelity, &sim.fidelity)
            && check(&self.method, &sim.method)
            && check(&self.condition, &sim.condition)
            && check(&self.results_type, &sim.results_type)
            && check(&self.file_type, &sim.file_type)
            && check(&self.creator, &sim.creator)
    }

    /// Apply the filter to a slice of simulations, preserving order.
    pub fn apply<'a>(&self, sims: &'a [SimulationResult]) -> Vec<&'a SimulationResult> {
        sims.iter().filter(|s| self.matches(s)).collect()
    }
}

/// Aggregate statistics over a set of models.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub by_species: BTreeMap<String, usize>,
    pub by_anatomy: BTreeMap<String, usize>,
    pub by_disease: BTreeMap<String, usize>,
    pub with_simulations: usize,
    pub with_meshes: usize,
    pub with_segmentations: usize,
    pub age: Option<AgeStats>,
    pub total_size_bytes: u64,
}

/// Age statistics over the models that record an age.
#[derive(Debug, Clone, Serialize)]
pub struct AgeStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

/// Summarize model counts by category, feature availability, and age.
pub fn summarize(models: &[Model]) -> Summary {
    let mut summary = Summary {
        total: models.len(),
        ..Default::default()
    };

    for model in models {
        let species = non_empty_or_unknown(&model.species);
        *summary.by_species.entry(species).or_insert(0) += 1;
        let anatomy = non_empty_or_unknown(&model.anatomy);
        *summary.by_anatomy.entry(anatomy).or_insert(0) += 1;
        let disease = non_empty_or_unknown(&model.disease);
        *summary.by_disease.entry(disease).or_insert(0) += 1;

        if model.has_simulations {
            summary.with_simulations += 1;
        }
        if model.has_meshes {
            summary.with_meshes += 1;
        }
        if model.has_segmentations {
            summary.with_segmentations += 1;
        }
        summary.total_size_bytes += model.file_size.unwrap_or(0);
    }

    let ages: Vec<f64> = models.iter().filter_map(|m| m.age).collect();
    if !ages.is_empty() {
        let min = ages.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = ages.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = ages.iter().sum::<f64>() / ages.len() as f64;
        summary.age = Some(AgeStats {
            min,
            max,
            mean,
            count: ages.len(),
        });
    }

    summary
}

fn non_empty_or_unknown(value: &str) -> String {
    if value.is_empty() {
        "Unknown".to_string()
    } else {
        value.to_string()
    }
}

fn eq_ci(value: &str, pattern: &str) -> bool {
    !value.is_empty() && value.eq_ignore_ascii_case(pattern)
}

fn contains_ci(value: &str, pattern: &str) -> bool {
    if value.is_empty() || pattern.is_empty() {
        return false;
    }
    value.to_lowercase().contains(&pattern.to_lowercase())
}

/// Species comparison accepting the listing's single-letter codes.
fn species_matches(value: &str, pattern: &str) -> bool {
    if value.is_empty() || pattern.is_empty() {
        return false;
    }
    normalize_species(value) == normalize_species(pattern)
}

fn normalize_species(raw: &str) -> String {
    let lower = raw.to_lowercase();
    match lower.as_str() {
        "h" | "human" => "human".to_string(),
        "a" | "animal" => "animal".to_string(),
        _ => lower,
    }
}
