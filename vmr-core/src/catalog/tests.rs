//! Integration tests for the catalog module

#[cfg(test)]
mod integration_tests {
    use crate::catalog::{query, CatalogSnapshot, Model, ModelFilter, SimulationResult};
    use pretty_assertions::assert_eq;

    /// The two-model scenario used throughout: a healthy adult aorta with
    /// simulations and a pediatric coarctation case without.
    fn two_model_snapshot() -> CatalogSnapshot {
        CatalogSnapshot {
            fetched_at: 1_700_000_000,
            models: vec![
                Model {
                    name: "0001_H_AO_SVD".to_string(),
                    anatomy: "Aorta".to_string(),
                    species: "Human".to_string(),
                    disease: "Healthy".to_string(),
                    sex: "Male".to_string(),
                    age: Some(45.0),
                    has_simulations: true,
                    has_meshes: true,
                    file_size: Some(1_048_576),
                    doi: "10.0000/example".to_string(),
                    ..Default::default()
                },
                Model {
                    name: "0002_H_AO_H".to_string(),
                    anatomy: "Aorta".to_string(),
                    species: "Human".to_string(),
                    disease: "Coarctation".to_string(),
                    sex: "Female".to_string(),
                    age: Some(10.0),
                    ..Default::default()
                },
            ],
            simulations: vec![SimulationResult {
                model_name: "0001_H_AO_SVD".to_string(),
                full_filename: "0001_pulsatile.zip".to_string(),
                method: "RIGID".to_string(),
                fidelity: "3D".to_string(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_anatomy_with_age_bound() {
        let snapshot = two_model_snapshot();

        let hits = query(
            &snapshot,
            &ModelFilter {
                anatomy: Some("Aorta".to_string()),
                age_max: Some(18.0),
                ..Default::default()
            },
        )
        .unwrap();

        let names: Vec<&str> = hits.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["0002_H_AO_H"]);
    }

    #[test]
    fn test_species_without_matches_is_empty() {
        let snapshot = two_model_snapshot();

        let hits = query(
            &snapshot,
            &ModelFilter {
                species: Some("Animal".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(hits.is_empty());
    }

    /// Combined filters must equal the intersection of their standalone
    /// result sets, for every pairing used here.
    #[test]
    fn test_and_composition_over_filter_pairs() {
        let snapshot = two_model_snapshot();

        let singles = [
            ModelFilter {
                anatomy: Some("Aorta".to_string()),
                ..Default::default()
            },
            ModelFilter {
                sex: Some("Female".to_string()),
                ..Default::default()
            },
            ModelFilter {
                has_simulations: Some(true),
                ..Default::default()
            },
            ModelFilter {
                age_min: Some(18.0),
                ..Default::default()
            },
        ];

        for a in &singles {
            for b in &singles {
                let mut combined = a.clone();
                // Later fields win; identical pairings stay single-filter
                merge_into(&mut combined, b);

                let combined_names: Vec<&str> = query(&snapshot, &combined)
                    .unwrap()
                    .iter()
                    .map(|m| m.name.as_str())
                    .collect();

                let hits_a = query(&snapshot, a).unwrap();
                let hits_b = query(&snapshot, b).unwrap();
                let intersection: Vec<&str> = hits_a
                    .iter()
                    .filter(|m| hits_b.iter().any(|n| n.name == m.name))
                    .map(|m| m.name.as_str())
                    .collect();

                assert_eq!(combined_names, intersection);
            }
        }
    }

    fn merge_into(dst: &mut ModelFilter, src: &ModelFilter) {
        if src.anatomy.is_some() {
            dst.anatomy = src.anatomy.clone();
        }
        if src.sex.is_some() {
            dst.sex = src.sex.clone();
        }
        if src.has_simulations.is_some() {
            dst.has_simulations = src.has_simulations;
        }
        if src.age_min.is_some() {
            dst.age_min = src.age_min;
        }
    }

    #[test]
    fn test_no_filter_is_identity() {
        let snapshot = two_model_snapshot();
        let hits = query(&snapshot, &ModelFilter::default()).unwrap();

        assert_eq!(hits.len(), snapshot.model_count());
        for (hit, model) in hits.iter().zip(snapshot.models.iter()) {
            assert_eq!(*hit, model);
        }
    }

    /// A record placed in a snapshot comes back by identifier with every
    /// field unchanged.
    #[test]
    fn test_get_model_round_trip() {
        let snapshot = two_model_snapshot();
        let original = snapshot.models[0].clone();

        let found = snapshot.get_model("0001_H_AO_SVD").unwrap();
        assert_eq!(*found, original);
        assert_eq!(found.doi, "10.0000/example");
        assert_eq!(found.file_size, Some(1_048_576));
    }

    #[test]
    fn test_simulations_unreachable_without_owner() {
        let snapshot = two_model_snapshot();

        // Simulations hang off their owning model; an absent owner means
        // no reachable simulations.
        assert!(snapshot.get_model("0099_H_CORO_X").is_err());
        assert!(snapshot.simulations_for("0099_H_CORO_X").is_empty());
    }
}
