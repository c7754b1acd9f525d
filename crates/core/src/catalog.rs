//! Scenario catalog and difficulty types.
//!
//! The catalog is a read-only directory of rehearsal scenarios, grouped by
//! category. It is fetched once per orchestrator activation and never
//! mutated by the orchestrator itself.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A single rehearsal scenario. Identity is `id`; the record itself is
/// immutable once it leaves the catalog source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
}

/// Scenario records grouped by category name.
///
/// A `BTreeMap` keeps category order stable for a given fetch, so repeated
/// renders of the same catalog never reorder.
pub type CategorizedCatalog = BTreeMap<String, Vec<ScenarioRecord>>;

/// Forces every record's `category` field to match the key it is stored
/// under. Catalog sources are not trusted to uphold this themselves.
pub fn normalize_catalog(mut catalog: CategorizedCatalog) -> CategorizedCatalog {
    for (category, records) in catalog.iter_mut() {
        for record in records.iter_mut() {
            if record.category != *category {
                record.category = category.clone();
            }
        }
    }
    catalog
}

/// Looks up a scenario anywhere in the catalog by its id.
pub fn find_scenario<'a>(catalog: &'a CategorizedCatalog, id: &str) -> Option<&'a ScenarioRecord> {
    catalog.values().flatten().find(|record| record.id == id)
}

/// How challenging the simulated counterpart behaves.
///
/// This is the canonical shape; deployments that send a bare tag such as
/// `"beginner"` are adapted on deserialization. The orchestrator only ever
/// compares levels for equality, which is defined by `id` alone.
#[derive(Debug, Clone, Serialize)]
pub struct DifficultyLevel {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl DifficultyLevel {
    pub fn beginner() -> Self {
        Self {
            id: "beginner".to_string(),
            name: "Beginner".to_string(),
            description: "A cooperative prospect who raises only light objections.".to_string(),
        }
    }

    pub fn advanced() -> Self {
        Self {
            id: "advanced".to_string(),
            name: "Advanced".to_string(),
            description: "A skeptical prospect who pushes back hard and controls the pace."
                .to_string(),
        }
    }

    /// The levels offered when the deployment does not supply its own.
    pub fn presets() -> Vec<Self> {
        vec![Self::beginner(), Self::advanced()]
    }

    fn from_tag(tag: &str) -> Self {
        let id = tag.trim().to_lowercase();
        let mut name = id.clone();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        Self {
            id,
            name,
            description: String::new(),
        }
    }
}

impl PartialEq for DifficultyLevel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DifficultyLevel {}

impl<'de> Deserialize<'de> for DifficultyLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Tag(String),
            Record {
                id: String,
                name: String,
                #[serde(default)]
                description: String,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Tag(tag) => DifficultyLevel::from_tag(&tag),
            Repr::Record {
                id,
                name,
                description,
            } => DifficultyLevel {
                id,
                name,
                description,
            },
        })
    }
}
