//! API Models
//!
//! DTOs for the REST surface, kept separate from the core domain types so
//! the OpenAPI schema derives stay out of the core crate.

use salescoach_core::{CategorizedCatalog, DifficultyLevel, ScenarioRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ScenarioDto {
    #[schema(example = "cold-1")]
    pub id: String,
    #[schema(example = "First Time Contact")]
    pub title: String,
    pub description: String,
    #[schema(example = "Cold Calling")]
    pub category: String,
}

impl From<&ScenarioRecord> for ScenarioDto {
    fn from(record: &ScenarioRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            category: record.category.clone(),
        }
    }
}

/// The scenario directory, keyed by category name.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct CatalogResponse(pub BTreeMap<String, Vec<ScenarioDto>>);

impl From<&CategorizedCatalog> for CatalogResponse {
    fn from(catalog: &CategorizedCatalog) -> Self {
        Self(
            catalog
                .iter()
                .map(|(category, records)| {
                    (
                        category.clone(),
                        records.iter().map(ScenarioDto::from).collect(),
                    )
                })
                .collect(),
        )
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct DifficultyDto {
    #[schema(example = "beginner")]
    pub id: String,
    #[schema(example = "Beginner")]
    pub name: String,
    pub description: String,
}

impl From<&DifficultyLevel> for DifficultyDto {
    fn from(level: &DifficultyLevel) -> Self {
        Self {
            id: level.id.clone(),
            name: level.name.clone(),
            description: level.description.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_response_preserves_grouping() {
        let mut catalog = CategorizedCatalog::new();
        catalog.insert(
            "Cold Calling".to_string(),
            vec![ScenarioRecord {
                id: "cold-1".to_string(),
                title: "First Time Contact".to_string(),
                description: "Practice initial contact.".to_string(),
                category: "Cold Calling".to_string(),
            }],
        );

        let response = CatalogResponse::from(&catalog);
        assert_eq!(response.0.len(), 1);
        assert_eq!(response.0["Cold Calling"][0].id, "cold-1");

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("First Time Contact"));
    }

    #[test]
    fn test_difficulty_dto_mirrors_core_level() {
        let dto = DifficultyDto::from(&DifficultyLevel::beginner());
        assert_eq!(dto.id, "beginner");
        assert_eq!(dto.name, "Beginner");
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Scenario not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Scenario not found"}"#);
    }
}
