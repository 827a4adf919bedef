//! Versioned curriculum-equivalent level table.
//!
//! Maps a global stage to a curriculum level label. The mapping is a plain
//! table lookup, so identical band vectors always land on the same level for
//! a given table version.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Band, CurriculumLevel};
use crate::services::table_registry::{TableRegistry, VersionedTable};

const BUILTIN_TABLE: &str = include_str!("../../data/curriculum_v1.yaml");
const FALLBACK_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelEntry {
    pub stage: Band,
    pub label: String,
    /// Description per language code
    #[serde(default)]
    pub descriptions: BTreeMap<String, String>,
}

/// Label and description for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDescription {
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumTable {
    version: u32,
    levels: Vec<LevelEntry>,
}

impl VersionedTable for CurriculumTable {
    const TABLE: &'static str = "curriculum";

    fn version(&self) -> u32 {
        self.version
    }
}

impl CurriculumTable {
    pub fn new(version: u32, levels: Vec<LevelEntry>) -> DomainResult<Self> {
        if levels.len() != Band::COUNT {
            return Err(DomainError::InvalidInput(format!(
                "curriculum table v{version} has {} levels, expected {}",
                levels.len(),
                Band::COUNT
            )));
        }
        for (i, level) in levels.iter().enumerate() {
            if usize::from(level.stage.value()) != i {
                return Err(DomainError::InvalidInput(format!(
                    "curriculum table v{version} lists stage {} at position {i}",
                    level.stage
                )));
            }
        }
        Ok(Self { version, levels })
    }

    pub fn builtin() -> DomainResult<Self> {
        Self::from_yaml(BUILTIN_TABLE)
    }

    pub fn from_yaml(yaml: &str) -> DomainResult<Self> {
        #[derive(Deserialize)]
        struct Raw {
            version: u32,
            levels: Vec<LevelEntry>,
        }
        let raw: Raw = serde_yaml::from_str(yaml)?;
        Self::new(raw.version, raw.levels)
    }

    pub fn levels(&self) -> &[LevelEntry] {
        &self.levels
    }

    fn entry(&self, stage: Band) -> &LevelEntry {
        // new() guarantees one entry per stage, in order
        &self.levels[usize::from(stage.value())]
    }

    pub fn level_for(&self, stage: Band) -> CurriculumLevel {
        CurriculumLevel {
            ordinal: stage.value(),
            label: self.entry(stage).label.clone(),
        }
    }

    /// Description of a stage in the requested language, falling back to
    /// English and then to the bare label.
    pub fn describe(&self, stage: Band, lang: &str) -> LevelDescription {
        let entry = self.entry(stage);
        let description = entry
            .descriptions
            .get(lang)
            .or_else(|| entry.descriptions.get(FALLBACK_LANGUAGE))
            .cloned()
            .unwrap_or_else(|| entry.label.clone());

        LevelDescription {
            label: entry.label.clone(),
            description,
        }
    }
}

pub type CurriculumRegistry = TableRegistry<CurriculumTable>;

#[cfg(test)]
mod tests {
    use super::*;

    fn band(value: u8) -> Band {
        Band::new(value).unwrap()
    }

    #[test]
    fn test_builtin_table_labels() {
        let table = CurriculumTable::builtin().unwrap();
        assert_eq!(table.version(), 1);
        assert_eq!(table.level_for(Band::MIN).label, "Pre-SKLC");
        assert_eq!(table.level_for(band(2)).label, "SKLC Level 2");
        assert_eq!(table.level_for(Band::MAX).ordinal, 5);
    }

    #[test]
    fn test_describe_falls_back_to_english() {
        let table = CurriculumTable::builtin().unwrap();
        let ko = table.describe(band(1), "ko");
        let fr = table.describe(band(1), "fr");
        assert!(ko.description.contains("자기소개"));
        assert!(fr.description.starts_with("Can handle very basic greetings"));
    }

    #[test]
    fn test_rejects_missing_stage() {
        let levels = (0..5)
            .map(|s| LevelEntry {
                stage: band(s),
                label: format!("L{s}"),
                descriptions: BTreeMap::new(),
            })
            .collect();
        assert!(CurriculumTable::new(2, levels).is_err());
    }

    #[test]
    fn test_registry_keeps_old_versions_resolvable() {
        let mut registry = CurriculumRegistry::new(CurriculumTable::builtin().unwrap());
        let mut levels = CurriculumTable::builtin().unwrap().levels().to_vec();
        levels[2].label = "Intermediate".to_string();
        registry.publish(CurriculumTable::new(2, levels).unwrap()).unwrap();

        assert_eq!(registry.active().level_for(band(2)).label, "Intermediate");
        assert_eq!(registry.get(1).unwrap().level_for(band(2)).label, "SKLC Level 2");
    }
}
