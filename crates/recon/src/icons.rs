//! Known icon set.
//!
//! The catalog is the CSV written by the icon download step: a header row
//! `icon,path` followed by one row per icon (file stem, relative path).

use std::collections::BTreeMap;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Deserialize;

use crate::error::ReconError;

/// Minimum skim score for a "did you mean" suggestion.
const SUGGESTION_MIN_SCORE: i64 = 40;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IconCatalog {
    /// No catalog configured: every non-empty icon id is accepted.
    #[default]
    Unrestricted,
    /// icon id -> path (empty when the source had no path column).
    Known(BTreeMap<String, String>),
}

#[derive(Deserialize)]
struct CatalogRow {
    #[serde(alias = "icon_id", alias = "name")]
    icon: String,
    #[serde(default)]
    path: String,
}

impl IconCatalog {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Known(
            ids.into_iter()
                .map(|id| (id.into(), String::new()))
                .collect(),
        )
    }

    /// Parse an `icon,path` CSV. Blank icon names are skipped.
    pub fn from_csv(source_name: &str, csv_data: &str) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let mut icons = BTreeMap::new();
        for (i, row) in reader.deserialize::<CatalogRow>().enumerate() {
            let row = row.map_err(|e| ReconError::Parse {
                source_name: source_name.into(),
                message: format!("row {}: {e}", i + 1),
            })?;
            if row.icon.is_empty() {
                continue;
            }
            icons.insert(row.icon, row.path);
        }
        Ok(Self::Known(icons))
    }

    pub fn contains(&self, icon_id: &str) -> bool {
        match self {
            Self::Unrestricted => !icon_id.is_empty(),
            Self::Known(icons) => icons.contains_key(icon_id),
        }
    }

    pub fn path(&self, icon_id: &str) -> Option<&str> {
        match self {
            Self::Unrestricted => None,
            Self::Known(icons) => icons
                .get(icon_id)
                .map(String::as_str)
                .filter(|p| !p.is_empty()),
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Unrestricted => None,
            Self::Known(icons) => Some(icons.len()),
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Closest known icon id to `icon_id`, if any scores well enough.
    pub fn suggest(&self, icon_id: &str) -> Option<String> {
        let Self::Known(icons) = self else {
            return None;
        };
        if icon_id.is_empty() {
            return None;
        }
        let matcher = SkimMatcherV2::default();
        icons
            .keys()
            .filter_map(|candidate| {
                // Either side may be the abbreviation ("swrd" vs "sword", "swords" vs "sword").
                let forward = matcher.fuzzy_match(candidate, icon_id);
                let backward = matcher.fuzzy_match(icon_id, candidate);
                forward.max(backward).map(|score| (score, candidate))
            })
            .filter(|(score, _)| *score >= SUGGESTION_MIN_SCORE)
            // Highest score wins; on equal scores the alphabetically first id.
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, candidate)| candidate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
icon,path
broadsword,icons/lorc/broadsword.png
battle-axe,icons/lorc/battle-axe.png
round-shield,icons/delapouite/round-shield.png
";

    #[test]
    fn parse_catalog_csv() {
        let catalog = IconCatalog::from_csv("all_icons.csv", CATALOG).unwrap();
        assert_eq!(catalog.len(), Some(3));
        assert!(catalog.contains("broadsword"));
        assert!(!catalog.contains("katana"));
        assert_eq!(catalog.path("battle-axe"), Some("icons/lorc/battle-axe.png"));
    }

    #[test]
    fn catalog_without_path_column() {
        let catalog = IconCatalog::from_csv("icons.csv", "icon\nsword\n\naxe\n").unwrap();
        assert!(catalog.contains("sword"));
        assert!(catalog.contains("axe"));
        assert_eq!(catalog.path("sword"), None);
    }

    #[test]
    fn unrestricted_accepts_any_non_empty_id() {
        let catalog = IconCatalog::default();
        assert_eq!(catalog, IconCatalog::Unrestricted);
        assert!(catalog.contains("anything"));
        assert!(!catalog.contains(""));
        assert_eq!(catalog.suggest("anything"), None);
        assert_eq!(catalog.len(), None);
    }

    #[test]
    fn suggests_close_icon() {
        let catalog = IconCatalog::from_csv("all_icons.csv", CATALOG).unwrap();
        assert_eq!(catalog.suggest("broadswrd").as_deref(), Some("broadsword"));
        assert_eq!(catalog.suggest("battle-axes").as_deref(), Some("battle-axe"));
    }

    #[test]
    fn no_suggestion_for_unrelated_id() {
        let catalog = IconCatalog::from_ids(["sword", "axe"]);
        assert_eq!(catalog.suggest("zzzzqqq"), None);
    }
}
