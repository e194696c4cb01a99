//! Synchronized data domains and their remote storage shapes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A named category of synchronized data.
///
/// Each domain owns a disjoint local-cache partition and change-log
/// namespace, so separate domains can be synchronized concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// User profile record (one per owner)
    Profile,
    /// Completed workout sessions
    Workout,
    /// Completed/logged meals
    Meal,
    /// Body measurement entries (weight, girth, ...)
    BodyMeasurement,
    /// Per-food nutrition log entries
    NutritionEntry,
}

impl Domain {
    /// All domains, in the order a full sync pass visits them.
    pub const ALL: [Self; 5] = [
        Self::Profile,
        Self::Workout,
        Self::Meal,
        Self::BodyMeasurement,
        Self::NutritionEntry,
    ];

    /// Stable name used in cache keys, change-log keys, and CLI flags.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Workout => "workout",
            Self::Meal => "meal",
            Self::BodyMeasurement => "body_measurement",
            Self::NutritionEntry => "nutrition_entry",
        }
    }

    /// How this domain is stored on the remote side.
    pub const fn backing(self) -> DomainBacking {
        match self {
            Self::Profile => DomainBacking::Table { table: "profiles" },
            Self::Workout => DomainBacking::Table {
                table: "workout_completions",
            },
            Self::Meal => DomainBacking::Table {
                table: "meal_completions",
            },
            Self::BodyMeasurement => DomainBacking::JsonField {
                table: "profiles",
                field: "body_measurements",
            },
            Self::NutritionEntry => DomainBacking::JsonField {
                table: "profiles",
                field: "nutrition_entries",
            },
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" => Ok(Self::Profile),
            "workout" => Ok(Self::Workout),
            "meal" => Ok(Self::Meal),
            "body_measurement" | "body-measurement" => Ok(Self::BodyMeasurement),
            "nutrition_entry" | "nutrition-entry" => Ok(Self::NutritionEntry),
            other => Err(Error::InvalidInput(format!("unknown domain '{other}'"))),
        }
    }
}

/// Remote storage shape for a domain.
///
/// Table-backed domains live in their own remote collection keyed by
/// owner; JSON-field-backed domains are an array embedded inside the
/// owner's single profile row, always fetched and written whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainBacking {
    /// Independent per-item remote collection
    Table {
        /// Remote table name
        table: &'static str,
    },
    /// Array embedded in one owner-scoped remote record
    JsonField {
        /// Remote table holding the owner record
        table: &'static str,
        /// Column containing the JSON array
        field: &'static str,
    },
}

impl DomainBacking {
    /// Remote table this backing reads from.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Table { table } | Self::JsonField { table, .. } => table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_round_trips_through_str() {
        for domain in Domain::ALL {
            let parsed: Domain = domain.as_str().parse().unwrap();
            assert_eq!(parsed, domain);
        }
    }

    #[test]
    fn domain_parse_accepts_dashes() {
        assert_eq!(
            "body-measurement".parse::<Domain>().unwrap(),
            Domain::BodyMeasurement
        );
    }

    #[test]
    fn domain_parse_rejects_unknown() {
        assert!("steps".parse::<Domain>().is_err());
    }

    #[test]
    fn embedded_domains_share_the_profile_table() {
        assert_eq!(Domain::BodyMeasurement.backing().table(), "profiles");
        assert_eq!(Domain::NutritionEntry.backing().table(), "profiles");
        assert!(matches!(
            Domain::Workout.backing(),
            DomainBacking::Table { .. }
        ));
    }
}
