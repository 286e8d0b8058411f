//! Parking lot layout: zones, spaces and occupancy statistics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fee::Money;

/// A named area of the lot that groups spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Short code used as the prefix of space ids (e.g. `A`).
    pub code: String,
    /// Display name (e.g. `Zone A`).
    pub name: String,
    /// Hourly rate for this zone, overriding the configured default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<Money>,
}

impl Zone {
    /// Create a zone with the conventional `Zone {code}` name.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            name: format!("Zone {code}"),
            code,
            hourly_rate: None,
        }
    }

    /// Set the hourly rate override.
    #[must_use]
    pub fn with_hourly_rate(mut self, rate: Money) -> Self {
        self.hourly_rate = Some(rate);
        self
    }
}

/// Whether a space is under a roof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    /// Covered space.
    Covered,
    /// Open-air space.
    Uncovered,
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Covered => write!(f, "covered"),
            Self::Uncovered => write!(f, "uncovered"),
        }
    }
}

impl FromStr for SpaceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "covered" => Ok(Self::Covered),
            "uncovered" => Ok(Self::Uncovered),
            other => Err(Error::invalid_input(format!("unknown space kind: {other}"))),
        }
    }
}

/// Current state of a space.
///
/// `Occupied` is derived from an open ticket on the space; the other three are
/// set administratively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceStatus {
    /// Free for check-in.
    Available,
    /// A vehicle is parked here.
    Occupied,
    /// Held for someone; no walk-in check-in.
    Reserved,
    /// Out of service.
    Maintenance,
}

impl SpaceStatus {
    /// Whether this status may be set by an administrator.
    #[must_use]
    pub fn is_administrative(self) -> bool {
        !matches!(self, Self::Occupied)
    }
}

impl fmt::Display for SpaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Occupied => write!(f, "occupied"),
            Self::Reserved => write!(f, "reserved"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

impl FromStr for SpaceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "occupied" => Ok(Self::Occupied),
            "reserved" => Ok(Self::Reserved),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(Error::invalid_input(format!("unknown space status: {other}"))),
        }
    }
}

/// A single parking slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Unique identifier (e.g. `A1`).
    pub id: String,
    /// Code of the zone this space belongs to.
    pub zone: String,
    /// Covered or uncovered.
    pub kind: SpaceKind,
    /// Current status.
    pub status: SpaceStatus,
    /// Free-form note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Space {
    /// Create an available space.
    #[must_use]
    pub fn new(id: impl Into<String>, zone: impl Into<String>, kind: SpaceKind) -> Self {
        Self {
            id: id.into(),
            zone: zone.into(),
            kind,
            status: SpaceStatus::Available,
            description: None,
        }
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: SpaceStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether a vehicle can be checked into this space.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == SpaceStatus::Available
    }
}

/// Ids for `count` new spaces in `zone`, continuing after the highest
/// numbered id already present (`A3` -> `A4`, `A5`, ...).
#[must_use]
pub fn next_space_ids<'a>(
    zone: &str,
    existing: impl IntoIterator<Item = &'a str>,
    count: usize,
) -> Vec<String> {
    let highest = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(zone))
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    (1..=count)
        .map(|offset| {
            let n = u64::from(highest).saturating_add(u64::try_from(offset).unwrap_or(u64::MAX));
            format!("{zone}{n}")
        })
        .collect()
}

/// The zones and spaces shipped as demo data: three zones with their own
/// rates and nine spaces in a mix of states.
#[must_use]
pub fn demo_lot() -> (Vec<Zone>, Vec<Space>) {
    let zones = vec![
        Zone::new("A").with_hourly_rate(Money::from_cents(500)),
        Zone::new("B").with_hourly_rate(Money::from_cents(400)),
        Zone::new("C").with_hourly_rate(Money::from_cents(300)),
    ];

    let spaces = vec![
        Space::new("A1", "A", SpaceKind::Covered),
        Space::new("A2", "A", SpaceKind::Covered),
        Space::new("A3", "A", SpaceKind::Covered).with_status(SpaceStatus::Reserved),
        Space::new("B1", "B", SpaceKind::Uncovered),
        Space::new("B2", "B", SpaceKind::Uncovered),
        Space::new("B3", "B", SpaceKind::Uncovered).with_status(SpaceStatus::Maintenance),
        Space::new("C1", "C", SpaceKind::Covered),
        Space::new("C2", "C", SpaceKind::Covered),
        Space::new("C3", "C", SpaceKind::Covered),
    ];

    (zones, spaces)
}

/// Counts of spaces by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyStats {
    /// All spaces counted.
    pub total: usize,
    /// Spaces free for check-in.
    pub available: usize,
    /// Spaces with a parked vehicle.
    pub occupied: usize,
    /// Reserved spaces.
    pub reserved: usize,
    /// Spaces out of service.
    pub maintenance: usize,
}

impl OccupancyStats {
    /// Tally the given spaces.
    #[must_use]
    pub fn from_spaces<'a>(spaces: impl IntoIterator<Item = &'a Space>) -> Self {
        spaces
            .into_iter()
            .fold(Self::default(), |mut stats, space| {
                stats.total += 1;
                match space.status {
                    SpaceStatus::Available => stats.available += 1,
                    SpaceStatus::Occupied => stats.occupied += 1,
                    SpaceStatus::Reserved => stats.reserved += 1,
                    SpaceStatus::Maintenance => stats.maintenance += 1,
                }
                stats
            })
    }

    /// Occupied share of all spaces, in percent. Zero for an empty lot.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn occupancy_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.occupied as f64 / self.total as f64 * 100.0
        }
    }

    /// Occupancy rounded to a whole percent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn occupancy_rate(&self) -> u32 {
        self.occupancy_percent().round() as u32
    }
}
