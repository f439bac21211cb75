//! Domain records
//!
//! Animals are partitioned by their favorite color. Every barn serves exactly
//! one color and holds at most `capacity` animals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Partition key shared by animals and barns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Indigo,
    Violet,
}

impl Color {
    /// Every color, in declaration order
    pub const ALL: [Color; 7] = [
        Color::Red,
        Color::Orange,
        Color::Yellow,
        Color::Green,
        Color::Blue,
        Color::Indigo,
        Color::Violet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Orange => "ORANGE",
            Self::Yellow => "YELLOW",
            Self::Green => "GREEN",
            Self::Blue => "BLUE",
            Self::Indigo => "INDIGO",
            Self::Violet => "VIOLET",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known color
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown color: {0}")]
pub struct ParseColorError(pub String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseColorError(s.to_string()))
    }
}

/// Animal identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimalId(pub Uuid);

impl AnimalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnimalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Barn identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BarnId(pub Uuid);

impl BarnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BarnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BarnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An animal living (or about to live) on the farm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    pub name: String,
    pub favorite_color: Color,
    /// Owning barn. `None` only before first placement.
    pub barn: Option<BarnId>,
}

impl Animal {
    /// Create a new, unplaced animal
    pub fn new(name: impl Into<String>, favorite_color: Color) -> Self {
        Self {
            id: AnimalId::new(),
            name: name.into(),
            favorite_color,
            barn: None,
        }
    }

    /// Place the animal in a barn
    pub fn with_barn(mut self, barn: BarnId) -> Self {
        self.barn = Some(barn);
        self
    }

    pub fn is_placed(&self) -> bool {
        self.barn.is_some()
    }
}

/// A barn serving exactly one color
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barn {
    pub id: BarnId,
    pub name: String,
    pub color: Color,
    pub capacity: u32,
}

impl Barn {
    /// Create a new barn
    pub fn new(name: impl Into<String>, color: Color, capacity: u32) -> Self {
        Self {
            id: BarnId::new(),
            name: name.into(),
            color,
            capacity,
        }
    }
}
