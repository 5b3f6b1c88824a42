use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::bar::Bar;

/// Trade direction. All price comparisons in the core go through these
/// helpers so that short handling is the exact mirror of long handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// `base` moved `distance` in the favorable direction.
    pub fn offset(self, base: f64, distance: f64) -> f64 {
        match self {
            Direction::Long => base + distance,
            Direction::Short => base - distance,
        }
    }

    /// Strictly beyond `level` on the favorable side.
    pub fn is_beyond(self, price: f64, level: f64) -> bool {
        match self {
            Direction::Long => price > level,
            Direction::Short => price < level,
        }
    }

    /// At or beyond `level` on the favorable side.
    pub fn reaches(self, price: f64, level: f64) -> bool {
        match self {
            Direction::Long => price >= level,
            Direction::Short => price <= level,
        }
    }

    /// Bar extreme in the favorable direction
    pub fn favorable_extreme(self, bar: &Bar) -> f64 {
        match self {
            Direction::Long => bar.high,
            Direction::Short => bar.low,
        }
    }

    /// Bar extreme in the adverse direction
    pub fn adverse_extreme(self, bar: &Bar) -> f64 {
        match self {
            Direction::Long => bar.low,
            Direction::Short => bar.high,
        }
    }

    /// The more favorable of two prices.
    pub fn better(self, a: f64, b: f64) -> f64 {
        match self {
            Direction::Long => a.max(b),
            Direction::Short => a.min(b),
        }
    }

    /// The less favorable of two prices. For stops this is the wider one.
    pub fn worse(self, a: f64, b: f64) -> f64 {
        match self {
            Direction::Long => a.min(b),
            Direction::Short => a.max(b),
        }
    }

    /// Distance given back from `extreme` to `price`; negative when `price`
    /// is beyond the extreme.
    pub fn giveback(self, extreme: f64, price: f64) -> f64 {
        match self {
            Direction::Long => extreme - price,
            Direction::Short => price - extreme,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_mirrors_long() {
        assert_eq!(Direction::Long.offset(100.0, 5.0), 105.0);
        assert_eq!(Direction::Short.offset(100.0, 5.0), 95.0);
        assert!(Direction::Long.is_beyond(100.01, 100.0));
        assert!(!Direction::Long.is_beyond(100.0, 100.0));
        assert!(Direction::Short.is_beyond(99.99, 100.0));
        assert!(Direction::Short.reaches(100.0, 100.0));
        assert_eq!(Direction::Long.giveback(110.0, 104.0), 6.0);
        assert_eq!(Direction::Short.giveback(90.0, 96.0), 6.0);
    }

    #[test]
    fn better_and_worse() {
        assert_eq!(Direction::Long.better(1.0, 2.0), 2.0);
        assert_eq!(Direction::Short.better(1.0, 2.0), 1.0);
        assert_eq!(Direction::Long.worse(1.0, 2.0), 1.0);
        assert_eq!(Direction::Short.worse(1.0, 2.0), 2.0);
    }
}
