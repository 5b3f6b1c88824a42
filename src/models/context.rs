use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::direction::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Momentum {
    Strong,
    /// Still positive but softening
    Moderate,
    Broken,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Up,
    Range,
    Down,
    #[default]
    Unknown,
}

impl Regime {
    pub fn is_favorable(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Regime::Up, Direction::Long) | (Regime::Down, Direction::Short)
        )
    }

    /// Ranging or trending against the position.
    pub fn is_hostile(self, direction: Direction) -> bool {
        match self {
            Regime::Range => true,
            Regime::Up => direction == Direction::Short,
            Regime::Down => direction == Direction::Long,
            Regime::Unknown => false,
        }
    }
}

/// Swing-structure judgment. Named for long positions; for shorts the
/// provider reports the mirrored reading (lower highs as `HigherLows`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Structure {
    HigherLows,
    LowerLow,
    #[default]
    Unknown,
}

/// Read-only market classification for one closed bar.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct MarketContext {
    #[serde(default)]
    pub momentum: Momentum,
    #[serde(default)]
    pub regime: Regime,
    #[serde(default)]
    pub structure: Structure,
    /// Most recent protective swing price (last swing low for longs)
    #[serde(default)]
    pub swing_reference: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regime_relative_to_direction() {
        assert!(Regime::Up.is_favorable(Direction::Long));
        assert!(Regime::Down.is_favorable(Direction::Short));
        assert!(Regime::Range.is_hostile(Direction::Long));
        assert!(Regime::Down.is_hostile(Direction::Long));
        assert!(!Regime::Unknown.is_hostile(Direction::Short));
        assert!(!Regime::Unknown.is_favorable(Direction::Short));
    }

    #[test]
    fn context_defaults_to_unknown() {
        let ctx: MarketContext = serde_json::from_str("{}").unwrap();
        assert_eq!(ctx.momentum, Momentum::Unknown);
        assert_eq!(ctx.structure, Structure::Unknown);
        assert!(ctx.swing_reference.is_none());

        let ctx: MarketContext =
            serde_json::from_str(r#"{"momentum":"STRONG","regime":"UP"}"#).unwrap();
        assert_eq!(ctx.momentum, Momentum::Strong);
        assert_eq!(ctx.regime, Regime::Up);
    }
}
