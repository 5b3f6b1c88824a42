use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::direction::Direction;

/// Structural reversal signal supplied by the pattern detector.
///
/// For a long setup the swings are the two troughs of a double bottom and the
/// neckline is the resistance high between them. A short setup mirrors this
/// with two peaks and a support neckline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct Pattern {
    pub direction: Direction,
    pub first_swing: f64,
    pub second_swing: f64,
    pub neckline: f64,
    pub is_valid: bool,
    /// Detector quality score
    #[validate(range(min = 0.0, max = 10.0))]
    pub quality: f64,
}

impl Pattern {
    /// The swing extreme farther from the neckline, used as the stop anchor.
    pub fn protective_swing(&self) -> f64 {
        self.direction.worse(self.first_swing, self.second_swing)
    }
}
