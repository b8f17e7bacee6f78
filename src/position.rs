//! # Body Position Module
//!
//! Per-sample body position and orientation angles from gravity-normalized
//! acceleration. Each sample is classified on its own, with no smoothing
//! across time.
//!
//! ## Axes
//! With the recorder worn on the chest: x points to the head, y to the
//! subject's left/right and z out of the chest. Lying on the back puts
//! gravity on -z, standing puts it on +x.
//!
//! ## Decision Order
//! 1. `|y| > 0.5` (more than ~30° of roll): LEFT_SIDE or RIGHT_SIDE, no tilt
//! 2. otherwise, first match of: PRONE (`z` is the largest axis),
//!    SUPINE (`z < -0.966`, within ~15° of flat), UPRIGHT (`x > 0.966`,
//!    beyond ~75° of pitch), else TILT
//! 3. rotation is defined unless `x > 0.71` (~45° of pitch)
//!
//! The thresholds are exact; comparisons are strict.

use crate::recording::AccelSample;
use std::f64::consts::PI;

const SIDE_THRESHOLD: f64 = 0.5;
const FLAT_THRESHOLD: f64 = 0.966;
const ROTATION_LIMIT: f64 = 0.71;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyPosition {
    Supine,
    Prone,
    Tilt,
    Upright,
    LeftSide,
    RightSide,
}

/// Output code and label for each position, independent of declaration order
const POSITION_CODES: [(BodyPosition, u8, &str); 6] = [
    (BodyPosition::Supine, 0, "SUPINE"),
    (BodyPosition::Prone, 1, "PRONE"),
    (BodyPosition::Tilt, 2, "TILT"),
    (BodyPosition::Upright, 3, "UPRIGHT"),
    (BodyPosition::LeftSide, 4, "LEFT_SIDE"),
    (BodyPosition::RightSide, 5, "RIGHT_SIDE"),
];

impl BodyPosition {
    fn entry(&self) -> (BodyPosition, u8, &'static str) {
        POSITION_CODES
            .iter()
            .copied()
            .find(|(position, _, _)| position == self)
            .unwrap_or((*self, u8::MAX, "UNKNOWN"))
    }

    /// Numeric code written to the `Pos_Index` column
    pub fn index(&self) -> u8 {
        self.entry().1
    }

    /// Label written to the `Position` column
    pub fn label(&self) -> &'static str {
        self.entry().2
    }
}

/// Classification of one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub position: BodyPosition,
    /// Pitch in degrees; `None` when lying on a side
    pub tilt: Option<f64>,
    /// Roll in degrees; `None` when pitched beyond ~45°
    pub rotation: Option<f64>,
}

/// Sign that is zero at zero
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Classify one normalized sample; axes are clipped to [-1, 1] first
pub fn classify(sample: AccelSample) -> Orientation {
    let AccelSample { x, y, z } = sample.clipped();

    let (position, tilt) = if y.abs() > SIDE_THRESHOLD {
        let side = if y < 0.0 {
            BodyPosition::LeftSide
        } else {
            BodyPosition::RightSide
        };
        (side, None)
    } else {
        let position = if z > x && z > y {
            BodyPosition::Prone
        } else if z < -FLAT_THRESHOLD {
            BodyPosition::Supine
        } else if x > FLAT_THRESHOLD {
            BodyPosition::Upright
        } else {
            BodyPosition::Tilt
        };
        (position, Some(x.asin() * 180.0 / PI))
    };

    let rotation = if x > ROTATION_LIMIT {
        None
    } else {
        Some(sign((-y).asin()) * (-z).acos() * 180.0 / PI)
    };

    Orientation {
        position,
        tilt,
        rotation,
    }
}
