use serde::{Deserialize, Serialize};

use crate::{scene::Vec3, CharacterConfig};

/// Tap location in view coordinates (points).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Intersection of a tap ray with a detected plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitTestResult {
    /// Translation part of the world transform at the hit.
    pub translation: Vec3,
    pub distance: f32,
}

/// The AR runtime's hit test against existing planes, restricted to each
/// plane's detected extent.
pub trait HitTester: Send {
    /// Results ordered nearest first.
    fn hit_test(&self, point: ScreenPoint) -> Vec<HitTestResult>;
}

/// Where and how large the character is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Vec3,
    pub scale: f32,
}

impl Placement {
    /// Chooses the spawn point for a tap, or `None` when the tap missed every
    /// plane. The character is dropped from slightly above the surface.
    pub fn from_hits(hits: &[HitTestResult], config: &CharacterConfig) -> Option<Self> {
        hits.first().map(|hit| Self {
            position: hit.translation.raised(config.spawn_height_offset),
            scale: config.scale,
        })
    }
}

/// [`HitTester`] that reports the same hit for every tap, or none at all.
#[derive(Debug, Clone, Default)]
pub struct FixedHitTester {
    hit: Option<HitTestResult>,
}

impl FixedHitTester {
    pub fn hitting(translation: Vec3) -> Self {
        Self {
            hit: Some(HitTestResult {
                translation,
                distance: 0.0,
            }),
        }
    }

    pub fn missing() -> Self {
        Self { hit: None }
    }
}

impl HitTester for FixedHitTester {
    fn hit_test(&self, _point: ScreenPoint) -> Vec<HitTestResult> {
        self.hit.into_iter().collect()
    }
}
