use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

/// Identifier the AR runtime assigns to a tracked surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(String);

impl AnchorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AnchorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Size of a horizontal plane in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaneExtent {
    pub width: f32,
    pub depth: f32,
}

impl PlaneExtent {
    pub const fn new(width: f32, depth: f32) -> Self {
        Self { width, depth }
    }
}

/// Centre of a plane on the horizontal (x, z) axes; height is always 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaneCenter {
    pub x: f32,
    pub z: f32,
}

impl PlaneCenter {
    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPlane {
    pub anchor: AnchorId,
    pub extent: PlaneExtent,
    pub center: PlaneCenter,
    /// Number of update observations applied since detection.
    pub updates: u32,
}

/// Latest known extent and centre of every detected plane.
#[derive(Debug, Default, Clone)]
pub struct PlaneTracker {
    /// Detection order.
    planes: Vec<TrackedPlane>,
    index: HashMap<AnchorId, usize>,
}

impl PlaneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly detected plane.
    ///
    /// A second detection for an anchor that is already tracked is applied as
    /// an update so each anchor maps to exactly one plane.
    pub fn on_plane_detected(
        &mut self,
        anchor: AnchorId,
        extent: PlaneExtent,
        center: PlaneCenter,
    ) -> &TrackedPlane {
        if let Some(&slot) = self.index.get(&anchor) {
            tracing::warn!(%anchor, "plane detected twice, applying as update");
            let plane = &mut self.planes[slot];
            apply(plane, extent, center);
            return plane;
        }

        tracing::info!(%anchor, width = extent.width, depth = extent.depth, "plane detected");
        let slot = self.planes.len();
        self.index.insert(anchor.clone(), slot);
        self.planes.push(TrackedPlane {
            anchor,
            extent,
            center,
            updates: 0,
        });
        &self.planes[slot]
    }

    /// Overwrites the extent and centre of a tracked plane. Updates for
    /// anchors that were never detected are dropped.
    pub fn on_plane_updated(&mut self, anchor: &AnchorId, extent: PlaneExtent, center: PlaneCenter) {
        match self.index.get(anchor) {
            Some(&slot) => {
                let plane = &mut self.planes[slot];
                apply(plane, extent, center);
                tracing::debug!(%anchor, width = extent.width, depth = extent.depth, "plane updated");
            }
            None => tracing::debug!(%anchor, "update for untracked plane ignored"),
        }
    }

    pub fn get(&self, anchor: &AnchorId) -> Option<&TrackedPlane> {
        self.index.get(anchor).map(|&slot| &self.planes[slot])
    }

    pub fn planes(&self) -> &[TrackedPlane] {
        &self.planes
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}

fn apply(plane: &mut TrackedPlane, extent: PlaneExtent, center: PlaneCenter) {
    plane.extent = extent;
    plane.center = center;
    plane.updates = plane.updates.saturating_add(1);
}
