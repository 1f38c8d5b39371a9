use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{ArDancerError, AssetStore, Result};

/// World-space position in metres. `y` points up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn raised(self, dy: f32) -> Self {
        Self {
            y: self.y + dy,
            ..self
        }
    }
}

/// The external 3D runtime as seen by the character.
///
/// Rendering, animation playback and the scene graph live on the other side
/// of this trait.
pub trait SceneBridge: Send {
    /// Removes every child visual of the character and attaches `asset`.
    fn replace_visual(&mut self, asset: &str) -> Result<()>;

    /// Animates a yaw-only rotation of the character.
    fn rotate_to_yaw(&mut self, yaw: f32, duration: Duration) -> Result<()>;

    /// Current yaw of the viewer's camera, if the runtime has a point of view.
    fn viewer_yaw(&self) -> Option<f32>;

    /// World position the physics runtime currently presents for the
    /// character, if it has one.
    fn character_position(&self) -> Option<Vec3>;
}

/// Command issued to the scene, as captured by [`RecordingScene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SceneCommand {
    ReplaceVisual { asset: String },
    RotateToYaw { yaw: f32, duration_ms: u64 },
}

#[derive(Debug, Default)]
struct SceneLog {
    commands: Vec<SceneCommand>,
    active_visual: Option<String>,
    viewer_yaw: Option<f32>,
    character_position: Option<Vec3>,
}

/// Headless [`SceneBridge`] that checks asset names against an
/// [`AssetStore`] and records every command it receives.
#[derive(Debug)]
pub struct RecordingScene {
    store: AssetStore,
    log: Arc<Mutex<SceneLog>>,
}

impl RecordingScene {
    pub fn new(store: AssetStore) -> Self {
        Self {
            store,
            log: Arc::new(Mutex::new(SceneLog::default())),
        }
    }

    /// Handle for observing the scene after it has been moved into a session.
    pub fn probe(&self) -> SceneProbe {
        SceneProbe {
            log: Arc::clone(&self.log),
        }
    }
}

impl SceneBridge for RecordingScene {
    fn replace_visual(&mut self, asset: &str) -> Result<()> {
        let resolved = self.store.require(asset)?;
        let mut log = lock_log(&self.log)?;
        tracing::debug!(asset = %resolved.path, "attaching character visual");
        log.active_visual = Some(resolved.path.clone());
        log.commands.push(SceneCommand::ReplaceVisual {
            asset: resolved.path.clone(),
        });
        Ok(())
    }

    fn rotate_to_yaw(&mut self, yaw: f32, duration: Duration) -> Result<()> {
        let mut log = lock_log(&self.log)?;
        log.commands.push(SceneCommand::RotateToYaw {
            yaw,
            duration_ms: duration.as_millis() as u64,
        });
        Ok(())
    }

    fn viewer_yaw(&self) -> Option<f32> {
        lock_log(&self.log).ok().and_then(|log| log.viewer_yaw)
    }

    fn character_position(&self) -> Option<Vec3> {
        lock_log(&self.log).ok().and_then(|log| log.character_position)
    }
}

/// Shared view over a [`RecordingScene`].
#[derive(Debug, Clone)]
pub struct SceneProbe {
    log: Arc<Mutex<SceneLog>>,
}

impl SceneProbe {
    /// Moves the simulated camera.
    pub fn set_viewer_yaw(&self, yaw: Option<f32>) -> Result<()> {
        lock_log(&self.log)?.viewer_yaw = yaw;
        Ok(())
    }

    /// Moves the simulated character body, e.g. after it fell onto a plane.
    pub fn set_character_position(&self, position: Option<Vec3>) -> Result<()> {
        lock_log(&self.log)?.character_position = position;
        Ok(())
    }

    pub fn commands(&self) -> Result<Vec<SceneCommand>> {
        Ok(lock_log(&self.log)?.commands.clone())
    }

    pub fn active_visual(&self) -> Result<Option<String>> {
        Ok(lock_log(&self.log)?.active_visual.clone())
    }
}

fn lock_log(log: &Mutex<SceneLog>) -> Result<MutexGuard<'_, SceneLog>> {
    log.lock()
        .map_err(|_| ArDancerError::msg("scene log has been poisoned"))
}
