//! Behaviour of the placed character.
//!
//! The character starts out stopped. Its first contact with a plane makes it
//! dance; talking into the microphone stops the dance, and after a few quiet
//! ticks it starts dancing again. While stopped it keeps turning to face the
//! viewer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    placement::Placement,
    scene::{SceneBridge, Vec3},
    CharacterAssets, CharacterConfig, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterState {
    /// Standing still, playing the talking animation.
    Stopped,
    Dancing,
    /// Declared for locomotion; no trigger ever enters it.
    Walking,
}

impl fmt::Display for CharacterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Dancing => write!(f, "dancing"),
            Self::Walking => write!(f, "walking"),
        }
    }
}

/// Event that moved the character between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    /// First contact between the character and a plane.
    FirstContact,
    /// Loudness above the threshold interrupted the dance.
    Voice,
    /// The character stayed stopped for longer than the tick threshold.
    StoppedTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: CharacterState,
    pub to: CharacterState,
    pub trigger: TransitionTrigger,
}

/// What a single tick did to the character.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub transitions: Vec<Transition>,
    /// Yaw the character was turned towards, if it was turned.
    pub reoriented_to: Option<f32>,
}

/// The single placed character and its state machine.
#[derive(Debug, Clone)]
pub struct Character {
    state: CharacterState,
    has_collided: bool,
    stopped_ticks: u32,
    position: Vec3,
    scale: f32,
    assets: CharacterAssets,
    config: CharacterConfig,
}

impl Character {
    /// Creates the character at the placement and attaches the stopped visual.
    ///
    /// Fails when the scene cannot produce that visual.
    pub fn spawn(
        placement: Placement,
        config: &CharacterConfig,
        assets: CharacterAssets,
        scene: &mut dyn SceneBridge,
    ) -> Result<Self> {
        scene.replace_visual(assets.for_state(CharacterState::Stopped))?;
        let position = placement.position;
        tracing::info!(x = position.x, y = position.y, z = position.z, "character placed");

        Ok(Self {
            state: CharacterState::Stopped,
            has_collided: false,
            stopped_ticks: 0,
            position,
            scale: placement.scale,
            assets,
            config: config.clone(),
        })
    }

    pub fn state(&self) -> CharacterState {
        self.state
    }

    pub fn has_collided(&self) -> bool {
        self.has_collided
    }

    pub fn stopped_ticks(&self) -> u32 {
        self.stopped_ticks
    }

    /// Last known world position: the drop point until the character first
    /// stops, then wherever the scene presented it at that moment.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Handles a physics contact. Only the first one has any effect.
    pub fn on_collision(&mut self, scene: &mut dyn SceneBridge) -> Result<Option<Transition>> {
        if self.has_collided {
            return Ok(None);
        }

        let transition = self.enter(CharacterState::Dancing, TransitionTrigger::FirstContact, scene)?;
        self.has_collided = true;
        Ok(transition)
    }

    /// Runs one period of the behaviour loop with the current loudness.
    pub fn tick(&mut self, loudness: f32, scene: &mut dyn SceneBridge) -> Result<TickOutcome> {
        let mut outcome = TickOutcome::default();

        if self.has_collided && loudness > self.config.loudness_threshold {
            outcome.transitions.extend(self.enter(
                CharacterState::Stopped,
                TransitionTrigger::Voice,
                scene,
            )?);
            self.stopped_ticks = 0;
        }

        if self.state == CharacterState::Stopped && self.has_collided {
            self.stopped_ticks = self.stopped_ticks.saturating_add(1);
            if let Some(yaw) = scene.viewer_yaw() {
                scene.rotate_to_yaw(yaw, self.config.turn_duration())?;
                outcome.reoriented_to = Some(yaw);
            }
        }

        if self.stopped_ticks > self.config.stopped_tick_threshold {
            outcome.transitions.extend(self.enter(
                CharacterState::Dancing,
                TransitionTrigger::StoppedTimeout,
                scene,
            )?);
        }

        Ok(outcome)
    }

    fn enter(
        &mut self,
        target: CharacterState,
        trigger: TransitionTrigger,
        scene: &mut dyn SceneBridge,
    ) -> Result<Option<Transition>> {
        if self.state == target {
            return Ok(None);
        }

        scene.replace_visual(self.assets.for_state(target))?;
        if target == CharacterState::Stopped {
            if let Some(position) = scene.character_position() {
                self.position = position;
            }
        }

        let transition = Transition {
            from: self.state,
            to: target,
            trigger,
        };
        self.state = target;
        if target != CharacterState::Stopped {
            self.stopped_ticks = 0;
        }

        tracing::info!(from = %transition.from, to = %transition.to, ?trigger, "character state changed");
        Ok(Some(transition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scene::{RecordingScene, SceneCommand},
        ArDancerError, AssetConfig, AssetStore, CharacterAsset,
    };

    const QUIET: f32 = 0.0;
    const LOUD: f32 = 0.05;

    fn scene() -> RecordingScene {
        RecordingScene::new(AssetStore::from_config(&AssetConfig::default()))
    }

    fn spawn(scene: &mut RecordingScene) -> Character {
        let config = CharacterConfig::default();
        Character::spawn(
            Placement {
                position: Vec3::new(0.0, 0.3, 0.0),
                scale: config.scale,
            },
            &config,
            CharacterAssets::default(),
            scene,
        )
        .unwrap()
    }

    #[test]
    fn spawns_stopped_with_talking_visual() {
        let mut scene = scene();
        let probe = scene.probe();
        let character = spawn(&mut scene);

        assert_eq!(character.state(), CharacterState::Stopped);
        assert!(!character.has_collided());
        assert_eq!(character.stopped_ticks(), 0);
        assert_eq!(character.scale(), 0.0005);
        assert_eq!(
            probe.active_visual().unwrap().as_deref(),
            Some("art.scnassets/Talking.dae")
        );
    }

    #[test]
    fn first_contact_starts_dance_and_latches() {
        let mut scene = scene();
        let mut character = spawn(&mut scene);

        let transition = character.on_collision(&mut scene).unwrap().unwrap();
        assert_eq!(transition.trigger, TransitionTrigger::FirstContact);
        assert_eq!(character.state(), CharacterState::Dancing);
        assert!(character.has_collided());

        assert!(character.on_collision(&mut scene).unwrap().is_none());
        assert!(character.has_collided());
    }

    #[test]
    fn loudness_is_ignored_before_first_contact() {
        let mut scene = scene();
        let probe = scene.probe();
        probe.set_viewer_yaw(Some(0.7)).unwrap();
        let mut character = spawn(&mut scene);

        for _ in 0..10 {
            let outcome = character.tick(1.0, &mut scene).unwrap();
            assert!(outcome.transitions.is_empty());
            assert!(outcome.reoriented_to.is_none());
        }
        assert_eq!(character.state(), CharacterState::Stopped);
        assert_eq!(character.stopped_ticks(), 0);
    }

    #[test]
    fn voice_stops_dance_and_quiet_ticks_resume_it() {
        let mut scene = scene();
        let mut character = spawn(&mut scene);
        character.on_collision(&mut scene).unwrap();

        let outcome = character.tick(LOUD, &mut scene).unwrap();
        assert_eq!(outcome.transitions.len(), 1);
        assert_eq!(outcome.transitions[0].trigger, TransitionTrigger::Voice);
        assert_eq!(character.state(), CharacterState::Stopped);
        assert_eq!(character.stopped_ticks(), 1);

        for expected in 2..=5 {
            character.tick(QUIET, &mut scene).unwrap();
            assert_eq!(character.state(), CharacterState::Stopped);
            assert_eq!(character.stopped_ticks(), expected);
        }

        let outcome = character.tick(QUIET, &mut scene).unwrap();
        assert_eq!(
            outcome.transitions,
            vec![Transition {
                from: CharacterState::Stopped,
                to: CharacterState::Dancing,
                trigger: TransitionTrigger::StoppedTimeout,
            }]
        );
        assert_eq!(character.stopped_ticks(), 0);
    }

    #[test]
    fn stopping_adopts_presented_position() {
        let mut scene = scene();
        let probe = scene.probe();
        let mut character = spawn(&mut scene);
        character.on_collision(&mut scene).unwrap();
        assert_eq!(character.position(), Vec3::new(0.0, 0.3, 0.0));

        let landed = Vec3::new(0.05, 0.0, -0.02);
        probe.set_character_position(Some(landed)).unwrap();
        assert_eq!(character.position(), Vec3::new(0.0, 0.3, 0.0));

        character.tick(LOUD, &mut scene).unwrap();
        assert_eq!(character.position(), landed);

        probe.set_character_position(None).unwrap();
        for _ in 0..6 {
            character.tick(QUIET, &mut scene).unwrap();
        }
        character.tick(LOUD, &mut scene).unwrap();
        assert_eq!(character.state(), CharacterState::Stopped);
        assert_eq!(character.position(), landed);
    }

    #[test]
    fn loudness_at_threshold_does_not_stop_dance() {
        let mut scene = scene();
        let mut character = spawn(&mut scene);
        character.on_collision(&mut scene).unwrap();

        character.tick(0.01, &mut scene).unwrap();
        assert_eq!(character.state(), CharacterState::Dancing);
        assert_eq!(character.stopped_ticks(), 0);
    }

    #[test]
    fn continued_talking_keeps_character_stopped() {
        let mut scene = scene();
        let mut character = spawn(&mut scene);
        character.on_collision(&mut scene).unwrap();

        for _ in 0..20 {
            character.tick(LOUD, &mut scene).unwrap();
            assert_eq!(character.state(), CharacterState::Stopped);
            assert_eq!(character.stopped_ticks(), 1);
        }
    }

    #[test]
    fn stopped_ticks_reset_whenever_state_leaves_stopped() {
        let mut scene = scene();
        let mut character = spawn(&mut scene);
        character.on_collision(&mut scene).unwrap();

        let pattern = [LOUD, QUIET, QUIET, LOUD, QUIET, QUIET, QUIET, QUIET, QUIET, QUIET, QUIET];
        for loudness in pattern.iter().cycle().take(200) {
            let before = character.state();
            character.tick(*loudness, &mut scene).unwrap();
            if character.state() != CharacterState::Stopped {
                assert_eq!(character.stopped_ticks(), 0, "left {before} with a count");
            }
            assert!(character.stopped_ticks() <= 6);
        }
    }

    #[test]
    fn faces_viewer_while_stopped() {
        let mut scene = scene();
        let probe = scene.probe();
        let mut character = spawn(&mut scene);
        character.on_collision(&mut scene).unwrap();

        let outcome = character.tick(LOUD, &mut scene).unwrap();
        assert!(outcome.reoriented_to.is_none());

        probe.set_viewer_yaw(Some(1.5)).unwrap();
        let outcome = character.tick(QUIET, &mut scene).unwrap();
        assert_eq!(outcome.reoriented_to, Some(1.5));
        assert_eq!(
            probe.commands().unwrap().last(),
            Some(&SceneCommand::RotateToYaw {
                yaw: 1.5,
                duration_ms: 1000
            })
        );
    }

    #[test]
    fn missing_visual_fails_state_entry() {
        let mut store = AssetStore::new();
        store.register(CharacterAsset::new("art.scnassets/Talking.dae"));
        let mut scene = RecordingScene::new(store);
        let mut character = spawn(&mut scene);

        let err = character.on_collision(&mut scene).unwrap_err();
        assert!(matches!(err, ArDancerError::MissingAsset(_)));
        assert_eq!(character.state(), CharacterState::Stopped);
    }

    #[test]
    fn repeated_entry_does_not_reload_visual() {
        let mut scene = scene();
        let probe = scene.probe();
        let mut character = spawn(&mut scene);
        character.on_collision(&mut scene).unwrap();
        character.tick(LOUD, &mut scene).unwrap();
        character.tick(LOUD, &mut scene).unwrap();

        let replacements = probe
            .commands()
            .unwrap()
            .into_iter()
            .filter(|command| matches!(command, SceneCommand::ReplaceVisual { .. }))
            .count();
        assert_eq!(replacements, 3);
    }
}
