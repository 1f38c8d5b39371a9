//! Single-consumer event loop.
//!
//! Plane callbacks, contact callbacks, taps and ticks may be produced on any
//! thread. They are funnelled through one queue and applied by [`Session`],
//! which is the only owner of the [`PlaneTracker`] and the [`Character`].

use std::{fmt, sync::mpsc};

use serde::{Deserialize, Serialize};

use crate::{
    character::{Character, CharacterState, Transition},
    placement::{HitTester, Placement, ScreenPoint},
    plane::{AnchorId, PlaneCenter, PlaneExtent, PlaneTracker, TrackedPlane},
    scene::{SceneBridge, Vec3},
    ArDancerError, CharacterAssets, CharacterConfig, LevelHandle, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PlaneDetected {
        anchor: AnchorId,
        extent: PlaneExtent,
        center: PlaneCenter,
    },
    PlaneUpdated {
        anchor: AnchorId,
        extent: PlaneExtent,
        center: PlaneCenter,
    },
    Tap(ScreenPoint),
    /// First contact reported by the physics runtime.
    Contact,
    Tick,
    Shutdown,
}

/// Whether the loop should keep draining after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Producer side of the session queue. Cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<SessionEvent>,
}

impl EventSender {
    pub fn send(&self, event: SessionEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| ArDancerError::QueueClosed)
    }

    pub fn plane_detected(
        &self,
        anchor: impl Into<AnchorId>,
        extent: PlaneExtent,
        center: PlaneCenter,
    ) -> Result<()> {
        self.send(SessionEvent::PlaneDetected {
            anchor: anchor.into(),
            extent,
            center,
        })
    }

    pub fn plane_updated(
        &self,
        anchor: impl Into<AnchorId>,
        extent: PlaneExtent,
        center: PlaneCenter,
    ) -> Result<()> {
        self.send(SessionEvent::PlaneUpdated {
            anchor: anchor.into(),
            extent,
            center,
        })
    }

    pub fn tap(&self, point: ScreenPoint) -> Result<()> {
        self.send(SessionEvent::Tap(point))
    }

    pub fn contact(&self) -> Result<()> {
        self.send(SessionEvent::Contact)
    }

    pub fn tick(&self) -> Result<()> {
        self.send(SessionEvent::Tick)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionEvent::Shutdown)
    }
}

/// Consumer side of the session queue.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<SessionEvent>,
}

impl IntoIterator for EventReceiver {
    type Item = SessionEvent;
    type IntoIter = mpsc::IntoIter<SessionEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}

pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Snapshot of the character for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub state: CharacterState,
    pub has_collided: bool,
    pub stopped_ticks: u32,
    pub position: Vec3,
}

impl From<&Character> for CharacterSnapshot {
    fn from(character: &Character) -> Self {
        Self {
            state: character.state(),
            has_collided: character.has_collided(),
            stopped_ticks: character.stopped_ticks(),
            position: character.position(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub planes: Vec<TrackedPlane>,
    pub character: Option<CharacterSnapshot>,
    pub transitions: Vec<Transition>,
    pub ticks: u64,
}

impl SessionReport {
    /// Renders the report for humans and scripts alike.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ArDancerError::msg(format!("failed to render session report: {err}")))
    }
}

/// Owns all mutable demo state and applies events one at a time.
pub struct Session {
    config: CharacterConfig,
    assets: CharacterAssets,
    planes: PlaneTracker,
    character: Option<Character>,
    scene: Box<dyn SceneBridge>,
    hit_tester: Box<dyn HitTester>,
    level: LevelHandle,
    transitions: Vec<Transition>,
    ticks: u64,
}

impl Session {
    pub fn new(
        config: &CharacterConfig,
        assets: CharacterAssets,
        scene: Box<dyn SceneBridge>,
        hit_tester: Box<dyn HitTester>,
        level: LevelHandle,
    ) -> Self {
        Self {
            config: config.clone(),
            assets,
            planes: PlaneTracker::new(),
            character: None,
            scene,
            hit_tester,
            level,
            transitions: Vec::new(),
            ticks: 0,
        }
    }

    pub fn planes(&self) -> &PlaneTracker {
        &self.planes
    }

    pub fn character(&self) -> Option<&Character> {
        self.character.as_ref()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Applies a single event. Errors are fatal for the session.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Flow> {
        match event {
            SessionEvent::PlaneDetected {
                anchor,
                extent,
                center,
            } => {
                self.planes.on_plane_detected(anchor, extent, center);
            }
            SessionEvent::PlaneUpdated {
                anchor,
                extent,
                center,
            } => self.planes.on_plane_updated(&anchor, extent, center),
            SessionEvent::Tap(point) => self.place(point)?,
            SessionEvent::Contact => self.contact()?,
            SessionEvent::Tick => self.tick()?,
            SessionEvent::Shutdown => return Ok(Flow::Stop),
        }
        Ok(Flow::Continue)
    }

    /// Drains the queue until a shutdown event arrives or every sender is
    /// gone.
    pub fn run(mut self, events: EventReceiver) -> Result<SessionReport> {
        tracing::info!("session started");
        for event in events {
            match self.handle(event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(err) => {
                    tracing::error!(%err, "session aborted");
                    return Err(err);
                }
            }
        }
        tracing::info!(ticks = self.ticks, "session finished");
        Ok(self.report())
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            planes: self.planes.planes().to_vec(),
            character: self.character.as_ref().map(CharacterSnapshot::from),
            transitions: self.transitions.clone(),
            ticks: self.ticks,
        }
    }

    fn place(&mut self, point: ScreenPoint) -> Result<()> {
        if self.character.is_some() {
            tracing::debug!("character already placed, tap ignored");
            return Ok(());
        }

        let hits = self.hit_tester.hit_test(point);
        let Some(placement) = Placement::from_hits(&hits, &self.config) else {
            tracing::debug!(x = point.x, y = point.y, "tap missed every plane");
            return Ok(());
        };

        let character = Character::spawn(
            placement,
            &self.config,
            self.assets.clone(),
            self.scene.as_mut(),
        )?;
        self.character = Some(character);
        Ok(())
    }

    fn contact(&mut self) -> Result<()> {
        let Some(character) = self.character.as_mut() else {
            tracing::debug!("contact before placement ignored");
            return Ok(());
        };

        if let Some(transition) = character.on_collision(self.scene.as_mut())? {
            self.transitions.push(transition);
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        self.ticks += 1;
        let Some(character) = self.character.as_mut() else {
            return Ok(());
        };

        let level = self.level.level();
        tracing::debug!(level, state = %character.state(), "tick");
        let outcome = character.tick(level, self.scene.as_mut())?;
        self.transitions.extend(outcome.transitions);
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("planes", &self.planes.len())
            .field("character", &self.character)
            .field("transitions", &self.transitions.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{
        character::TransitionTrigger,
        placement::FixedHitTester,
        scene::{RecordingScene, SceneProbe},
        AssetConfig, AssetStore, CharacterAsset,
    };

    struct Harness {
        session: Session,
        level: LevelHandle,
        probe: SceneProbe,
    }

    fn harness_with(store: AssetStore, hit_tester: FixedHitTester) -> Harness {
        let scene = RecordingScene::new(store);
        let probe = scene.probe();
        let level = LevelHandle::default();
        let session = Session::new(
            &CharacterConfig::default(),
            CharacterAssets::default(),
            Box::new(scene),
            Box::new(hit_tester),
            level.clone(),
        );
        Harness {
            session,
            level,
            probe,
        }
    }

    fn harness() -> Harness {
        harness_with(
            AssetStore::from_config(&AssetConfig::default()),
            FixedHitTester::hitting(Vec3::new(0.0, -1.0, -1.0)),
        )
    }

    fn detect(session: &mut Session, id: &str, extent: PlaneExtent, center: PlaneCenter) {
        session
            .handle(SessionEvent::PlaneDetected {
                anchor: id.into(),
                extent,
                center,
            })
            .unwrap();
    }

    #[test]
    fn plane_update_is_reflected_in_tracker() {
        let mut h = harness();
        detect(&mut h.session, "P1", PlaneExtent::new(1.0, 1.0), PlaneCenter::new(0.0, 0.0));
        h.session
            .handle(SessionEvent::PlaneUpdated {
                anchor: "P1".into(),
                extent: PlaneExtent::new(2.0, 1.5),
                center: PlaneCenter::new(0.1, 0.2),
            })
            .unwrap();

        let plane = h.session.planes().get(&"P1".into()).unwrap();
        assert_eq!(plane.extent, PlaneExtent::new(2.0, 1.5));
        assert_eq!(plane.center, PlaneCenter::new(0.1, 0.2));
    }

    #[test]
    fn voice_interrupts_dance_until_five_quiet_ticks_pass() {
        let mut h = harness();
        detect(&mut h.session, "P1", PlaneExtent::new(1.0, 1.0), PlaneCenter::default());
        h.session.handle(SessionEvent::Tap(ScreenPoint::new(100.0, 200.0))).unwrap();
        h.session.handle(SessionEvent::Contact).unwrap();

        let character = h.session.character().unwrap();
        assert_eq!(character.state(), CharacterState::Dancing);
        assert!(character.has_collided());

        h.level.set(0.05);
        h.session.handle(SessionEvent::Tick).unwrap();
        assert_eq!(h.session.character().unwrap().state(), CharacterState::Stopped);

        h.level.set(0.0);
        for _ in 0..4 {
            h.session.handle(SessionEvent::Tick).unwrap();
            assert_eq!(h.session.character().unwrap().state(), CharacterState::Stopped);
        }
        h.session.handle(SessionEvent::Tick).unwrap();
        assert_eq!(h.session.character().unwrap().state(), CharacterState::Dancing);

        h.probe
            .set_character_position(Some(Vec3::new(0.0, -1.0, -1.0)))
            .unwrap();
        h.session.handle(SessionEvent::Tick).unwrap();
        h.level.set(0.05);
        h.session.handle(SessionEvent::Tick).unwrap();
        let snapshot = h.session.report().character.unwrap();
        assert_eq!(snapshot.state, CharacterState::Stopped);
        assert_eq!(snapshot.position, Vec3::new(0.0, -1.0, -1.0));

        let triggers: Vec<TransitionTrigger> =
            h.session.transitions().iter().map(|t| t.trigger).collect();
        assert_eq!(
            triggers,
            vec![
                TransitionTrigger::FirstContact,
                TransitionTrigger::Voice,
                TransitionTrigger::StoppedTimeout,
                TransitionTrigger::Voice,
            ]
        );
        assert_eq!(
            h.probe.active_visual().unwrap().as_deref(),
            Some("art.scnassets/Talking.dae")
        );
    }

    #[test]
    fn spawns_above_hit_and_ignores_later_taps() {
        let mut h = harness();
        h.session.handle(SessionEvent::Tap(ScreenPoint::new(1.0, 1.0))).unwrap();
        let first = h.session.character().unwrap().position();
        assert!((first.y - (-0.7)).abs() < 1e-6);

        h.session.handle(SessionEvent::Contact).unwrap();
        h.session.handle(SessionEvent::Tap(ScreenPoint::new(5.0, 5.0))).unwrap();

        let character = h.session.character().unwrap();
        assert_eq!(character.position(), first);
        assert_eq!(character.state(), CharacterState::Dancing);
    }

    #[test]
    fn events_before_placement_are_ignored() {
        let mut h = harness_with(
            AssetStore::from_config(&AssetConfig::default()),
            FixedHitTester::missing(),
        );
        h.level.set(1.0);

        h.session.handle(SessionEvent::Contact).unwrap();
        h.session.handle(SessionEvent::Tick).unwrap();
        h.session.handle(SessionEvent::Tap(ScreenPoint::new(1.0, 1.0))).unwrap();

        assert!(h.session.character().is_none());
        assert!(h.probe.commands().unwrap().is_empty());
        assert_eq!(h.session.report().ticks, 1);
    }

    #[test]
    fn missing_asset_aborts_run() {
        let mut store = AssetStore::new();
        store.register(CharacterAsset::new("art.scnassets/Talking.dae"));
        let h = harness_with(store, FixedHitTester::hitting(Vec3::default()));
        let (tx, rx) = channel();

        tx.tap(ScreenPoint::new(0.0, 0.0)).unwrap();
        tx.contact().unwrap();
        tx.tick().unwrap();

        let err = h.session.run(rx).unwrap_err();
        assert!(matches!(err, ArDancerError::MissingAsset(ref name) if name.contains("Dancing")));
    }

    #[test]
    fn run_serializes_events_from_many_threads() {
        let h = harness();
        let (tx, rx) = channel();

        let producers: Vec<_> = (0..4)
            .map(|i| {
                let tx = tx.clone();
                thread::spawn(move || {
                    let anchor = format!("plane-{i}");
                    tx.plane_detected(anchor.as_str(), PlaneExtent::new(1.0, 1.0), PlaneCenter::default())
                        .unwrap();
                    for step in 1..=10 {
                        let size = 1.0 + step as f32 * 0.1;
                        tx.plane_updated(anchor.as_str(), PlaneExtent::new(size, size), PlaneCenter::default())
                            .unwrap();
                        tx.tick().unwrap();
                    }
                })
            })
            .collect();
        drop(tx);

        let consumer = thread::spawn(move || h.session.run(rx));
        for producer in producers {
            producer.join().unwrap();
        }
        let report = consumer.join().unwrap().unwrap();

        assert_eq!(report.planes.len(), 4);
        for plane in &report.planes {
            assert_eq!(plane.updates, 10);
            assert!((plane.extent.width - 2.0).abs() < 1e-5);
        }
        assert_eq!(report.ticks, 40);
        assert!(report.character.is_none());
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let h = harness();
        let (tx, rx) = channel();
        tx.tick().unwrap();
        tx.shutdown().unwrap();
        tx.tick().unwrap();

        let report = h.session.run(rx).unwrap();
        assert_eq!(report.ticks, 1);
    }

    #[test]
    fn report_renders_as_json() {
        let mut h = harness();
        detect(&mut h.session, "P1", PlaneExtent::new(1.0, 1.0), PlaneCenter::default());
        h.session.handle(SessionEvent::Tap(ScreenPoint::new(1.0, 1.0))).unwrap();
        h.session.handle(SessionEvent::Contact).unwrap();
        h.session.handle(SessionEvent::Tick).unwrap();

        let rendered = h.session.report().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["ticks"], 1);
        assert_eq!(value["character"]["state"], "dancing");
        assert_eq!(value["transitions"][0]["trigger"], "first_contact");
        assert_eq!(value["planes"][0]["anchor"], "P1");
    }

    #[test]
    fn sending_after_consumer_is_gone_reports_closed_queue() {
        let (tx, rx) = channel();
        drop(rx);

        assert!(matches!(tx.tick(), Err(ArDancerError::QueueClosed)));
    }
}
