//! Core library for the AR Dancer character demo.
//!
//! The AR runtime, the 3D scene and the microphone are external collaborators
//! reached through small traits ([`SceneBridge`], [`HitTester`],
//! [`AudioInput`]). This crate owns the behaviour behind them: plane
//! bookkeeping, tap placement, the character state machine and the loudness
//! monitor that drives it. All mutation is serialised through the
//! [`Session`] event loop.

pub mod analysis;
pub mod assets;
pub mod audio;
pub mod character;
pub mod config;
pub mod error;
pub mod placement;
pub mod plane;
pub mod scene;
pub mod session;
pub mod timeline;

pub use analysis::{compute_rms, LoudnessSample};
pub use assets::{AssetStore, CharacterAsset, CharacterAssets};
#[cfg(feature = "microphone")]
pub use audio::MicrophoneInput;
pub use audio::{
    AudioInput, AudioLevelMonitor, BlockAssembler, BlockCallback, LevelHandle, Segment,
    SignalGenerator, SignalInput, StreamFormat,
};
pub use character::{Character, CharacterState, TickOutcome, Transition, TransitionTrigger};
pub use config::{AppConfig, AssetConfig, AudioConfig, CharacterConfig};
pub use error::{ArDancerError, Result};
pub use placement::{FixedHitTester, HitTestResult, HitTester, Placement, ScreenPoint};
pub use plane::{AnchorId, PlaneCenter, PlaneExtent, PlaneTracker, TrackedPlane};
pub use scene::{RecordingScene, SceneBridge, SceneCommand, SceneProbe, Vec3};
pub use session::{
    channel, CharacterSnapshot, EventReceiver, EventSender, Flow, Session, SessionEvent,
    SessionReport,
};
pub use timeline::Ticker;
