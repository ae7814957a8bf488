//! Interactive 3D bounding-box annotation over LiDAR frames.
//!
//! The [`AnnotationEngine`] owns the box entities, the id-color pick scenes and four
//! synchronized view rigs. Frames arrive through an [`asset_cache::CacheStore`]; switching
//! frames swaps the displayed cloud and diffs the frame's boxes against the entities.
//!
//! The engine has no window of its own. [`app`] drives it from bevy and [`rpc`] exposes it
//! to a host process as JSON-RPC over stdin/stdout.
//!
//! ```rust,ignore
//! let mut engine = AnnotationEngine::with_defaults(EngineConfig::default())?;
//! engine.add_entity(BoxSpec::new("car-1", Vec3::new(4.0, 2.0, 0.8), Vec3::new(2.0, 4.0, 1.6)))?;
//! engine.resize(ViewKind::Main, 800, 600);
//! let hit = engine.pick(ViewKind::Main, Vec2::new(400.0, 300.0));
//! ```

pub mod app;
pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod picking;
pub mod rpc;
pub mod tools;

pub use camera::{RenderMode, ViewKind};
pub use config::EngineConfig;
pub use engine::AnnotationEngine;
pub use engine::diff::{DiffSummary, FrameBox};
pub use engine::entity::{BoxEntity, BoxSpec};
pub use engine::events::EngineEvent;
pub use engine::frame::{FrameData, FrameDataProvider, FrameList, FrameLoader};
pub use error::{EngineError, Result};
pub use tools::{DrawMode, PointerOutcome, TransformOp};
