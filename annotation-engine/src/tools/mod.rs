//! Pointer gestures, selection and transform handles layered on the engine.

pub mod draw;
pub mod manipulation;
pub mod selection;

pub use draw::{DrawMode, PointerOutcome};
pub use manipulation::TransformOp;
