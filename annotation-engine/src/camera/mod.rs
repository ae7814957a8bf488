//! Four synchronized view rigs: a perspective main view and top, front and side orthographic views.

pub mod rig;
pub mod sync;

pub use rig::{BasePlane, InteractionState, Projection, Ray, ViewKind, ViewportRig};
pub use sync::{RenderMode, ViewportSet, snap_size};
