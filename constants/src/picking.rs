/// Pick ids are packed into 24-bit RGB, so the largest assignable id is 0xFFFFFF.
pub const MAX_PICK_ID: u32 = 0x00FF_FFFF;

/// First id handed out by a fresh pick scene. Zero is the cleared background.
pub const FIRST_PICK_ID: u32 = 1;

/// Sentinel ids used by the hover pick scene that mirrors the active entity.
pub const HOVER_MESH_ID: u32 = 0xFF_0000;
pub const HOVER_OUTLINE_ID: u32 = 0x00_FF00;
pub const HOVER_CORNER_ID: u32 = 0x00_00FF;

/// Screen-space half width of an outline edge in the hover scene (pixels).
pub const HOVER_OUTLINE_WIDTH_PX: f32 = 3.0;

/// Screen-space size of a corner marker in the hover scene (pixels).
pub const HOVER_CORNER_SIZE_PX: f32 = 8.0;

/// Depth bias pulling outlines and corners in front of the solid they sit on.
pub const HOVER_DEPTH_BIAS: f32 = 1e-3;
