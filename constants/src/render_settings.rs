/// Perspective main view.
pub const MAIN_FOV_DEGREES: f32 = 15.0;
pub const MAIN_NEAR: f32 = 0.1;
pub const MAIN_FAR: f32 = 2000.0;
pub const MAIN_INITIAL_POSITION: [f32; 3] = [20.0, -60.0, 50.0];
pub const MAIN_MIN_DISTANCE: f32 = 5.0;
pub const MAIN_MAX_DISTANCE: f32 = 1000.0;

/// Orthographic views: visible height in world units at zoom 1.
pub const ORTHO_VIEW_SIZE: f32 = 20.0;

/// Stand-off distance between an orthographic camera and the framed box.
pub const ORTHO_STANDOFF_DISTANCE: f32 = 50.0;
pub const ORTHO_FAR: f32 = 500.0;

/// Default box dimension for click-to-place (x, y, z).
pub const DEFAULT_BOX_DIMENSION: [f32; 3] = [2.0, 4.0, 1.6];

/// Drag-to-size snaps half extents to this grid.
pub const DRAW_GRID_STEP: f32 = 0.25;

/// Minimum half extent along both axes before a dragged box materializes.
pub const DRAW_MIN_HALF_SIZE: f32 = 0.25;

/// Container sizes are snapped to these multiples before reaching the rigs.
pub const RESIZE_WIDTH_STEP: u32 = 4;
pub const RESIZE_HEIGHT_STEP: u32 = 10;

/// Radius of the range ring drawn around the sensor origin.
pub const RANGE_CIRCLE_RADIUS: f32 = 50.0;

/// Dash and gap length of ghosted box outlines.
pub const GHOST_DASH_SIZE: f32 = 0.2;

/// Font size of the entity labels in the main view, in logical pixels.
pub const LABEL_FONT_SIZE: f32 = 12.0;

/// Presentation colors (linear sRGB triplets).
pub const ACTIVE_COLOR: [f32; 3] = [1.0, 1.0, 0.0];
pub const INACTIVE_COLOR: [f32; 3] = [0.0, 1.0, 0.0];
