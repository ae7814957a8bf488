/// World up axis. Point clouds arrive in sensor frame with Z pointing up.
pub const WORLD_UP: [f32; 3] = [0.0, 0.0, 1.0];

/// Default annotation plane: z = 0, expressed as (normal, constant) with `n·p + d = 0`.
pub const DEFAULT_BASE_PLANE_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];
pub const DEFAULT_BASE_PLANE_CONSTANT: f32 = 0.0;
