use super::entity::LocalExtent;
use bevy::math::Vec3;
use bevy::prelude::Transform;
use rayon::prelude::*;

const CHUNK_POINTS: usize = 16 * 1024;

/// Number of points inside the oriented box `transform · extent`.
///
/// `positions` is packed xyz. Each point is moved into box space with the inverse affine and
/// tested against the extent, faces inclusive.
pub fn count_contained(extent: &LocalExtent, transform: &Transform, positions: &[f32]) -> usize {
    let inverse = transform.compute_affine().inverse();
    let whole = positions.len() / 3 * 3;
    let points: &[[f32; 3]] = bytemuck::cast_slice(&positions[..whole]);

    points
        .par_chunks(CHUNK_POINTS)
        .map(|chunk| {
            chunk
                .iter()
                .filter(|p| extent.contains(inverse.transform_point3(Vec3::from_array(**p))))
                .count()
        })
        .sum()
}
