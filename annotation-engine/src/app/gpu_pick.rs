//! GPU id-color picking.
//!
//! Pick primitives are drawn flat-colored with depth testing into a 1x1 `Rgba8Unorm`
//! target. The projection is narrowed to a window over the requested pixel, so that pixel
//! fills the whole target, and the single texel is copied back and decoded into an id.

use crate::camera::rig::ViewportRig;
use crate::engine::entity::LocalExtent;
use crate::picking::rasterizer::{PickRasterizer, PickTarget};
use crate::picking::scene::{PickPrimitive, PickShape, id_to_rgb};
use bevy::color::LinearRgba;
use bevy::log::{error, warn};
use bevy::math::{Mat4, Vec2, Vec3, Vec4};
use bevy::render::render_resource::{
    Buffer, BufferDescriptor, BufferInitDescriptor, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, CompareFunction, DepthStencilState, Extent3d, LoadOp, Maintain,
    MapMode, MultisampleState, Operations, PipelineLayoutDescriptor,
    PrimitiveState, RawFragmentState, RawRenderPipelineDescriptor, RawVertexBufferLayout,
    RawVertexState, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPassDescriptor, RenderPipeline, ShaderModuleDescriptor, ShaderSource, StoreOp,
    TexelCopyBufferInfo, TexelCopyBufferLayout, Texture, TextureDescriptor, TextureDimension,
    TextureFormat, TextureUsages, TextureView, TextureViewDescriptor, VertexAttribute,
    VertexFormat, VertexStepMode,
};
use bevy::render::renderer::{RenderDevice, RenderQueue};
use bytemuck::{Pod, Zeroable};
use constants::picking::{HOVER_CORNER_SIZE_PX, HOVER_DEPTH_BIAS, HOVER_OUTLINE_WIDTH_PX};
use std::borrow::Cow;
use std::sync::mpsc;

const PICK_SHADER: &str = include_str!("pick_id.wgsl");
const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
/// Copies out of a texture need rows padded to this many bytes.
const READBACK_ROW_BYTES: u32 = 256;

/// Quads of the box faces as corner indices, see [`LocalExtent::corners`].
const BOX_FACES: [[usize; 4]; 6] = [
    [0, 2, 6, 4],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 3, 7, 6],
    [0, 1, 3, 2],
    [4, 5, 7, 6],
];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct PickVertex {
    /// Clip space of the pick window.
    pub position: [f32; 4],
    pub color: [f32; 4],
}

/// Flat color of `id` as written by the fragment shader.
fn id_color(id: u32) -> [f32; 4] {
    let [r, g, b] = id_to_rgb(id);
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

/// Maps the clip space of the whole view onto the 1x1 window over `pixel`.
pub(crate) fn pixel_window(rig: &ViewportRig, pixel: Vec2) -> Mat4 {
    let size = rig.pixel_size();
    let center = pixel.floor() + Vec2::splat(0.5);
    let ndc = Vec2::new(2.0 * center.x / size.x - 1.0, 1.0 - 2.0 * center.y / size.y);
    // One pixel spans 2/size in view NDC and 2 in the window.
    Mat4::from_cols(
        Vec4::new(size.x, 0.0, 0.0, 0.0),
        Vec4::new(0.0, size.y, 0.0, 0.0),
        Vec4::Z,
        Vec4::new(-ndc.x * size.x, -ndc.y * size.y, 0.0, 1.0),
    )
}

/// View NDC of `point` pulled `bias` toward the camera, `None` behind it.
fn overlay_point(rig: &ViewportRig, view_projection: &Mat4, point: Vec3, bias: f32) -> Option<Vec3> {
    let clip = *view_projection * (point - rig.forward() * bias).extend(1.0);
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(ndc.with_z(ndc.z.clamp(0.0, 1.0)))
}

/// Screen-space band of `half_width` pixels around the segment `a`-`b`, capped at both ends.
fn edge_quad(ndc_per_px: Vec2, a: Vec3, b: Vec3, half_width: f32) -> [Vec4; 6] {
    let direction = ((b - a).truncate() / ndc_per_px).normalize_or(Vec2::X);
    let along = direction * half_width * ndc_per_px;
    let across = direction.perp() * half_width * ndc_per_px;
    let start = a.truncate() - along;
    let end = b.truncate() + along;
    let v = |p: Vec2, z: f32| Vec4::new(p.x, p.y, z, 1.0);
    let corners = [
        v(start + across, a.z),
        v(start - across, a.z),
        v(end - across, b.z),
        v(end + across, b.z),
    ];
    [corners[0], corners[1], corners[2], corners[0], corners[2], corners[3]]
}

fn square(ndc_per_px: Vec2, center: Vec3, half: f32) -> [Vec4; 6] {
    let d = ndc_per_px * half;
    let v = |x: f32, y: f32| Vec4::new(center.x + x, center.y + y, center.z, 1.0);
    let corners = [v(-d.x, -d.y), v(d.x, -d.y), v(d.x, d.y), v(-d.x, d.y)];
    [corners[0], corners[1], corners[2], corners[0], corners[2], corners[3]]
}

/// Triangles of `primitives` in the clip space of the window over `pixel`.
pub(crate) fn pick_vertices(
    rig: &ViewportRig,
    pixel: Vec2,
    primitives: &[PickPrimitive],
) -> Vec<PickVertex> {
    let view_projection = rig.view_projection();
    let window = pixel_window(rig, pixel);
    let ndc_per_px = 2.0 / rig.pixel_size();
    let mut vertices = Vec::new();

    for primitive in primitives {
        let color = id_color(primitive.id);
        let mut push = |clip: Vec4| {
            vertices.push(PickVertex {
                position: clip.to_array(),
                color,
            })
        };
        let corners = primitive
            .extent
            .corners()
            .map(|c| primitive.world.transform_point3(c));

        match primitive.shape {
            PickShape::Solid => {
                let clip = corners.map(|c| window * view_projection * c.extend(1.0));
                for [a, b, c, d] in BOX_FACES {
                    for i in [a, b, c, a, c, d] {
                        push(clip[i]);
                    }
                }
            }
            PickShape::Outline => {
                let ndc = corners.map(|c| overlay_point(rig, &view_projection, c, HOVER_DEPTH_BIAS));
                for (a, b) in LocalExtent::EDGES {
                    let (Some(pa), Some(pb)) = (ndc[a], ndc[b]) else {
                        continue;
                    };
                    for v in edge_quad(ndc_per_px, pa, pb, HOVER_OUTLINE_WIDTH_PX) {
                        push(window * v);
                    }
                }
            }
            PickShape::Corners => {
                for corner in corners {
                    let Some(p) = overlay_point(rig, &view_projection, corner, 2.0 * HOVER_DEPTH_BIAS)
                    else {
                        continue;
                    };
                    for v in square(ndc_per_px, p, HOVER_CORNER_SIZE_PX * 0.5) {
                        push(window * v);
                    }
                }
            }
        }
    }
    vertices
}

/// Device objects of the pick pass, created once.
struct PickPass {
    device: RenderDevice,
    queue: RenderQueue,
    pipeline: RenderPipeline,
    color: Texture,
    color_view: TextureView,
    depth_view: TextureView,
    readback: Buffer,
}

impl PickPass {
    fn new(device: &RenderDevice, queue: &RenderQueue) -> Self {
        let extent = Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        let target = |label, format, usage| {
            device.create_texture(&TextureDescriptor {
                label: Some(label),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };
        let color = target(
            "pick_color",
            COLOR_FORMAT,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
        );
        let depth = target("pick_depth", DEPTH_FORMAT, TextureUsages::RENDER_ATTACHMENT);
        let color_view = color.create_view(&TextureViewDescriptor::default());
        let depth_view = depth.create_view(&TextureViewDescriptor::default());

        let readback = device.create_buffer(&BufferDescriptor {
            label: Some("pick_readback"),
            size: READBACK_ROW_BYTES as u64,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let shader = device
            .wgpu_device()
            .create_shader_module(ShaderModuleDescriptor {
                label: Some("pick_id_shader"),
                source: ShaderSource::Wgsl(Cow::Borrowed(PICK_SHADER)),
            });
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("pick_id_layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let attributes = [
            VertexAttribute {
                format: VertexFormat::Float32x4,
                offset: 0,
                shader_location: 0,
            },
            VertexAttribute {
                format: VertexFormat::Float32x4,
                offset: 16,
                shader_location: 1,
            },
        ];
        let pipeline = device.create_render_pipeline(&RawRenderPipelineDescriptor {
            label: Some("pick_id_pipeline"),
            layout: Some(&layout),
            vertex: RawVertexState {
                module: &shader,
                entry_point: Some("vertex"),
                compilation_options: Default::default(),
                buffers: &[RawVertexBufferLayout {
                    array_stride: std::mem::size_of::<PickVertex>() as u64,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            primitive: PrimitiveState::default(),
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: MultisampleState::default(),
            fragment: Some(RawFragmentState {
                module: &shader,
                entry_point: Some("fragment"),
                compilation_options: Default::default(),
                targets: &[Some(ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        Self {
            device: device.clone(),
            queue: queue.clone(),
            pipeline,
            color,
            color_view,
            depth_view,
            readback,
        }
    }

    /// Draw `vertices` and block until the texel is back on the CPU.
    fn render(&self, vertices: &[PickVertex]) -> Option<[u8; 4]> {
        let vertex_buffer = (!vertices.is_empty()).then(|| {
            self.device.create_buffer_with_data(&BufferInitDescriptor {
                label: Some("pick_vertices"),
                contents: bytemuck::cast_slice(vertices),
                usage: BufferUsages::VERTEX,
            })
        });

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("pick_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("pick_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(LinearRgba::BLACK.into()),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(buffer) = &vertex_buffer {
                pass.set_pipeline(&self.pipeline);
                pass.set_vertex_buffer(0, *buffer.slice(..));
                pass.draw(0..vertices.len() as u32, 0..1);
            }
        }
        encoder.copy_texture_to_buffer(
            self.color.as_image_copy(),
            TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(READBACK_ROW_BYTES),
                    rows_per_image: Some(1),
                },
            },
            Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit([encoder.finish()]);

        let slice = self.readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(MapMode::Read, move |mapped| {
            let _ = sender.send(mapped);
        });
        let _ = self.device.poll(Maintain::Wait);

        match receiver.recv() {
            Ok(Ok(())) => {
                let pixel = {
                    let bytes = slice.get_mapped_range();
                    [bytes[0], bytes[1], bytes[2], bytes[3]]
                };
                self.readback.unmap();
                Some(pixel)
            }
            Ok(Err(e)) => {
                warn!("Pick readback failed to map: {}", e);
                None
            }
            Err(_) => None,
        }
    }
}

/// [`PickRasterizer`] on the render device. Without one it reports no context.
pub struct GpuPickRasterizer {
    pass: Option<PickPass>,
}

impl GpuPickRasterizer {
    pub fn new(device: Option<&RenderDevice>, queue: Option<&RenderQueue>) -> Self {
        let pass = match (device, queue) {
            (Some(device), Some(queue)) => Some(PickPass::new(device, queue)),
            _ => {
                error!("No render device available for GPU picking");
                None
            }
        };
        Self { pass }
    }
}

impl PickRasterizer for GpuPickRasterizer {
    fn has_context(&self) -> bool {
        self.pass.is_some()
    }

    fn render_pixel(
        &mut self,
        rig: &ViewportRig,
        pixel: Vec2,
        primitives: &[PickPrimitive],
        target: &mut PickTarget,
    ) {
        target.clear();
        let Some(pass) = &self.pass else {
            return;
        };
        let vertices = pick_vertices(rig, pixel, primitives);
        if let Some([r, g, b, _]) = pass.render(&vertices) {
            target.write([r, g, b]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::rig::ViewKind;
    use crate::config::EngineConfig;
    use crate::engine::AnnotationEngine;
    use crate::engine::category::CategoryTable;
    use crate::error::EngineError;
    use crate::picking::scene::HoverPickScene;

    fn top_rig() -> ViewportRig {
        let mut rig = ViewportRig::orthographic(ViewKind::Top, 20.0, 50.0);
        rig.set_size(200, 200);
        rig
    }

    fn solid(id: u32, center: Vec3, size: Vec3) -> PickPrimitive {
        PickPrimitive {
            id,
            shape: PickShape::Solid,
            world: Mat4::from_translation(center),
            extent: LocalExtent::from_dimension(size),
        }
    }

    /// Ids of the triangles covering the window center, nearest first.
    fn covering(vertices: &[PickVertex]) -> Vec<(f32, u32)> {
        let mut hits: Vec<(f32, u32)> = vertices
            .chunks_exact(3)
            .filter_map(|tri| {
                let p: Vec<Vec3> = tri
                    .iter()
                    .map(|v| {
                        let clip = Vec4::from_array(v.position);
                        clip.truncate() / clip.w
                    })
                    .collect();
                let edge = |a: Vec3, b: Vec3| (b.x - a.x) * -a.y - (b.y - a.y) * -a.x;
                let signs = [edge(p[0], p[1]), edge(p[1], p[2]), edge(p[2], p[0])];
                let inside = signs.iter().all(|s| *s >= 0.0) || signs.iter().all(|s| *s <= 0.0);
                let degenerate = signs.iter().all(|s| *s == 0.0);
                (inside && !degenerate).then(|| {
                    let [r, g, b, _] = tri[0].color.map(|c| (c * 255.0).round() as u8);
                    (p[0].z.min(p[1].z).min(p[2].z), crate::picking::scene::rgb_to_id([r, g, b]))
                })
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits
    }

    #[test]
    fn window_centers_the_requested_pixel() {
        let rig = top_rig();
        let pixel = Vec2::new(37.0, 120.0);
        let world = rig.ray_from_pixel(pixel + Vec2::splat(0.5)).at(10.0);
        let window = pixel_window(&rig, pixel) * rig.view_projection();

        let clip = window * world.extend(1.0);
        assert!((clip.truncate().truncate() / clip.w).length() < 1e-3);

        let neighbour = rig.ray_from_pixel(pixel + Vec2::new(1.5, 0.5)).at(10.0);
        let clip = window * neighbour.extend(1.0);
        assert!((clip.x / clip.w - 2.0).abs() < 1e-3);
    }

    #[test]
    fn nearest_solid_covers_its_pixel() {
        let rig = top_rig();
        let primitives = [
            solid(1, Vec3::new(0.0, 0.0, -10.0), Vec3::splat(4.0)),
            solid(2, Vec3::new(0.0, 0.0, -5.0), Vec3::splat(4.0)),
        ];

        let hits = covering(&pick_vertices(&rig, Vec2::new(100.0, 100.0), &primitives));
        assert_eq!(hits.first().map(|h| h.1), Some(2));
        assert!(hits.iter().any(|h| h.1 == 1));
        assert!(covering(&pick_vertices(&rig, Vec2::new(5.0, 5.0), &primitives)).is_empty());
    }

    #[test]
    fn hover_outline_sits_in_front_of_the_mesh() {
        let rig = top_rig();
        let mut hover = HoverPickScene::default();
        hover.mirror(
            Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            LocalExtent::from_dimension(Vec3::new(4.0, 4.0, 2.0)),
        );
        let primitives = hover.primitives();

        let outline: Vec<_> = primitives
            .iter()
            .filter(|p| p.shape == PickShape::Outline)
            .copied()
            .collect();
        assert_eq!(pick_vertices(&rig, Vec2::ZERO, &outline).len(), 12 * 6);

        let hits = covering(&pick_vertices(&rig, Vec2::new(100.0, 80.0), &primitives));
        assert_eq!(
            hits.first().map(|h| h.1),
            Some(constants::picking::HOVER_OUTLINE_ID)
        );
    }

    #[test]
    fn engine_requires_a_render_device() {
        let config = EngineConfig::default();
        let categories = CategoryTable::new(config.categories.clone());
        let rasterizer = GpuPickRasterizer::new(None, None);
        assert!(!rasterizer.has_context());
        assert!(matches!(
            AnnotationEngine::new(config, Box::new(rasterizer), Box::new(categories)),
            Err(EngineError::NoGpuContext)
        ));
    }
}
