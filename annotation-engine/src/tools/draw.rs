use crate::camera::rig::{InteractionState, ViewKind};
use crate::engine::AnnotationEngine;
use crate::engine::entity::{BoxSpec, LocalExtent};
use crate::engine::events::EngineEvent;
use crate::picking::scene::HoverTarget;
use bevy::log::{info, warn};
use bevy::math::{Quat, Vec2, Vec3};
use constants::render_settings::{DRAW_GRID_STEP, DRAW_MIN_HALF_SIZE};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawMode {
    #[default]
    None,
    /// Press drops a default-sized box, moving turns it, release commits.
    ClickToPlace,
    /// Press anchors the center, dragging sizes the footprint.
    DragToSize,
}

impl DrawMode {
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "click_to_place" => Some(Self::ClickToPlace),
            "drag_to_size" => Some(Self::DragToSize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClickToPlace => "click_to_place",
            Self::DragToSize => "drag_to_size",
        }
    }
}

/// Pointer gesture in progress. At most one at a time across all views.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) enum Gesture {
    #[default]
    Idle,
    Placing {
        view: ViewKind,
        name: String,
        anchor: Vec3,
    },
    Dragging {
        view: ViewKind,
        anchor: Vec3,
        name: Option<String>,
    },
    Selecting {
        view: ViewKind,
    },
}

/// What a pointer event did.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    Ignored,
    Picked(Option<String>),
    Hover(Option<HoverTarget>),
    /// A click-to-place box exists and follows the pointer.
    Placing(String),
    /// Drag-to-size in progress. `None` until the footprint reaches the minimum.
    Sizing(Option<String>),
    Created(String),
}

pub fn snap_to_grid(v: f32) -> f32 {
    (v / DRAW_GRID_STEP).round() * DRAW_GRID_STEP
}

impl AnnotationEngine {
    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    /// Switching modes abandons the current gesture. Anything already created stays.
    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        if self.draw_mode == mode {
            return;
        }
        self.end_gesture();
        self.draw_mode = mode;
        info!("Draw mode set to {}", mode.as_str());
        self.emit(EngineEvent::DrawModeChanged { mode });
    }

    pub fn pointer_down(&mut self, view: ViewKind, pixel: Vec2) -> PointerOutcome {
        if self.gesture != Gesture::Idle {
            return PointerOutcome::Ignored;
        }
        if view == ViewKind::Main && self.draw_mode != DrawMode::None {
            return self.begin_draw(view, pixel);
        }

        self.set_rig_state(view, InteractionState::Selecting);
        self.gesture = Gesture::Selecting { view };
        if view.is_orthographic() {
            PointerOutcome::Hover(self.hover_probe(view, pixel))
        } else {
            PointerOutcome::Picked(self.pick(view, pixel))
        }
    }

    pub fn pointer_move(&mut self, view: ViewKind, pixel: Vec2) -> PointerOutcome {
        match self.gesture.clone() {
            Gesture::Placing { view: v, name, anchor } if v == view => {
                if let Some(ground) = self.ground_point(view, pixel) {
                    self.turn_toward(&name, anchor, ground);
                }
                PointerOutcome::Placing(name)
            }
            Gesture::Dragging { view: v, anchor, name } if v == view => {
                let Some(ground) = self.ground_point(view, pixel) else {
                    return PointerOutcome::Sizing(name);
                };
                let name = self.size_footprint(anchor, ground, name);
                if let Gesture::Dragging { name: slot, .. } = &mut self.gesture {
                    slot.clone_from(&name);
                }
                PointerOutcome::Sizing(name)
            }
            Gesture::Selecting { view: v } if v == view && view.is_orthographic() => {
                PointerOutcome::Hover(self.hover_probe(view, pixel))
            }
            Gesture::Idle if view.is_orthographic() => {
                PointerOutcome::Hover(self.hover_probe(view, pixel))
            }
            _ => PointerOutcome::Ignored,
        }
    }

    pub fn pointer_up(&mut self, view: ViewKind, _pixel: Vec2) -> PointerOutcome {
        let gesture_view = match &self.gesture {
            Gesture::Idle => return PointerOutcome::Ignored,
            Gesture::Placing { view, .. }
            | Gesture::Dragging { view, .. }
            | Gesture::Selecting { view } => *view,
        };
        if gesture_view != view {
            return PointerOutcome::Ignored;
        }

        match self.end_gesture() {
            Gesture::Placing { name, .. } | Gesture::Dragging { name: Some(name), .. } => {
                if let Err(e) = self.select(&name) {
                    warn!("Drawn box '{}' could not be selected: {}", name, e);
                }
                info!("Created '{}'", name);
                PointerOutcome::Created(name)
            }
            _ => PointerOutcome::Ignored,
        }
    }

    fn begin_draw(&mut self, view: ViewKind, pixel: Vec2) -> PointerOutcome {
        let Some(ground) = self.ground_point(view, pixel) else {
            return PointerOutcome::Ignored;
        };
        match self.draw_mode {
            DrawMode::ClickToPlace => {
                let dimension = Vec3::from_array(self.config.default_dimension);
                let center = ground + self.config.base_plane.normal() * dimension.z * 0.5;
                let name = self.next_drawn_name();
                let spec = BoxSpec::new(name.clone(), center, dimension)
                    .with_category(self.config.default_category.clone());
                if let Err(e) = self.add_entity(spec) {
                    warn!("Could not place a box: {}", e);
                    return PointerOutcome::Ignored;
                }
                self.set_rig_state(view, InteractionState::DrawPick);
                self.gesture = Gesture::Placing {
                    view,
                    name: name.clone(),
                    anchor: center,
                };
                PointerOutcome::Placing(name)
            }
            DrawMode::DragToSize => {
                self.set_rig_state(view, InteractionState::DrawDrag);
                self.gesture = Gesture::Dragging {
                    view,
                    anchor: ground,
                    name: None,
                };
                PointerOutcome::Sizing(None)
            }
            DrawMode::None => PointerOutcome::Ignored,
        }
    }

    /// Heading of a placed box follows the pointer around its center, projected on the plane.
    fn turn_toward(&mut self, name: &str, anchor: Vec3, ground: Vec3) {
        let normal = self.config.base_plane.normal();
        let offset = ground - anchor;
        let along = offset - normal * offset.dot(normal);
        if along.length_squared() < 1e-6 {
            return;
        }
        let heading = along.y.atan2(along.x) - FRAC_PI_2;
        let rotation = Quat::from_axis_angle(normal, heading);
        if let Err(e) = self.update_pose(name, |transform, _| transform.rotation = rotation) {
            warn!("Placing box lost: {}", e);
        }
    }

    /// Half extents along world X and Y snap to the grid. The box appears once both reach
    /// the minimum and is resized in place afterwards.
    fn size_footprint(&mut self, anchor: Vec3, ground: Vec3, name: Option<String>) -> Option<String> {
        let half_x = snap_to_grid((ground.x - anchor.x).abs());
        let half_y = snap_to_grid((ground.y - anchor.y).abs());
        let height = self.config.default_dimension[2];
        let dimension = Vec3::new(half_x * 2.0, half_y * 2.0, height);

        match name {
            Some(name) => {
                let dimension = dimension.max(Vec3::splat(DRAW_MIN_HALF_SIZE * 2.0));
                if let Err(e) = self.update_pose(&name, |_, extent| {
                    *extent = LocalExtent::from_dimension(dimension);
                }) {
                    warn!("Sized box lost: {}", e);
                    return None;
                }
                Some(name)
            }
            None if half_x >= DRAW_MIN_HALF_SIZE && half_y >= DRAW_MIN_HALF_SIZE => {
                let center = anchor + self.config.base_plane.normal() * height * 0.5;
                let name = self.next_drawn_name();
                let spec = BoxSpec::new(name.clone(), center, dimension)
                    .with_category(self.config.default_category.clone());
                match self.add_entity(spec) {
                    Ok(_) => Some(name),
                    Err(e) => {
                        warn!("Could not start a sized box: {}", e);
                        None
                    }
                }
            }
            None => None,
        }
    }

    fn ground_point(&self, view: ViewKind, pixel: Vec2) -> Option<Vec3> {
        let ray = self.viewports.rig(view).ray_from_pixel(pixel);
        self.config.base_plane.intersect(&ray)
    }

    fn next_drawn_name(&mut self) -> String {
        loop {
            self.drawn_count += 1;
            let name = format!("box-{}", self.drawn_count);
            if !self.entities.contains(&name) {
                return name;
            }
        }
    }

    fn set_rig_state(&mut self, view: ViewKind, state: InteractionState) {
        let rig = self.viewports.rig_mut(view);
        rig.state = state;
        // camera controls stay off while a box is being drawn
        rig.controls_enabled = matches!(state, InteractionState::Idle | InteractionState::Selecting);
    }

    fn end_gesture(&mut self) -> Gesture {
        let gesture = std::mem::take(&mut self.gesture);
        for view in ViewKind::ALL {
            self.set_rig_state(view, InteractionState::Idle);
        }
        gesture
    }
}
