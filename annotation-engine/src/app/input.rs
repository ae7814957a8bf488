use super::Engine;
use super::viewports::ViewportLayout;
use crate::camera::rig::ViewKind;
use crate::tools::draw::{DrawMode, PointerOutcome};
use crate::tools::manipulation::TransformOp;
use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

const NUDGE_STEP: f32 = 0.1;
const TURN_STEP: f32 = std::f32::consts::PI / 36.0;
const ZOOM_PER_LINE: f32 = 1.1;

/// Pointer state carried between frames.
#[derive(Default)]
pub struct PointerTracker {
    /// View the left button went down in. Moves and the release go there.
    captured: Option<ViewKind>,
    /// View being panned with the right button, and the last cursor position.
    panning: Option<(ViewKind, Vec2)>,
    last_cursor: Option<Vec2>,
}

/// Cursor position in physical pixels.
fn physical_cursor(window: &Window) -> Option<Vec2> {
    window
        .cursor_position()
        .map(|logical| logical * window.scale_factor())
}

fn pixel_in(layout: &ViewportLayout, view: ViewKind, cursor: Vec2) -> Vec2 {
    layout
        .rect(view)
        .map(|rect| cursor - rect.min.as_vec2())
        .unwrap_or(cursor)
}

pub fn pointer_input(
    windows: Query<&Window, With<PrimaryWindow>>,
    layout: Res<ViewportLayout>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut scroll_events: EventReader<MouseWheel>,
    mut engine: ResMut<Engine>,
    mut tracker: Local<PointerTracker>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor) = physical_cursor(window) else {
        scroll_events.clear();
        return;
    };
    let moved = tracker.last_cursor != Some(cursor);
    tracker.last_cursor = Some(cursor);
    let under = layout.hit(cursor);

    if mouse_button.just_pressed(MouseButton::Left) {
        if let Some((view, pixel)) = under {
            tracker.captured = Some(view);
            match engine.pointer_down(view, pixel) {
                PointerOutcome::Picked(Some(name)) => debug!("Picked '{}'", name),
                PointerOutcome::Placing(name) => debug!("Placing '{}'", name),
                _ => {}
            }
        }
    } else if moved {
        match (tracker.captured, under) {
            (Some(view), _) => {
                engine.pointer_move(view, pixel_in(&layout, view, cursor));
            }
            (None, Some((view, pixel))) if view.is_orthographic() => {
                engine.pointer_move(view, pixel);
            }
            _ => {}
        }
    }

    if mouse_button.just_released(MouseButton::Left) {
        if let Some(view) = tracker.captured.take() {
            if let PointerOutcome::Created(name) =
                engine.pointer_up(view, pixel_in(&layout, view, cursor))
            {
                info!("Drew '{}'", name);
            }
        }
    }

    // Right drag pans the view it started in.
    if mouse_button.just_pressed(MouseButton::Right) {
        tracker.panning = under.map(|(view, _)| (view, cursor));
    } else if mouse_button.pressed(MouseButton::Right) {
        if let Some((view, last)) = tracker.panning {
            let delta = cursor - last;
            if delta != Vec2::ZERO {
                let viewports = engine.viewports_mut();
                viewports.rig_mut(view).pan(delta);
                viewports.request_render();
                tracker.panning = Some((view, cursor));
            }
        }
    } else {
        tracker.panning = None;
    }

    let mut scroll_accum = 0.0;
    for ev in scroll_events.read() {
        scroll_accum += match ev.unit {
            MouseScrollUnit::Line => ev.y,
            MouseScrollUnit::Pixel => ev.y * 0.05,
        };
    }
    if scroll_accum.abs() > f32::EPSILON {
        if let Some((view, _)) = under {
            engine
                .viewports_mut()
                .zoom_view(view, ZOOM_PER_LINE.powf(scroll_accum));
        }
    }
}

/// Shortcut for one key, if it maps to anything.
pub fn key_action(key: KeyCode) -> Option<KeyAction> {
    let action = match key {
        KeyCode::Delete | KeyCode::Backspace => KeyAction::DeleteActive,
        KeyCode::Escape => KeyAction::Deselect,
        KeyCode::Digit1 => KeyAction::DrawMode(DrawMode::None),
        KeyCode::Digit2 => KeyAction::DrawMode(DrawMode::ClickToPlace),
        KeyCode::Digit3 => KeyAction::DrawMode(DrawMode::DragToSize),
        KeyCode::ArrowLeft => KeyAction::Transform(TransformOp::Translate {
            delta: [-NUDGE_STEP, 0.0, 0.0],
        }),
        KeyCode::ArrowRight => KeyAction::Transform(TransformOp::Translate {
            delta: [NUDGE_STEP, 0.0, 0.0],
        }),
        KeyCode::ArrowUp => KeyAction::Transform(TransformOp::Translate {
            delta: [0.0, NUDGE_STEP, 0.0],
        }),
        KeyCode::ArrowDown => KeyAction::Transform(TransformOp::Translate {
            delta: [0.0, -NUDGE_STEP, 0.0],
        }),
        KeyCode::KeyQ => KeyAction::Transform(TransformOp::Rotate { angle: TURN_STEP }),
        KeyCode::KeyE => KeyAction::Transform(TransformOp::Rotate { angle: -TURN_STEP }),
        _ => return None,
    };
    Some(action)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    DeleteActive,
    Deselect,
    DrawMode(DrawMode),
    Transform(TransformOp),
}

pub fn keyboard_input(keyboard: Res<ButtonInput<KeyCode>>, mut engine: ResMut<Engine>) {
    for key in keyboard.get_just_pressed() {
        let Some(action) = key_action(*key) else {
            continue;
        };
        match action {
            KeyAction::DeleteActive => {
                if let Some(name) = engine.soft_delete_active() {
                    info!("Deleted '{}'", name);
                }
            }
            KeyAction::Deselect => {
                engine.deselect();
            }
            KeyAction::DrawMode(mode) => engine.set_draw_mode(mode),
            KeyAction::Transform(op) => {
                if let Err(e) = engine.transform_active(op) {
                    debug!("Ignored {:?}: {}", op, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_keys_switch_draw_modes() {
        assert_eq!(
            key_action(KeyCode::Digit3),
            Some(KeyAction::DrawMode(DrawMode::DragToSize))
        );
        assert_eq!(key_action(KeyCode::KeyZ), None);
    }

    #[test]
    fn captured_pointer_stays_relative_to_its_view() {
        let layout = ViewportLayout::compute(UVec2::new(1200, 900));
        assert_eq!(
            pixel_in(&layout, ViewKind::Side, Vec2::new(700.0, 650.0)),
            Vec2::new(-100.0, 50.0)
        );
    }
}
