//! Input model: modifier keys, mouse buttons, and the gesture state machine.
//!
//! `InputMachine` turns raw pointer events into [`Gesture`]s. A press stays
//! ambiguous until the pointer travels past [`DRAG_THRESHOLD_PX`]; it then
//! becomes an object drag (a node was under the press and the drag modifier
//! is held) or a pan. Releasing before the threshold is a click.
//!
//! The machine only reads the camera and scene; it never mutates records.
//! The engine applies the returned gestures.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::{Camera, Point};
use crate::config::DragModifier;
use crate::consts::DRAG_THRESHOLD_PX;
use crate::record::NodeRef;
use crate::scene::SceneGraph;

/// Keyboard modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Meta / Command key.
    pub meta: bool,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button, pen or single touch.
    Primary,
    Middle,
    Secondary,
}

/// Wheel / trackpad scroll delta in pixels.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    pub dx: f64,
    /// Positive = down.
    pub dy: f64,
}

/// Node under a press, remembered until the press resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub target: NodeRef,
    /// Pointer world position minus node center at press time.
    pub grab_offset: Point,
}

/// Gesture in progress between pointer-down and pointer-up.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InputState {
    #[default]
    Idle,
    /// Pointer is down but has not yet moved past the drag threshold.
    Pressed {
        start_screen: Point,
        candidate: Option<Candidate>,
        /// Drag modifier was seen at some point during the press.
        armed: bool,
    },
    Panning {
        last_screen: Point,
    },
    DraggingObject {
        target: NodeRef,
        grab_offset: Point,
        /// Node center at the previous event, used when the drag is cancelled.
        last_world: Point,
    },
}

/// Events produced by [`InputMachine`].
///
/// World positions in drag events are the dragged node's new center, not the
/// raw cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Hover { world: Point, target: Option<NodeRef> },
    Click { world: Point, target: Option<NodeRef> },
    DragStart { target: NodeRef, world: Point },
    Drag { target: NodeRef, world: Point },
    DragEnd { target: NodeRef, world: Point },
    /// Screen-space pan delta.
    PanBy { dx: f64, dy: f64 },
    PanEnd,
}

/// Pointer state machine.
#[derive(Debug, Clone, Default)]
pub struct InputMachine {
    state: InputState,
    drag_modifier: DragModifier,
}

impl InputMachine {
    #[must_use]
    pub fn new(drag_modifier: DragModifier) -> Self {
        Self { state: InputState::Idle, drag_modifier }
    }

    #[must_use]
    pub fn state(&self) -> &InputState {
        &self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == InputState::Idle
    }

    pub fn set_drag_modifier(&mut self, drag_modifier: DragModifier) {
        self.drag_modifier = drag_modifier;
    }

    /// Start a press. An unfinished gesture is cancelled first and its end
    /// events are returned.
    pub fn pointer_down(
        &mut self,
        screen: Point,
        button: Button,
        modifiers: Modifiers,
        camera: &Camera,
        scene: &SceneGraph,
    ) -> Vec<Gesture> {
        let out = self.pointer_cancel();
        if !screen.is_finite() {
            return out;
        }

        let candidate = if button == Button::Primary {
            let world = camera.screen_to_world(screen);
            scene.hit(world).map(|node| Candidate {
                target: NodeRef::from(node),
                grab_offset: Point::new(world.x - node.x, world.y - node.y),
            })
        } else {
            None
        };
        self.state = InputState::Pressed {
            start_screen: screen,
            candidate,
            armed: self.drag_modifier.is_active(modifiers),
        };
        out
    }

    pub fn pointer_move(
        &mut self,
        screen: Point,
        modifiers: Modifiers,
        camera: &Camera,
        scene: &SceneGraph,
    ) -> Vec<Gesture> {
        if !screen.is_finite() {
            return Vec::new();
        }
        let world = camera.screen_to_world(screen);
        let modifier_active = self.drag_modifier.is_active(modifiers);

        match std::mem::take(&mut self.state) {
            InputState::Idle => vec![hover(world, scene)],
            InputState::Pressed { start_screen, candidate, armed } => {
                let armed = armed || modifier_active;
                if screen.distance(start_screen) <= DRAG_THRESHOLD_PX {
                    self.state = InputState::Pressed { start_screen, candidate, armed };
                    return vec![hover(world, scene)];
                }
                match candidate {
                    Some(Candidate { target, grab_offset }) if armed => {
                        let at = Point::new(world.x - grab_offset.x, world.y - grab_offset.y);
                        tracing::debug!(node = %target.id, kind = %target.kind, "drag started");
                        self.state = InputState::DraggingObject { target: target.clone(), grab_offset, last_world: at };
                        vec![
                            Gesture::DragStart { target: target.clone(), world: at },
                            Gesture::Drag { target, world: at },
                        ]
                    }
                    _ => {
                        self.state = InputState::Panning { last_screen: screen };
                        vec![Gesture::PanBy { dx: screen.x - start_screen.x, dy: screen.y - start_screen.y }]
                    }
                }
            }
            InputState::Panning { last_screen } => {
                self.state = InputState::Panning { last_screen: screen };
                vec![Gesture::PanBy { dx: screen.x - last_screen.x, dy: screen.y - last_screen.y }]
            }
            InputState::DraggingObject { target, grab_offset, .. } => {
                let at = Point::new(world.x - grab_offset.x, world.y - grab_offset.y);
                self.state = InputState::DraggingObject { target: target.clone(), grab_offset, last_world: at };
                vec![Gesture::Drag { target, world: at }]
            }
        }
    }

    /// Finish the gesture at `screen`.
    pub fn pointer_up(&mut self, screen: Point, camera: &Camera, scene: &SceneGraph) -> Vec<Gesture> {
        let world = camera.screen_to_world(screen);
        match std::mem::take(&mut self.state) {
            InputState::Idle => Vec::new(),
            InputState::Pressed { candidate, .. } => {
                let target = match candidate {
                    Some(c) => Some(c.target),
                    None if world.is_finite() => scene.hit(world).map(NodeRef::from),
                    None => None,
                };
                vec![Gesture::Click { world, target }]
            }
            InputState::Panning { .. } => vec![Gesture::PanEnd],
            InputState::DraggingObject { target, grab_offset, last_world } => {
                let at = if world.is_finite() {
                    Point::new(world.x - grab_offset.x, world.y - grab_offset.y)
                } else {
                    last_world
                };
                vec![Gesture::DragEnd { target, world: at }]
            }
        }
    }

    /// Abort the gesture. Pans and drags still get their end event; a press
    /// produces nothing.
    pub fn pointer_cancel(&mut self) -> Vec<Gesture> {
        match std::mem::take(&mut self.state) {
            InputState::Idle | InputState::Pressed { .. } => Vec::new(),
            InputState::Panning { .. } => vec![Gesture::PanEnd],
            InputState::DraggingObject { target, last_world, .. } => {
                vec![Gesture::DragEnd { target, world: last_world }]
            }
        }
    }

    /// Keyboard modifiers changed without pointer motion.
    pub fn modifiers_changed(&mut self, modifiers: Modifiers) {
        let active = self.drag_modifier.is_active(modifiers);
        if let InputState::Pressed { candidate: Some(_), armed, .. } = &mut self.state {
            *armed |= active;
        }
    }
}

fn hover(world: Point, scene: &SceneGraph) -> Gesture {
    Gesture::Hover { world, target: scene.hit(world).map(NodeRef::from) }
}
