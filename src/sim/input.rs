//! Pointer and touch input
//!
//! Translates host pointer events (already mapped to canvas x) into the
//! per-tick [`TickInput`]. Only the first touch point is tracked.

use super::tick::TickInput;

#[derive(Debug, Clone, Default)]
pub struct InputController {
    target_x: Option<f32>,
    dragging: bool,
    mouse_down: bool,
    touch_id: Option<i32>,
    /// One-shot start request, cleared by [`Self::take_tick_input`]
    start_requested: bool,
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer_down(&mut self, x: f32) {
        self.mouse_down = true;
        self.dragging = true;
        self.target_x = Some(x);
        self.start_requested = true;
    }

    pub fn pointer_move(&mut self, x: f32) {
        if self.dragging || self.mouse_down {
            self.target_x = Some(x);
        }
    }

    pub fn pointer_up(&mut self) {
        self.mouse_down = false;
        self.dragging = false;
    }

    /// Pointer left the canvas
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    pub fn touch_start(&mut self, id: i32, x: f32) {
        if self.touch_id.is_some_and(|tracked| tracked != id) {
            return;
        }
        self.touch_id = Some(id);
        self.dragging = true;
        self.target_x = Some(x);
        self.start_requested = true;
    }

    pub fn touch_move(&mut self, id: i32, x: f32) {
        if self.dragging && self.touch_id == Some(id) {
            self.target_x = Some(x);
        }
    }

    pub fn touch_end(&mut self, id: i32) {
        if self.touch_id == Some(id) {
            self.touch_id = None;
            self.dragging = false;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn target_x(&self) -> Option<f32> {
        self.target_x
    }

    /// Build the input for the next tick, consuming the start request
    pub fn take_tick_input(&mut self) -> TickInput {
        TickInput {
            target_x: self.target_x,
            start: std::mem::take(&mut self.start_requested),
            idle_mode: false,
        }
    }

    /// Forget all pointer state (on restart)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
