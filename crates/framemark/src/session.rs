//! Session state and the pure event → state transition.

use framemark_types::Resolution;

use crate::boxes::BoxStore;
use crate::input::InputEvent;

pub const DEFAULT_STRIDE: u64 = 10;

pub const KEY_NEXT: char = 'n';
pub const KEY_PREV: char = 'p';
pub const KEY_QUIT: char = 'q';
pub const KEY_COMMIT: char = 's';
pub const KEY_UNDO: char = 'd';
pub const KEY_CLEAR: char = 'c';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub current_frame: u64,
    pub total_frames: u64,
    pub stride: u64,
    pub class_count: usize,
    pub source_resolution: Resolution,
    pub display_resolution: Resolution,
    pub boxes: BoxStore,
}

impl SessionState {
    pub fn new(
        current_frame: u64,
        total_frames: u64,
        stride: u64,
        class_count: usize,
        source_resolution: Resolution,
        display_resolution: Resolution,
    ) -> Self {
        Self {
            current_frame,
            total_frames,
            stride: stride.max(1),
            class_count,
            source_resolution,
            display_resolution,
            boxes: BoxStore::new(),
        }
    }

    /// `current + stride`, clamped two frames short of the end of the stream.
    pub fn next_target(&self) -> u64 {
        let last = self.total_frames.saturating_sub(2);
        self.current_frame.saturating_add(self.stride).min(last)
    }

    pub fn prev_target(&self) -> u64 {
        self.current_frame.saturating_sub(self.stride)
    }

    /// Moves onto `index` after it decoded; boxes never carry across frames.
    pub fn arrive(&mut self, index: u64) {
        self.current_frame = index;
        self.boxes.clear_all();
    }
}

/// What the control loop must do after a transition, beyond adopting the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Flush the current frame, then decode `target`.
    Navigate(u64),
    /// Flush the current frame, then end the session.
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub state: SessionState,
    pub action: Action,
}

impl Step {
    fn stay(state: SessionState) -> Self {
        Self {
            state,
            action: Action::None,
        }
    }
}

/// Applies one input event. Navigation leaves the frame index untouched; the
/// caller moves only once the target frame has actually been read.
pub fn transition(mut state: SessionState, event: &InputEvent) -> Step {
    match *event {
        InputEvent::PointerDown { x, y } => {
            let class = state.boxes.active_class();
            state.boxes.begin_box(x, y, class);
            Step::stay(state)
        }
        InputEvent::PointerMove { x, y } => {
            state.boxes.update_open_box(x, y);
            Step::stay(state)
        }
        InputEvent::PointerUp { x, y } => {
            state.boxes.close_box(x, y);
            Step::stay(state)
        }
        InputEvent::Key(key) => on_key(state, key),
    }
}

fn on_key(mut state: SessionState, key: char) -> Step {
    let action = match key {
        KEY_QUIT => Action::Quit,
        KEY_NEXT => Action::Navigate(state.next_target()),
        KEY_PREV => Action::Navigate(state.prev_target()),
        KEY_COMMIT => {
            state.boxes.commit_drafts();
            Action::None
        }
        KEY_UNDO => {
            state.boxes.delete_last();
            Action::None
        }
        KEY_CLEAR => {
            state.boxes.clear_all();
            Action::None
        }
        digit => {
            if let Some(id) = digit.to_digit(10) {
                state.boxes.set_active_class(id as usize, state.class_count);
            }
            Action::None
        }
    };
    Step { state, action }
}
