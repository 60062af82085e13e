// src/types.rs
//
// Common shared types for the doseloop engine.

/// Millisecond timestamp since Unix epoch.
pub type TimestampMs = i64;

/// Discrete control action applied to the dose process each tick.
///
/// The wire representation is the bare index (0 = decrease, 1 = hold,
/// 2 = increase), matching the event payloads observers consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Decrease,
    Hold,
    Increase,
}

impl Action {
    /// All actions in index order. Index into this with a value in
    /// `[0, ACTION_SIZE)` to convert from a table/action index.
    pub const ALL: [Action; 3] = [Action::Decrease, Action::Hold, Action::Increase];

    /// Table index for this action.
    pub fn index(self) -> usize {
        match self {
            Action::Decrease => 0,
            Action::Hold => 1,
            Action::Increase => 2,
        }
    }

    /// Signed direction of the action: -1, 0 or +1.
    pub fn direction(self) -> f64 {
        self.index() as f64 - 1.0
    }
}
