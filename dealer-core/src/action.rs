use crate::Chips;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Fold,
    /// Call, or check when there is nothing to match.
    Call,
    /// In no-limit betting the amount is the total the player is raising
    /// *to* this hand, not the increment. Limit raises carry 0.
    Raise(Chips),
}

impl Action {
    pub const fn is_raise(&self) -> bool {
        matches!(self, Action::Raise(_))
    }
}
