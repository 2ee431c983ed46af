//! Item lifecycle transitions

use crate::error::RegistryError;
use crate::types::{ItemId, ItemState};

/// States reachable from `from` in one step.
///
/// `Broken` is terminal.
pub fn allowed_transitions(from: ItemState) -> &'static [ItemState] {
    use ItemState::*;
    match from {
        Active => &[Broken],
        Broken => &[],
    }
}

/// Validates a state transition of item `id`.
pub fn validate_transition(id: ItemId, from: ItemState, to: ItemState) -> Result<(), RegistryError> {
    if allowed_transitions(from).contains(&to) {
        return Ok(());
    }
    match from {
        ItemState::Broken => Err(RegistryError::AlreadyBroken { id }),
        ItemState::Active => Err(RegistryError::validation(
            "state",
            format!("{from:?} -> {to:?} is not a transition"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_can_break() {
        assert!(validate_transition(ItemId(0), ItemState::Active, ItemState::Broken).is_ok());
    }

    #[test]
    fn broken_is_terminal() {
        assert!(allowed_transitions(ItemState::Broken).is_empty());
        for to in [ItemState::Active, ItemState::Broken] {
            let err = validate_transition(ItemId(5), ItemState::Broken, to).unwrap_err();
            assert!(matches!(err, RegistryError::AlreadyBroken { id: ItemId(5) }));
        }
    }

    #[test]
    fn active_to_active_is_not_a_transition() {
        let err = validate_transition(ItemId(0), ItemState::Active, ItemState::Active).unwrap_err();
        assert!(matches!(err, RegistryError::Validation { field: "state", .. }));
    }
}
