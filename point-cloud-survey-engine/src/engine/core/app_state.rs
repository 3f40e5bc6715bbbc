use bevy::prelude::*;

/// Coarse application lifecycle. Survey tools only run once the target
/// object has been bound; until then every session precondition fails.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum AppState {
    #[default]
    Loading,
    Running,
}
