//! Graph state channels: pluggable merge semantics for a single field of
//! shared state, plus the whole-state [`StateUpdater`] used by [`crate::graph`].

mod error;
mod ephemeral_value;
mod named_barrier;
mod updater;

pub use error::ChannelError;
pub use ephemeral_value::EphemeralValue;
pub use named_barrier::{NamedBarrierUpdate, NamedBarrierValue};
pub use updater::{boxed_updater, BoxedStateUpdater, FieldBasedUpdater, ReplaceUpdater, StateUpdater};

use std::fmt::Debug;

/// A single-field channel: a typed slot with its own read/write/update semantics,
/// independent of whole-state replacement.
pub trait Channel<T>: Debug
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn read(&self) -> Option<T>;
    fn write(&mut self, value: T);
    fn update(&mut self, updates: Vec<T>) -> Result<(), ChannelError>;
    fn channel_type(&self) -> &'static str;
}
