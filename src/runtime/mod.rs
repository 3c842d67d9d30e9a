//! Runtime adapters: stepping between actions and spawning bridged futures.

pub mod enqueue;
pub mod tokio_spawner;

pub use enqueue::{Enqueue, Immediate, YieldNow};
pub use tokio_spawner::{BoxTask, Spawn, TokioSpawner};
