// Resume intake pipeline.
// Upload gateway -> transfer tracker -> FIFO queue / state machine -> analysis workers.
// The registry is the single owner of document state; everything else goes through it.

pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod queue;
pub mod registry;
pub mod service;
pub mod transfer;
pub mod validation;

#[cfg(test)]
pub mod testing;
