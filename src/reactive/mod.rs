//! Reactive layer: push-based change propagation.
//!
//! # Modules
//!
//! - [`event_emitter`]: Generic typed pub/sub ([`EventEmitter<T>`]).
//! - [`event`]: [`ChangeEvent`], the repository-wide notification.
//! - [`value`]: the [`Reactive<T>`] capability plus [`LiveValue<T>`] and
//!   [`Constant<T>`], accepted wherever a statement takes a value.

pub mod event;
pub mod event_emitter;
pub mod value;

pub use event::ChangeEvent;
pub use event_emitter::{EventEmitter, ListenerId};
pub use value::{Constant, LiveValue, Reactive, Unsubscribe};
