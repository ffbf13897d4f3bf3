//! Small async building blocks shared by the session components.

pub mod debounce;
pub mod join;
pub mod mailbox;
pub mod signal;

pub use debounce::Debouncer;
pub use join::join_with_grace;
pub use mailbox::Mailbox;
pub use signal::{OnceSignal, SignalWaiter};
