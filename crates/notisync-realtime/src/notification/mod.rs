//! Client-side notification state: the store, the alert queue, and
//! optimistic mutations.

pub mod alerts;
pub mod optimistic;
pub mod store;

pub use alerts::{Alert, AlertPolicy, AlertQueue};
pub use optimistic::{Mutation, OptimisticTarget, Undo, run_optimistic};
pub use store::NotificationStore;
