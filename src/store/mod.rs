//! Observable value cells.
//!
//! A [`Store`] holds one value, notifies subscribers synchronously when it
//! changes, and memoizes stores derived from it through [`Selector`]s.

mod selector;
mod store;
mod subscription;

pub use selector::{Selector, SelectorKey};
pub use store::{Store, MAX_NOTIFY_DEPTH};
pub use subscription::Subscription;
