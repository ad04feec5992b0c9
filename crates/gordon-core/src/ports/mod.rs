//! Ports - 抽象化レイヤー
//!
//! The taskqueue talks to its backing store only through these traits.
//! Implementations live in [`crate::impls`].

pub mod list_store;

pub use self::list_store::{ListStore, StoreConnector, StoreError};
