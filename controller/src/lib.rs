//! Network controller for a serial-attached LED fixture.
//!
//! The [`device`] manager owns the one serial connection, the [`dispatch`]er
//! writes light commands through it, the [`store`] remembers the last user
//! state and schedule, and the [`scheduler`] blanks the light during the
//! configured off-window. [`api`] exposes all of it over HTTP.

pub mod api;
pub mod app;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

pub use app::AppState;
pub use error::{ControllerError, PersistenceError};
