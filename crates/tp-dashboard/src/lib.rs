pub mod api;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod logging;
pub mod poll;
pub mod reconcile;
pub mod render;
pub mod state;
pub mod surface;
pub mod transport;
pub mod view;

#[cfg(test)]
mod testing;
