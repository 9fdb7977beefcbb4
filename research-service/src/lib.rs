pub mod auth;
pub mod design;
pub mod discussion;
pub mod llm;
pub mod models;
pub mod notify;
pub mod panel;
pub mod report;
pub mod service;
pub mod targets;

#[cfg(test)]
pub(crate) mod testing;

pub use service::{AppState, build_router, create_app};
