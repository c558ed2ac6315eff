//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on request translation and auth plumbing.

pub mod activity;
pub mod autosave;
pub mod exam;
pub mod grading;
pub mod inquiry;
pub mod reports;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod submission;
pub mod user;

#[cfg(all(test, feature = "live-db-tests"))]
pub mod test_support;
