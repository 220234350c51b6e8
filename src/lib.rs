//! guidance-authz - role and attribute based authorization for an academic
//! guidance tracker.
//!
//! Students, lecturers and their enrollments, agendas, submissions and feedback
//! are guarded by per-role rule templates. The library exposes the ability model,
//! the policy handlers and the request gate; the binary serves them over HTTP.

pub mod authz;
pub mod entities;
pub mod errors;
pub mod settings;
pub mod web;
