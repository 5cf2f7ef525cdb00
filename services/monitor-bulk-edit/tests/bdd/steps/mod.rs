//! BDD step definitions for the monitor bulk editor

pub mod service_steps;
pub mod template_steps;
pub mod update_steps;
