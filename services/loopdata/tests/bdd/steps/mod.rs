//! BDD step definitions for the loopdata service

pub mod config_steps;
pub mod packet_steps;
pub mod record_steps;
