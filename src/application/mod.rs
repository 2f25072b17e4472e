pub mod bootstrap;
pub mod commands;
pub mod corrective_writer;
pub mod session;
pub mod sync_controller;
