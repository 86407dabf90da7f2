pub mod client;
pub mod config;
pub mod entities;
pub mod error;
pub mod form;
pub mod shell;
