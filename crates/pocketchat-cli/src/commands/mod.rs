pub mod config;
pub mod conversations;
