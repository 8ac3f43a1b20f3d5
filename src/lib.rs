pub mod ast;
pub mod config;
pub mod error;
pub mod translators;
