pub mod app;
pub mod archive;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod credhub;
pub mod errors;
pub mod gmail;
pub mod oauth;
pub mod scan;
pub mod types;
