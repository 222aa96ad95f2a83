pub mod check_manifest;
pub mod config;
pub mod run;
