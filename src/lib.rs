pub mod config;
pub mod cross_validation;
pub mod dataset;
pub mod fold_export;
pub mod inning;
pub mod pitching_pattern;
pub mod players;
pub mod prepare;
pub mod rest;
pub mod run_meta;
pub mod schema;
pub mod teams;
