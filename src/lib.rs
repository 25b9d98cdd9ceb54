pub mod args;
pub mod config;
pub mod container;
pub mod digests;
pub mod errors;
pub mod git;
pub mod lockfile;
pub mod pin;
pub mod release;
pub mod resolver;
pub mod rewrite;
pub mod scan;
pub mod utils;
