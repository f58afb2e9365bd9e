pub mod config;
pub mod error;
pub mod hyper;
pub mod runner;
pub mod scripts;
pub mod session;
pub mod staging;
pub mod timing;
