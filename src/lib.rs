pub mod config;
pub mod navigation;
pub mod request;
pub mod token;
