pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod flickr;
pub mod model;
pub mod retry;
pub mod source;
pub mod twitter;
