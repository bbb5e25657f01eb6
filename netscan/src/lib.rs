pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod ingest;
pub mod mac;
pub mod model;
pub mod oui;
pub mod parsers;
pub mod registry;
pub mod scanner;
pub mod vendor;
