pub mod annotation;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod ncbi;
pub mod output;
pub mod parsers;
pub mod prisma;
pub mod quality;
pub mod query;
pub mod registry;
pub mod store;
pub mod vocabulary;
