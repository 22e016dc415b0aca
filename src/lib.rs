pub mod actors;
pub mod algorithm;
pub mod config;
pub mod crawl;
pub mod entities;
pub mod schemas;
