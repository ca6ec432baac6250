pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ocr;
pub mod pipeline;
pub mod review;
pub mod scanner;
pub mod store;
