#![allow(async_fn_in_trait)]
pub mod archive;
pub mod catalog;
pub mod download_plan;
pub mod error;
pub mod render;
pub mod run_config;
pub mod s3;
pub mod workflow;
