#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod convert;
pub mod dom;
pub mod ftmap;
pub mod logging;
pub mod outline;
pub mod package;
pub mod postprocess;
pub mod publish;
pub mod render;
pub mod upload;
