pub mod chain;
pub mod config;
pub mod crawler;
pub mod error;
pub mod link_graph;
pub mod pipeline;
pub mod rank;
pub mod solver;

pub use error::{PipelineError, Result};
