//! Client for running a Flux text-to-image job on a ComfyUI server.
//!
//! [`ComfyClient::generate`] builds the job graph from [`GenerationParams`],
//! submits it, polls the job history and returns the URL of the produced image.

pub mod client;
pub mod error;
pub mod graph;
pub mod params;

pub use client::{ClientConfig, ComfyClient, PollPolicy};
pub use error::GenerateError;
pub use graph::{JobGraph, build_job_graph};
pub use params::{GenerationParams, TranslationCredentials};
