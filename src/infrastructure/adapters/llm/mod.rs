//! Language Model Adapters

mod http_model_client;
mod scripted_model;

pub use http_model_client::{HttpModelClient, HttpModelClientConfig};
pub use scripted_model::{
    RequestKind, ScriptedModel, ScriptedModelConfig, DEFAULT_BOOK_HEADING, DEFAULT_SECTION_HEADING,
};
