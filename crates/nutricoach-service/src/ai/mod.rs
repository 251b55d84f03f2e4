//! Language model integration.
//!
//! An OpenAI-compatible chat-completion client with an ordered model
//! fallback list. Used by the question, lab-analysis, meal plan and recipe
//! endpoints.

pub mod client;
pub mod types;

pub use client::{AiClient, AiError, Completion};

/// System prompt for free-text nutrition questions.
pub const ASK_SYSTEM_PROMPT: &str =
    "You are a nutrition coach. Answer briefly and practically.";

/// System prompt for lab result interpretation.
pub const LABS_SYSTEM_PROMPT: &str =
    "You are a nutrition coach reviewing lab results. Summarise notable values \
     and suggest dietary adjustments. Recommend seeing a doctor for anything abnormal.";

/// System prompt for seven-day meal plans.
pub const PLAN_SYSTEM_PROMPT: &str =
    "You are a professional nutritionist and dietitian. Write in a clear, structured way.";

/// System prompt for recipes built from a list of products.
pub const RECIPE_SYSTEM_PROMPT: &str =
    "You are a chef and nutritionist. Write in a clear, structured way.";
