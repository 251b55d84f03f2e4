//! NutriCoach HTTP API Service.
//!
//! This crate provides the HTTP API behind the NutriCoach Telegram bot and
//! Mini-App:
//!
//! - Profile, subscription and credit views
//! - Lab analysis and nutrition questions via a language model
//! - Promo codes, referrals, challenges and achievements
//! - Bot callbacks for `/start`, promo codes and payments
//!
//! # Authentication
//!
//! The service supports two authentication methods:
//!
//! 1. **Mini-App init data** - `Authorization: tma <init data>`, signed by
//!    Telegram with the bot token (see [`init_data`])
//! 2. **Service API key** - `X-Api-Key`, for the bot process

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for the router even when they do not await

pub mod ai;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod init_data;
pub mod notify;
pub mod routes;
pub mod state;

pub use ai::{AiClient, Completion};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use init_data::{sign_init_data, verify, AuthError, TrustedIdentity};
pub use notify::Notifier;
pub use routes::create_router;
pub use state::AppState;
