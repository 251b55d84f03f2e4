//! HTTP request handlers.

pub mod achievements;
pub mod admin;
pub mod ask;
pub mod bot;
pub mod challenges;
pub mod health;
pub mod labs;
pub mod plan;
pub mod profile;
pub mod promo;
pub mod referral;
pub mod weight;
