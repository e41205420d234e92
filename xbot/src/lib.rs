//! xbot: X/Twitter promotion bot for the Boring Math calculators.
//!
//! Two jobs, run serially on a schedule:
//! - Poster: drafts and posts promotional tweets under a daily quota
//! - Monitor: searches X for conversations where a calculator reply would help
//!
//! All durable state lives in two small documents behind [`state::StateStore`].

pub mod catalog;
pub mod client;
pub mod config;
pub mod filter;
pub mod generator;
pub mod monitor;
pub mod output;
pub mod poster;
pub mod relevance;
pub mod state;
