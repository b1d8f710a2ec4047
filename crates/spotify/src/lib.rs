//! Spotify Web API integration for spotctl.
//!
//! [`SpotifyClient`] implements `spotctl_core::MusicService`; [`oauth`] holds
//! the login flow used by `spotctl auth`.

pub mod client;
pub mod oauth;

pub use client::{ACCOUNTS_BASE_URL, API_BASE_URL, SpotifyClient};
