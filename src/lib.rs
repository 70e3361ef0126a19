pub mod auth;
pub mod bot;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod mail;
pub mod relay;
pub mod store;
pub mod webhook;
