//! User-facing channels: web gateway and Telegram companion.

pub mod telegram;
pub mod web;
