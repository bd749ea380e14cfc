//! Bookstore API: catalogue, accounts, and sales reports over Postgres, fronted
//! by in-process admission control, session tokens, and a read cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
