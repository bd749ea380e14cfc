//! Application services orchestrating the domain and persistence adapters.

pub mod auth;
pub mod catalog;
pub mod error;
pub mod reports;
pub mod repos;
