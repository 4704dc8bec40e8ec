//! notamsync - KOCA NOTAM portal scraper and map-store synchronizer.
//!
//! Retrieves NOTAM records from the KOCA portal's script-driven grid,
//! captures per-page spreadsheet exports from a watched download directory,
//! merges and deduplicates them by natural key, and reconciles the result
//! into the remote store behind the map frontend.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod services;
