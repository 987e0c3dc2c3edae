//! Top-Down Learning API Library Crate
//!
//! This library contains everything the web service needs: configuration,
//! the SQLite store, the curriculum engine, API handlers and routing. The
//! `api` binary is a thin wrapper around this library.

pub mod config;
pub mod db;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
