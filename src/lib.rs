//! MusicMatch - social graph backend for a music marketplace
//!
//! This library provides accounts, sessions, the follow graph and track
//! listings on top of a graph store.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
