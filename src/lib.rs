//! Asynchronous protein structure prediction jobs behind an HTTP API.

pub mod artifact;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod predictor;
pub mod runner;
pub mod service;
pub mod ui;
