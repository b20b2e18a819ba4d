//! Kanban task board.
//!
//! The server half ([`server`], [`service`], [`repository`], [`filter`],
//! [`query`]) exposes tasks over a JSON REST API. The client half ([`api`],
//! [`store`], [`app`], [`ui`]) is a terminal board that talks to it.

pub mod api;
pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod parser;
pub mod query;
pub mod repository;
pub mod server;
pub mod service;
pub mod store;
pub mod ui;
