//! # Mobile money payment gateway server
//! This crate hosts the HTTP server for the payment engine. It is responsible for:
//! * Accepting payment requests from the marketplace and handing them to the [`mpg_engine::PaymentFlowApi`].
//! * Receiving status callbacks from MTN MoMo and Airtel Money, checking their signatures, and reconciling them with
//!   the transactions they refer to.
//! * Periodically polling the providers for payments whose callback never arrived.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! See [routes](routes/index.html) for the full list. Everything except `/health` lives under `/api/v1`.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
