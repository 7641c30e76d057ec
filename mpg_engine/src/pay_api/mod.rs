//! # Payment engine public API
//!
//! [`payment_flow_api::PaymentFlowApi`] is the orchestrator: it owns the idempotency check, the transaction state
//! machine and the reconciliation of polled and pushed provider statuses. It is generic over the storage backend and
//! talks to providers only through the [`crate::GatewayRegistry`].
//!
//! ```rust,ignore
//! use mpg_engine::{events::EventProducers, GatewayRegistry, PaymentFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = PaymentFlowApi::new(db, GatewayRegistry::new(), EventProducers::default());
//! let tx = api.fetch("some-transaction-id").await?;
//! ```
pub mod errors;
pub mod payment_flow_api;
pub mod payment_objects;
