//! Mobile Money Payment Engine
//!
//! The payment engine processes payments against third-party mobile money providers (and records cash and card
//! payments) on behalf of a multi-vendor marketplace. It is provider-agnostic: providers plug in through the
//! [`PaymentGateway`] trait.
//!
//! The library is divided into these sections:
//! 1. The data model ([`mod@db_types`]) and the transaction state machine on [`db_types::TransactionStatus`].
//! 2. Storage. [`PaymentTransactionStore`] is the backend contract and [`SqliteDatabase`] implements it.
//! 3. Providers. The [`PaymentGateway`] adapter trait, the [`GatewayRegistry`] that maps each provider to its adapter,
//!    and the [`StatusMap`] that folds each provider's status vocabulary into the canonical statuses.
//! 4. The public API, [`PaymentFlowApi`]. It initiates payments (idempotently), reconciles their outcome from polls
//!    and webhooks, and refunds them.
//!
//! The engine also publishes a [`events::PaymentStatusChangedEvent`] whenever a transaction changes status, so that
//! other parts of the system (orders, billing) can react without polling.
pub mod db_types;
pub mod events;
mod gateways;
mod normalizer;
mod pay_api;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use gateways::{GatewayError, GatewayRegistry, GatewayRequest, GatewayResponse, PaymentGateway};
pub use normalizer::StatusMap;
pub use pay_api::{
    errors::PaymentFlowError,
    payment_flow_api::PaymentFlowApi,
    payment_objects::{InitiatePaymentRequest, WebhookPayload},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    InsertTransactionResult,
    PaymentTransactionStore,
    StatusUpdate,
    TransactionQueryFilter,
    TransactionStoreError,
};
