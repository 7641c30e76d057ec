//! # Mobile money API clients
//!
//! Thin, typed REST clients for the mobile money providers supported by the payment gateway.
//!
//! * [`MtnMomoApi`] talks to the MTN MoMo Open API (collections for charges, disbursements for refunds).
//! * [`AirtelMoneyApi`] talks to the Airtel Africa Open API (merchant payments, enquiry and refunds).
//!
//! Both clients obtain OAuth bearer tokens on demand and cache them until shortly before they expire. Every request
//! is bounded by the timeout in the client configuration; a timeout surfaces as [`MobileMoneyApiError::Timeout`] so
//! that callers can tell "we don't know what happened" apart from "the provider said no".
//!
//! The [`data_objects`] module also holds the typed shapes of the providers' webhook callbacks.
mod airtel_money;
mod config;
mod error;
mod helpers;
mod mtn_momo;

pub mod data_objects;

pub use airtel_money::AirtelMoneyApi;
pub use config::{AirtelMoneyConfig, MtnMomoConfig};
pub use error::MobileMoneyApiError;
pub use helpers::{local_msisdn, new_reference_id};
pub use mtn_momo::{MtnMomoApi, MtnProduct};
