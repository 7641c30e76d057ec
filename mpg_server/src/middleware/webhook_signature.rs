//! Webhook signature middleware for Actix Web.
//!
//! Providers sign their callbacks with the base64-encoded HMAC-SHA256 of the raw request body, keyed with a secret we
//! share with them, and send the signature in a header. Headers and secrets differ per provider, so every webhook route
//! is wrapped in a [`WebhookSignatureFactory`] built for its own provider.
//!
//! A callback that fails the check never reaches the handler and is answered with a 403.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::HeaderMap,
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::*;
use mpg_common::Secret;
use mpg_engine::db_types::Provider;
use thiserror::Error;

use crate::{config::WebhookHmacConfig, errors::ServerError, helpers::verify_hmac};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("{0} webhook signatures cannot be verified, since no secret is configured")]
    NoSecret(Provider),
    #[error("No {provider} signature found in {header}")]
    Missing { provider: Provider, header: String },
    #[error("The {0} signature is not valid base64")]
    Malformed(Provider),
    #[error("Invalid {0} webhook signature")]
    Mismatch(Provider),
}

/// The signature rules for one provider's webhook.
#[derive(Debug, Clone)]
pub struct SignatureCheck {
    provider: Provider,
    header: String,
    secret: Secret<String>,
    enabled: bool,
}

impl SignatureCheck {
    pub fn new(provider: Provider, config: &WebhookHmacConfig) -> Self {
        Self { provider, header: config.header.clone(), secret: config.secret.clone(), enabled: config.enabled }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Checks the signature header in `headers` against `body`. Always fails if no secret is configured.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
        let provider = self.provider;
        if !self.secret.is_set() {
            return Err(SignatureError::NoSecret(provider));
        }
        let value = headers
            .get(self.header.as_str())
            .ok_or_else(|| SignatureError::Missing { provider, header: self.header.clone() })?;
        let signature = value
            .to_str()
            .ok()
            .and_then(|s| base64::decode(s.trim()).ok())
            .ok_or(SignatureError::Malformed(provider))?;
        if verify_hmac(self.secret.reveal(), body, &signature) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch(provider))
        }
    }
}

pub struct WebhookSignatureFactory {
    check: Rc<SignatureCheck>,
}

impl WebhookSignatureFactory {
    pub fn new(provider: Provider, config: &WebhookHmacConfig) -> Self {
        Self { check: Rc::new(SignatureCheck::new(provider, config)) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookSignatureFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureService { check: Rc::clone(&self.check), service: Rc::new(service) }))
    }
}

pub struct WebhookSignatureService<S> {
    check: Rc<SignatureCheck>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let check = Rc::clone(&self.check);
        Box::pin(async move {
            let provider = check.provider();
            if !check.is_enabled() {
                trace!("🔐️ {provider} webhook signature checks are off");
                return service.call(req).await;
            }
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not read the {provider} webhook body. {e}");
                ServerError::CouldNotDeserializePayload(e.to_string())
            })?;
            if let Err(e) = check.verify(req.headers(), &body) {
                warn!("🔐️ Rejecting {provider} webhook. {e}");
                return Err(ServerError::InvalidSignature(e.to_string()).into());
            }
            trace!("🔐️ {provider} webhook signature ✅️");
            req.set_payload(bytes_to_payload(body));
            service.call(req).await
        })
    }
}

/// Puts a body that has already been read back into the request, for the handler.
fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
