//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the payment engine (database and provider
//! calls), so none of them block.
//!
//! Routes:
//! * `GET /health`
//! * `POST /payments`. Initiates a payment. An `Idempotency-Key` header overrides the key in the body.
//! * `GET /payments/{id}`
//! * `POST /payments/{id}/verify`. Polls the provider for the current status.
//! * `POST /payments/{id}/refund`
//! * `GET /payments/reference/{ref_type}/{ref_id}`
//! * `GET /payments/vendor/{vendor_id}`
//! * `POST /webhooks/mtn-momo` and `POST /webhooks/airtel-money`. Provider callbacks. These are always acknowledged
//!   with a 200 unless the body is not valid JSON, including callbacks that match no transaction or that are not in a
//!   shape we recognise.
//!
//! All routes except `/health` are mounted under `/api/v1` by the server.
use std::str::FromStr;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use mobile_money_tools::data_objects::{AirtelMoneyCallback, MtnMomoCallback};
use mpg_engine::{
    db_types::{Provider, ReferenceType},
    InitiatePaymentRequest,
    PaymentFlowApi,
    PaymentFlowError,
    PaymentTransactionStore,
    WebhookPayload,
};
use serde_json::Value;

use crate::{data_objects::WebhookAck, errors::ServerError, helpers::idempotency_key_from_headers};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initiate_payment => Post "/payments" impl PaymentTransactionStore);
/// Starts a payment and responds with `201 Created` and the transaction.
///
/// Clients should send an `Idempotency-Key` header (or `idempotency_key` in the body) and reuse it when retrying. A
/// retried request then returns the original transaction instead of charging the payer twice.
///
/// Mobile money payments usually come back as `PROCESSING`: the payer still has to approve the debit on their handset.
/// Cash and card payments come back as `COMPLETED`.
pub async fn initiate_payment<B: PaymentTransactionStore>(
    req: HttpRequest,
    body: web::Json<InitiatePaymentRequest>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let mut request = body.into_inner();
    if let Some(key) = idempotency_key_from_headers(&req) {
        trace!("💻️ Using the idempotency key from the request header");
        request.idempotency_key = Some(key);
    }
    debug!(
        "💻️ POST payment for {}:{} of {} via {}",
        request.reference_type, request.reference_id, request.amount, request.provider
    );
    let tx = api.initiate(request).await.map_err(|e| {
        debug!("💻️ Payment could not be initiated. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(tx))
}

route!(payment_by_id => Get "/payments/{id}" impl PaymentTransactionStore);
pub async fn payment_by_id<B: PaymentTransactionStore>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET payment {id}");
    let tx = api.fetch(&id).await?;
    Ok(HttpResponse::Ok().json(tx))
}

route!(verify_payment => Post "/payments/{id}/verify" impl PaymentTransactionStore);
/// Asks the provider for the latest status of the payment and applies it. Settled payments are returned as they are.
pub async fn verify_payment<B: PaymentTransactionStore>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST verify payment {id}");
    let tx = api.verify(&id).await?;
    Ok(HttpResponse::Ok().json(tx))
}

route!(refund_payment => Post "/payments/{id}/refund" impl PaymentTransactionStore);
pub async fn refund_payment<B: PaymentTransactionStore>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ POST refund payment {id}");
    let tx = api.refund(&id).await.map_err(|e| {
        warn!("💻️ Refund of {id} failed. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(tx))
}

route!(payments_for_reference => Get "/payments/reference/{ref_type}/{ref_id}" impl PaymentTransactionStore);
/// All payment attempts for an order, invoice or subscription, newest first. `ref_type` is case-insensitive.
pub async fn payments_for_reference<B: PaymentTransactionStore>(
    path: web::Path<(String, String)>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (ref_type, ref_id) = path.into_inner();
    let reference_type =
        ReferenceType::from_str(&ref_type).map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    debug!("💻️ GET payments for {reference_type}:{ref_id}");
    let txs = api.list_by_reference(reference_type, &ref_id).await?;
    Ok(HttpResponse::Ok().json(txs))
}

route!(payments_for_vendor => Get "/payments/vendor/{vendor_id}" impl PaymentTransactionStore);
pub async fn payments_for_vendor<B: PaymentTransactionStore>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let vendor_id = path.into_inner();
    debug!("💻️ GET payments for vendor {vendor_id}");
    let txs = api.list_by_vendor(&vendor_id).await?;
    Ok(HttpResponse::Ok().json(txs))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(mtn_momo_webhook => Post "" impl PaymentTransactionStore);
/// Handles MTN MoMo request-to-pay callbacks. Mounted at `/webhooks/mtn-momo`.
pub async fn mtn_momo_webhook<B: PaymentTransactionStore>(
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("🪝️ Received MTN MoMo webhook");
    let raw = parse_json(&body)?;
    let callback = match serde_json::from_value::<MtnMomoCallback>(raw.clone()) {
        Ok(callback) => callback,
        Err(e) => return Ok(unrecognised_callback(Provider::MtnMomo, e, &raw)),
    };
    let ack = match callback.references().split_first() {
        Some((reference, alternatives)) => {
            let payload = WebhookPayload::new(Provider::MtnMomo, *reference, callback.status(), raw)
                .with_alternative_refs(alternatives.iter().copied());
            reconcile(payload, api.as_ref()).await
        },
        None => {
            warn!("🪝️ MTN MoMo webhook did not contain a reference. {raw}");
            WebhookAck::ignored("The callback does not identify a transaction")
        },
    };
    Ok(HttpResponse::Ok().json(ack))
}

route!(airtel_money_webhook => Post "" impl PaymentTransactionStore);
/// Handles Airtel Money payment callbacks, whether wrapped in a `transaction` object or not. Mounted at
/// `/webhooks/airtel-money`.
pub async fn airtel_money_webhook<B: PaymentTransactionStore>(
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("🪝️ Received Airtel Money webhook");
    let raw = parse_json(&body)?;
    let callback = match serde_json::from_value::<AirtelMoneyCallback>(raw.clone()) {
        Ok(callback) => callback,
        Err(e) => return Ok(unrecognised_callback(Provider::AirtelMoney, e, &raw)),
    };
    let transaction = callback.transaction();
    let ack = match transaction.provider_ref() {
        Some(reference) => {
            let status = transaction.status().unwrap_or_default();
            let payload = WebhookPayload::new(Provider::AirtelMoney, reference, status, raw);
            reconcile(payload, api.as_ref()).await
        },
        None => {
            warn!("🪝️ Airtel Money webhook did not contain a transaction id. {raw}");
            WebhookAck::ignored("The callback does not identify a transaction")
        },
    };
    Ok(HttpResponse::Ok().json(ack))
}

/// Only a body that is not JSON at all is rejected.
fn parse_json(body: &[u8]) -> Result<Value, ServerError> {
    serde_json::from_slice::<Value>(body).map_err(|e| {
        warn!("🪝️ Webhook body is not valid JSON. {e}");
        ServerError::CouldNotDeserializePayload(e.to_string())
    })
}

/// Valid JSON in a shape we don't know is still acknowledged, or the provider would redeliver it forever.
fn unrecognised_callback(provider: Provider, e: serde_json::Error, raw: &Value) -> HttpResponse {
    warn!("🪝️ Ignoring {provider} webhook in an unrecognised shape. {e}. {raw}");
    HttpResponse::Ok().json(WebhookAck::ignored(format!("Unrecognised {provider} callback. {e}")))
}

async fn reconcile<B: PaymentTransactionStore>(payload: WebhookPayload, api: &PaymentFlowApi<B>) -> WebhookAck {
    let provider = payload.provider;
    let reference = payload.external_ref.clone();
    match api.handle_webhook(payload).await {
        Ok(tx) => {
            info!("🪝️ {provider} webhook for {reference} processed. Transaction {} is {}", tx.id, tx.status);
            WebhookAck::processed(tx.id)
        },
        Err(PaymentFlowError::NotFound(_)) => {
            info!("🪝️ {provider} webhook for unknown reference {reference} ignored");
            WebhookAck::ignored(format!("No {provider} transaction with reference {reference}"))
        },
        Err(e) => {
            warn!("🪝️ {provider} webhook for {reference} could not be processed. {e}");
            WebhookAck::ignored(e)
        },
    }
}
