use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{PaymentTransaction, Provider, ReferenceType, TransactionStatus},
    events::{EventProducers, PaymentStatusChangedEvent},
    gateways::{GatewayRegistry, GatewayRequest},
    normalizer::StatusMap,
    pay_api::{
        errors::PaymentFlowError,
        payment_objects::{InitiatePaymentRequest, WebhookPayload},
    },
    traits::{InsertTransactionResult, PaymentTransactionStore, StatusUpdate, TransactionQueryFilter},
};

/// `PaymentFlowApi` drives payment transactions through their lifecycle: initiation against a provider, reconciliation
/// of the provider's outcome by polling ([`Self::verify`]) or by webhook ([`Self::handle_webhook`]), and refunds.
///
/// Every status change goes through a conditional write, so concurrent polls and webhooks for the same transaction
/// cannot move it backwards or skip a state.
pub struct PaymentFlowApi<B> {
    db: B,
    gateways: GatewayRegistry,
    status_map: StatusMap,
    producers: EventProducers,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi ({:?})", self.gateways)
    }
}

impl<B: Clone> Clone for PaymentFlowApi<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateways: self.gateways.clone(),
            status_map: self.status_map.clone(),
            producers: self.producers.clone(),
        }
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, gateways: GatewayRegistry, producers: EventProducers) -> Self {
        Self { db, gateways, status_map: StatusMap::default(), producers }
    }

    /// Replaces the default provider vocabularies.
    pub fn with_status_map(mut self, status_map: StatusMap) -> Self {
        self.status_map = status_map;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn gateways(&self) -> &GatewayRegistry {
        &self.gateways
    }
}

impl<B> PaymentFlowApi<B>
where B: PaymentTransactionStore
{
    /// Starts a payment.
    ///
    /// * A request carrying an idempotency key that has been seen before returns the original transaction, and the
    ///   provider is not contacted again.
    /// * Cash and card payments are recorded as `COMPLETED` straight away.
    /// * For everything else, the transaction is stored as `PENDING`, together with the provider reference the request
    ///   will be filed under, *before* the provider is called. There is always a local record of a charge that may
    ///   have gone out, and a way to ask the provider about it. Once the provider accepts the request, the
    ///   transaction moves to `PROCESSING`.
    ///
    /// If the provider call times out the outcome is unknown: the transaction stays `PENDING` with the error recorded,
    /// and a [`PaymentFlowError::Gateway`] error is returned. A later [`Self::verify`], a webhook or the
    /// reconciliation sweep settles it. Any other provider failure marks the transaction `FAILED`.
    pub async fn initiate(&self, request: InitiatePaymentRequest) -> Result<PaymentTransaction, PaymentFlowError> {
        request.validate()?;
        if let Some(key) = request.effective_idempotency_key() {
            if let Some(existing) = self.db.fetch_transaction_by_idempotency_key(key).await? {
                debug!("🔄️💳️ Idempotency key {key} already used by transaction {}. Returning it", existing.id);
                return Ok(existing);
            }
        }
        let tx = match self.db.insert_transaction(request.to_new_transaction()).await? {
            InsertTransactionResult::Inserted(tx) => tx,
            InsertTransactionResult::AlreadyExists(tx) => {
                debug!("🔄️💳️ Lost an idempotency race. Returning transaction {}", tx.id);
                return Ok(tx);
            },
        };
        if tx.status == TransactionStatus::Completed {
            info!("🔄️💳️ {} payment {} of {} recorded as completed", tx.provider, tx.id, tx.amount);
            return Ok(tx);
        }
        let Some(gateway) = self.gateways.get(tx.provider) else {
            let provider = tx.provider;
            warn!("🔄️💳️ No gateway is registered for {provider}. Transaction {} cannot be initiated", tx.id);
            let message = format!("No payment gateway is configured for {provider}");
            self.fail_pending(&tx, "NO_GATEWAY", &message).await?;
            return Err(PaymentFlowError::NoGateway(provider));
        };
        let request = GatewayRequest::from(&tx);
        trace!("🔄️💳️ Initiating {} payment {} for {} as {}", tx.provider, tx.id, tx.amount, request.provider_ref);
        match gateway.initiate(&request).await {
            Ok(response) => {
                if response.provider_ref != request.provider_ref {
                    warn!(
                        "🔄️💳️ {} answered {} with reference {}. Keeping {}",
                        tx.provider, tx.id, response.provider_ref, request.provider_ref
                    );
                }
                match self.transition(&tx, TransactionStatus::Processing, &response.provider_status).await? {
                    Some(accepted) => {
                        info!("🔄️💳️ {} accepted payment {} as {}", tx.provider, tx.id, request.provider_ref);
                        Ok(accepted)
                    },
                    None => {
                        warn!("🔄️💳️ Transaction {} changed while it was being initiated. Returning the latest", tx.id);
                        self.fetch(&tx.id).await
                    },
                }
            },
            Err(e) if e.is_timeout() => {
                warn!(
                    "🔄️💳️ {} timed out initiating {}. The outcome is unknown until {} is reconciled. {e}",
                    tx.provider, tx.id, request.provider_ref
                );
                self.db.record_error(&tx.id, &e.to_string(), false).await?;
                Err(PaymentFlowError::Gateway(e.to_string()))
            },
            Err(e) => {
                warn!("🔄️💳️ {} rejected payment {}. {e}", tx.provider, tx.id);
                self.fail_pending(&tx, "GATEWAY_ERROR", &e.to_string()).await?;
                Err(PaymentFlowError::Gateway(e.to_string()))
            },
        }
    }

    async fn fail_pending(
        &self,
        tx: &PaymentTransaction,
        provider_status: &str,
        error: &str,
    ) -> Result<(), PaymentFlowError> {
        let update = StatusUpdate::new(TransactionStatus::Pending, TransactionStatus::Failed)
            .with_provider_status(provider_status)
            .with_last_error(error);
        match self.db.update_status(&tx.id, update).await? {
            Some(failed) => self.call_status_changed_hook(&failed, tx.status).await,
            None => warn!("🔄️💳️ Transaction {} was no longer pending and could not be marked as failed", tx.id),
        }
        Ok(())
    }

    /// Asks the provider for the current status of a transaction and applies it.
    ///
    /// Transactions in a terminal state are returned as-is without contacting the provider. A provider error leaves the
    /// status untouched, but is recorded and counted as a retry.
    pub async fn verify(&self, id: &str) -> Result<PaymentTransaction, PaymentFlowError> {
        let tx = self.fetch(id).await?;
        if tx.status.is_terminal() {
            trace!("🔄️🔍️ Transaction {id} is already {}. Nothing to verify", tx.status);
            return Ok(tx);
        }
        let provider_ref = tx.provider_ref.clone().ok_or_else(|| {
            PaymentFlowError::InvalidState(format!("Transaction {id} has not been accepted by {} yet", tx.provider))
        })?;
        let gateway = self.gateways.get(tx.provider).ok_or(PaymentFlowError::NoGateway(tx.provider))?;
        match gateway.verify(&provider_ref).await {
            Ok(response) => {
                let target = self.status_map.normalize(tx.provider, &response.provider_status);
                debug!("🔄️🔍️ {} reports {} for {id}, i.e. {target}", tx.provider, response.provider_status);
                self.apply_status(tx, target, &response.provider_status).await
            },
            Err(e) => {
                warn!("🔄️🔍️ Could not verify {id} with {}. {e}", tx.provider);
                self.db.record_error(id, &e.to_string(), true).await?;
                Err(PaymentFlowError::Gateway(e.to_string()))
            },
        }
    }

    /// Reconciles a provider callback with the transaction it refers to.
    ///
    /// The references in the payload are tried in order, first as provider references and then as transaction ids of
    /// the same provider. The raw payload is stored on the matching transaction whether or not it changes the status.
    /// Callbacks that match nothing produce [`PaymentFlowError::NotFound`] and change nothing.
    pub async fn handle_webhook(&self, payload: WebhookPayload) -> Result<PaymentTransaction, PaymentFlowError> {
        let provider = payload.provider;
        let tx = self
            .find_webhook_target(&payload)
            .await?
            .ok_or_else(|| PaymentFlowError::NotFound(format!("{provider} reference {}", payload.external_ref)))?;
        let WebhookPayload { status, raw, .. } = payload;
        let tx = self.db.record_webhook(&tx.id, raw).await?;
        let target = self.status_map.normalize(provider, &status);
        debug!("🔄️🪝️ {provider} webhook for {} reports {status}, i.e. {target}", tx.id);
        self.apply_status(tx, target, &status).await
    }

    async fn find_webhook_target(
        &self,
        payload: &WebhookPayload,
    ) -> Result<Option<PaymentTransaction>, PaymentFlowError> {
        let provider = payload.provider;
        for reference in payload.references().filter(|r| !r.is_empty()) {
            if let Some(tx) = self.db.fetch_transaction_by_provider_ref(provider, reference).await? {
                return Ok(Some(tx));
            }
            if let Some(tx) = self.db.fetch_transaction(reference).await?.filter(|tx| tx.provider == provider) {
                debug!("🔄️🪝️ {provider} webhook matched transaction {reference} by its id");
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }

    /// Moves `tx` towards `target` along the transaction state machine.
    ///
    /// * Already in `target`: only the raw provider status is recorded.
    /// * `target` is one edge away: a conditional status update.
    /// * `PENDING` to `COMPLETED`: two conditional updates, through `PROCESSING`.
    /// * Anything else is ignored. The raw provider status is still recorded on non-terminal transactions.
    ///
    /// Providers are never allowed to produce `REFUNDED` or `CANCELLED` this way. When a conditional write loses to a
    /// concurrent change, the latest state of the transaction is returned.
    async fn apply_status(
        &self,
        tx: PaymentTransaction,
        target: TransactionStatus,
        provider_status: &str,
    ) -> Result<PaymentTransaction, PaymentFlowError> {
        use TransactionStatus::*;
        let current = tx.status;
        if target == current {
            trace!("🔄️ Transaction {} is already {current}", tx.id);
            return self.record_provider_status(&tx, provider_status).await;
        }
        if matches!(target, Refunded | Cancelled) {
            warn!("🔄️ Ignoring a provider report of {target} for transaction {}", tx.id);
            return Ok(tx);
        }
        if current == Pending && target == Completed {
            trace!("🔄️ Transaction {} completed while still pending. Moving it through PROCESSING", tx.id);
            let Some(processing) = self.transition(&tx, Processing, provider_status).await? else {
                return self.fetch(&tx.id).await;
            };
            return match self.transition(&processing, Completed, provider_status).await? {
                Some(completed) => Ok(completed),
                None => self.fetch(&tx.id).await,
            };
        }
        if current.can_transition_to(target) {
            return match self.transition(&tx, target, provider_status).await? {
                Some(updated) => Ok(updated),
                None => self.fetch(&tx.id).await,
            };
        }
        info!("🔄️ Ignoring illegal status change {current} -> {target} for transaction {}", tx.id);
        if current.is_terminal() {
            Ok(tx)
        } else {
            self.record_provider_status(&tx, provider_status).await
        }
    }

    /// Records the raw status as long as `tx` has not changed status in the meantime. Otherwise the latest state wins
    /// and is returned untouched.
    async fn record_provider_status(
        &self,
        tx: &PaymentTransaction,
        provider_status: &str,
    ) -> Result<PaymentTransaction, PaymentFlowError> {
        match self.db.record_provider_status(&tx.id, tx.status, provider_status).await? {
            Some(updated) => Ok(updated),
            None => {
                debug!("🔄️ Transaction {} left {} concurrently. {provider_status} not recorded", tx.id, tx.status);
                self.fetch(&tx.id).await
            },
        }
    }

    async fn transition(
        &self,
        tx: &PaymentTransaction,
        target: TransactionStatus,
        provider_status: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentFlowError> {
        let update = StatusUpdate::new(tx.status, target).with_provider_status(provider_status);
        let result = self.db.update_status(&tx.id, update).await?;
        match &result {
            Some(updated) => {
                info!("🔄️ Transaction {} moved from {} to {target}", tx.id, tx.status);
                self.call_status_changed_hook(updated, tx.status).await;
            },
            None => debug!("🔄️ Transaction {} was modified concurrently. {} -> {target} not applied", tx.id, tx.status),
        }
        Ok(result)
    }

    /// Refunds a completed transaction in full. The transaction itself moves to `REFUNDED`.
    ///
    /// Cash payments are refunded locally. All other providers must accept the refund first; if they don't, the
    /// transaction stays `COMPLETED`.
    pub async fn refund(&self, id: &str) -> Result<PaymentTransaction, PaymentFlowError> {
        let tx = self.fetch(id).await?;
        if tx.status != TransactionStatus::Completed {
            return Err(PaymentFlowError::InvalidState(format!(
                "Only completed transactions can be refunded. Transaction {id} is {}",
                tx.status
            )));
        }
        let provider_status = if tx.provider == Provider::Cash {
            debug!("🔄️💸️ Refunding cash transaction {id} locally");
            "REFUNDED".to_string()
        } else {
            let gateway = self.gateways.get(tx.provider).ok_or(PaymentFlowError::NoGateway(tx.provider))?;
            let provider_ref = tx.provider_ref.as_deref().ok_or_else(|| {
                PaymentFlowError::InvalidState(format!("Transaction {id} has no {} reference", tx.provider))
            })?;
            match gateway.refund(provider_ref, tx.amount).await {
                Ok(response) => {
                    debug!("🔄️💸️ {} accepted the refund of {id}: {}", tx.provider, response.message);
                    response.provider_status
                },
                Err(e) => {
                    warn!("🔄️💸️ {} refused the refund of {id}. {e}", tx.provider);
                    self.db.record_error(id, &e.to_string(), false).await?;
                    return Err(PaymentFlowError::Gateway(e.to_string()));
                },
            }
        };
        match self.transition(&tx, TransactionStatus::Refunded, &provider_status).await? {
            Some(refunded) => Ok(refunded),
            None => {
                error!("🔄️💸️ Transaction {id} changed while being refunded. The provider may have refunded it anyway");
                Err(PaymentFlowError::Conflict(format!("Transaction {id} was modified during the refund")))
            },
        }
    }

    pub async fn fetch(&self, id: &str) -> Result<PaymentTransaction, PaymentFlowError> {
        self.db.fetch_transaction(id).await?.ok_or_else(|| PaymentFlowError::NotFound(id.to_string()))
    }

    /// All transactions for a business reference, newest first.
    pub async fn list_by_reference(
        &self,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> Result<Vec<PaymentTransaction>, PaymentFlowError> {
        let filter = TransactionQueryFilter::default().with_reference(reference_type, reference_id.to_string());
        let result = self.db.search_transactions(filter).await?;
        Ok(result)
    }

    /// All transactions for a vendor, newest first.
    pub async fn list_by_vendor(&self, vendor_id: &str) -> Result<Vec<PaymentTransaction>, PaymentFlowError> {
        let filter = TransactionQueryFilter::default().with_vendor_id(vendor_id.to_string());
        let result = self.db.search_transactions(filter).await?;
        Ok(result)
    }

    /// Transactions that are still waiting on their provider and have not changed for at least `age`. These are the
    /// candidates for a reconciliation poll. Transactions whose polls have already failed `max_retries` times are
    /// skipped; they keep their status until a webhook or a manual verify settles them.
    pub async fn fetch_stale_transactions(
        &self,
        age: Duration,
        max_retries: i64,
        limit: i64,
    ) -> Result<Vec<PaymentTransaction>, PaymentFlowError> {
        let result = self.db.fetch_stale_transactions(age, max_retries, limit).await?;
        Ok(result)
    }

    async fn call_status_changed_hook(&self, tx: &PaymentTransaction, old_status: TransactionStatus) {
        for emitter in &self.producers.status_changed_producer {
            debug!("🔄️ Notifying status change hook subscribers");
            let event = PaymentStatusChangedEvent::new(tx.clone(), old_status);
            emitter.publish_event(event).await;
        }
    }
}
