use kit::services::ServiceContext;
use kit::types::message::{TransactionResponse, TxResult};
use kit::types::notification::Notification;
use kit::types::request::{DecodedTransactionRequest, TokenTransferRequest, TransactionRequestKind};
use kit::types::wallet::{BroadcastOutcome, TransactionDraft};

use crate::finalizer::{FinalizeOutcome, ResponseFinalizer};
use crate::settings::WalletSettings;
use crate::state::{AppState, LoadingKey};
use crate::validation::form::{
    format_ustx, parse_nonce, validate_transaction_form, FormContext, ValidatedForm,
};
use crate::validation::{FieldErrors, TransactionFormValues};
use crate::Context;

use super::{DrawerState, FlowError, FlowEvent, FlowRoute, FlowRouter};

const BROADCAST_FAILED: &str = "Unable to broadcast transaction";
const RESULT_NOT_DELIVERED: &str = "The app could not be notified of the transaction";

/// Review, signature and broadcast of a transaction requested by an app.
#[derive(Debug)]
pub struct TransactionFlow {
    ctx: Context,
    services: ServiceContext,
    router: FlowRouter,
    finalizer: ResponseFinalizer,
    token: String,
    request: DecodedTransactionRequest,
    form: TransactionFormValues,
    field_errors: FieldErrors,
    validated: Option<ValidatedForm>,
    /// Result of a signed (and broadcast) transaction the app has not received yet.
    undelivered: Option<TxResult>,
}

impl TransactionFlow {
    pub fn start(
        state: &AppState,
        services: ServiceContext,
        settings: &WalletSettings,
    ) -> Result<Self, FlowError> {
        let pending = state.pending_request().ok_or(FlowError::MissingRequest)?;
        let request = pending.request.as_transaction().ok_or(FlowError::MissingRequest)?;
        let router = FlowRouter::entry(&pending.request, state.storage_config())
            .with_high_fee_threshold(settings.high_fee_threshold_ustx);
        let ctx = state.ctx().clone();
        ctx.try_log(|logger| {
            info!(logger, "Serving {} transaction request", request.kind.tx_type())
        });

        Ok(Self {
            finalizer: ResponseFinalizer::new(&ctx, services.channel.clone()),
            form: initial_form_values(state, request)?,
            token: pending.token.clone(),
            request: request.clone(),
            field_errors: FieldErrors::new(),
            validated: None,
            undelivered: None,
            router,
            services,
            ctx,
        })
    }

    pub fn route(&self) -> FlowRoute {
        self.router.route()
    }

    pub fn drawers(&self) -> DrawerState {
        self.router.drawers()
    }

    pub fn form(&self) -> &TransactionFormValues {
        &self.form
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    /// Validates `values` and, when they hold, opens the confirm drawer (or the high fee
    /// warning first). Invalid values only populate [Self::field_errors].
    pub fn submit_form(
        &mut self,
        state: &AppState,
        values: TransactionFormValues,
    ) -> Result<DrawerState, FlowError> {
        self.ensure_active()?;
        let network = state.network_for(Some(&self.request))?;
        let sender = state.current_account().map(|a| a.stx_address.clone());
        let available_balance =
            sender.as_deref().and_then(|address| state.available_balance(address, &network.url));
        let ctx = FormContext {
            network: &network,
            sender_address: sender.as_deref(),
            available_balance,
            is_token_transfer: self.request.kind.as_token_transfer().is_some(),
        };

        let result = validate_transaction_form(&values, ctx);
        self.form = values;
        match result {
            Ok(validated) => {
                self.field_errors = FieldErrors::new();
                let fee = validated.fee;
                self.validated = Some(validated);
                self.router.apply(FlowEvent::FormSubmitted { fee })?;
            }
            Err(errors) => {
                self.field_errors = errors;
                self.validated = None;
            }
        }
        Ok(self.router.drawers())
    }

    pub fn accept_high_fee(&mut self) -> Result<DrawerState, FlowError> {
        self.router.apply(FlowEvent::HighFeeAccepted)?;
        Ok(self.router.drawers())
    }

    pub fn dismiss_high_fee(&mut self) -> Result<DrawerState, FlowError> {
        self.router.apply(FlowEvent::HighFeeDismissed)?;
        Ok(self.router.drawers())
    }

    pub fn open_edit_nonce(&mut self) -> Result<DrawerState, FlowError> {
        self.router.apply(FlowEvent::EditNonceOpened)?;
        Ok(self.router.drawers())
    }

    pub fn close_edit_nonce(&mut self) -> Result<DrawerState, FlowError> {
        self.router.apply(FlowEvent::EditNonceClosed)?;
        Ok(self.router.drawers())
    }

    /// Replaces the nonce of the reviewed transaction and returns to the confirm drawer.
    pub fn apply_nonce(
        &mut self,
        state: &mut AppState,
        nonce: &str,
    ) -> Result<DrawerState, FlowError> {
        self.ensure_active()?;
        if !state.begin_loading(LoadingKey::EditNonceDrawer) {
            return Err(FlowError::Busy("nonce edition"));
        }
        let result = match parse_nonce(nonce) {
            Ok(value) => {
                self.form.nonce = value.to_string();
                if let Some(validated) = self.validated.as_mut() {
                    validated.nonce = value;
                }
                self.router.apply(FlowEvent::EditNonceClosed).map(|_| self.router.drawers())
            }
            Err(message) => {
                self.field_errors.insert("nonce", message);
                Ok(self.router.drawers())
            }
        };
        state.finish_loading(LoadingKey::EditNonceDrawer);
        result
    }

    pub fn close_confirm(&mut self) -> Result<DrawerState, FlowError> {
        self.router.apply(FlowEvent::ConfirmClosed)?;
        Ok(self.router.drawers())
    }

    /// Signs and broadcasts the reviewed transaction, then relays its result to the app.
    /// Failures leave the confirm drawer open with a notification. When only the relay
    /// failed, calling again re-delivers the same result without broadcasting twice.
    pub async fn broadcast(&mut self, state: &mut AppState) -> Result<FlowRoute, FlowError> {
        self.ensure_active()?;
        if !self.router.drawers().confirm_visible() {
            return Err(FlowError::InvalidInput("the transaction was not reviewed".into()));
        }
        if !state.begin_loading(LoadingKey::ConfirmDrawer) {
            return Err(FlowError::Busy("broadcast"));
        }
        let result = match self.undelivered.clone() {
            Some(tx_result) => self.deliver(state, tx_result),
            None => self.broadcast_inner(state).await,
        };
        state.clear_fee_estimations();
        state.finish_loading(LoadingKey::ConfirmDrawer);
        result
    }

    async fn broadcast_inner(&mut self, state: &mut AppState) -> Result<FlowRoute, FlowError> {
        let Some(validated) = self.validated.clone() else {
            let err = FlowError::InvalidInput("Cannot broadcast transaction, no tx in state".into());
            return Err(self.abort(state, err));
        };
        let Some(account) = state.current_account().cloned() else {
            let err = FlowError::InvalidInput("Cannot sign transaction, no account in state".into());
            return Err(self.abort(state, err));
        };

        let network = match state.network_for(Some(&self.request)) {
            Ok(network) => network,
            Err(e) => return Err(self.abort(state, e.into())),
        };
        let draft = TransactionDraft {
            kind: draft_kind(&self.request, &validated),
            fee: validated.fee,
            nonce: validated.nonce,
            network: network.clone(),
            sponsored: self.request.sponsored,
        };
        let Some(signed) = self.services.signer.sign_transaction(&draft, &account) else {
            let err = FlowError::Service("Cannot sign transaction, no account in state".into());
            return Err(self.abort(state, err));
        };

        let tx_result = if signed.sponsored {
            signed.to_tx_result(None)
        } else {
            match self.services.broadcaster.broadcast(&signed, &network).await {
                Ok(BroadcastOutcome::Accepted { tx_id }) => {
                    self.ensure_active()?;
                    state.set_latest_nonce(&account.stx_address, &network.url, validated.nonce);
                    self.ctx.try_log(|logger| info!(logger, "Broadcasted transaction {}", tx_id));
                    signed.to_tx_result(Some(&tx_id))
                }
                Ok(BroadcastOutcome::Rejected { reason }) => {
                    return Err(self.abort(state, FlowError::Service(reason)));
                }
                Err(e) => return Err(self.abort(state, FlowError::Service(e))),
            }
        };

        self.undelivered = Some(tx_result.clone());
        self.deliver(state, tx_result)
    }

    fn deliver(
        &mut self,
        state: &mut AppState,
        tx_result: TxResult,
    ) -> Result<FlowRoute, FlowError> {
        let response = TransactionResponse::Result(tx_result);
        if let Err(e) = self.finalizer.finalize_transaction(&self.token, response) {
            self.ctx.try_log(|logger| error!(logger, "{}", e));
            state.notify(Notification::error(RESULT_NOT_DELIVERED));
            return Err(e.into());
        }
        self.undelivered = None;
        self.router.apply(FlowEvent::ConfirmClosed)?;
        state.notify(Notification::success("Transaction submitted"));
        state.clear_pending_request_for(&self.token);
        self.router.apply(FlowEvent::Finalize)
    }

    /// Walks away from the request. A transaction already broadcast is reported instead of
    /// a cancellation.
    pub fn cancel(&mut self, state: &mut AppState) -> Result<FinalizeOutcome, FlowError> {
        self.ensure_active()?;
        let outcome = match self.undelivered.take() {
            Some(tx_result) => self
                .finalizer
                .finalize_transaction(&self.token, TransactionResponse::Result(tx_result)),
            None => self.finalizer.cancel_transaction(&self.token),
        };
        if let Err(e) = &outcome {
            self.ctx.try_log(|logger| warn!(logger, "Response not delivered: {}", e));
        }
        state.clear_pending_request_for(&self.token);
        self.router.apply(FlowEvent::Finalize)?;
        Ok(outcome?)
    }

    pub fn abandon(&mut self, state: &mut AppState) {
        if self.router.is_finalized() {
            return;
        }
        let _ = self.cancel(state);
    }

    fn ensure_active(&self) -> Result<(), FlowError> {
        if self.router.is_finalized() {
            return Err(FlowError::AlreadyFinalized);
        }
        Ok(())
    }

    fn abort(&self, state: &mut AppState, err: FlowError) -> FlowError {
        self.ctx.try_log(|logger| error!(logger, "{}", err));
        state.notify(Notification::error(BROADCAST_FAILED));
        err
    }
}

fn initial_form_values(
    state: &AppState,
    request: &DecodedTransactionRequest,
) -> Result<TransactionFormValues, FlowError> {
    let network = state.network_for(Some(request))?;
    let nonce = state
        .current_account()
        .and_then(|account| state.next_nonce(&account.stx_address, &network.url))
        .unwrap_or(0);
    let fee = state
        .fee_estimations()
        .get(1)
        .or_else(|| state.fee_estimations().first())
        .map(|estimation| format_ustx(estimation.fee))
        .unwrap_or_default();

    let mut values = TransactionFormValues { fee, nonce: nonce.to_string(), ..Default::default() };
    if let Some(transfer) = request.kind.as_token_transfer() {
        values.amount = format_ustx(transfer.amount);
        values.recipient = transfer.recipient.clone();
        values.memo = transfer.memo.clone().unwrap_or_default();
    }
    Ok(values)
}

/// Token transfers go out with the values the user reviewed; other kinds as requested.
fn draft_kind(request: &DecodedTransactionRequest, validated: &ValidatedForm) -> TransactionRequestKind {
    match (&request.kind, &validated.recipient, validated.amount) {
        (TransactionRequestKind::TokenTransfer(_), Some(recipient), Some(amount)) => {
            TransactionRequestKind::TokenTransfer(TokenTransferRequest {
                recipient: recipient.clone(),
                amount,
                memo: validated.memo.clone(),
            })
        }
        (kind, _, _) => kind.clone(),
    }
}
