use std::collections::HashSet;
use std::sync::Arc;

use kit::constants::CANCELLED_RESPONSE;
use kit::services::MessageChannel;
use kit::types::message::{ExtensionMessage, TransactionResponse};
use kit::types::request::DecodedAuthRequest;

use crate::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Sent,
    AlreadyFinalized,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FinalizeError {
    #[error("redirect uri '{0}' is not an http(s) url")]
    MalformedRedirectUri(String),
    #[error("unable to deliver response: {0}")]
    Delivery(String),
}

/// Relays the single response a request token gets. Later attempts for the same token
/// are no-ops.
#[derive(Debug)]
pub struct ResponseFinalizer {
    ctx: Context,
    channel: Arc<dyn MessageChannel>,
    finalized: HashSet<String>,
}

impl ResponseFinalizer {
    pub fn new(ctx: &Context, channel: Arc<dyn MessageChannel>) -> Self {
        Self { ctx: ctx.clone(), channel, finalized: HashSet::new() }
    }

    pub fn is_finalized(&self, request_token: &str) -> bool {
        self.finalized.contains(request_token)
    }

    pub fn finalize_auth(
        &mut self,
        request_token: &str,
        decoded: &DecodedAuthRequest,
        auth_response: &str,
    ) -> Result<FinalizeOutcome, FinalizeError> {
        if self.is_finalized(request_token) {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }
        match decoded.redirect_url() {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(FinalizeError::MalformedRedirectUri(decoded.redirect_uri.clone())),
        }

        let message = ExtensionMessage::authentication_response(request_token, auth_response);
        self.deliver(request_token, message)
    }

    pub fn finalize_transaction(
        &mut self,
        request_token: &str,
        response: TransactionResponse,
    ) -> Result<FinalizeOutcome, FinalizeError> {
        if self.is_finalized(request_token) {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }
        let message = ExtensionMessage::transaction_response(request_token, response);
        self.deliver(request_token, message)
    }

    /// Tells the requesting app the user walked away. The redirect uri plays no part here.
    pub fn cancel_auth(&mut self, request_token: &str) -> Result<FinalizeOutcome, FinalizeError> {
        if self.is_finalized(request_token) {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }
        let message = ExtensionMessage::authentication_response(request_token, CANCELLED_RESPONSE);
        self.deliver(request_token, message)
    }

    pub fn cancel_transaction(
        &mut self,
        request_token: &str,
    ) -> Result<FinalizeOutcome, FinalizeError> {
        self.finalize_transaction(request_token, TransactionResponse::cancelled())
    }

    fn deliver(
        &mut self,
        request_token: &str,
        message: ExtensionMessage,
    ) -> Result<FinalizeOutcome, FinalizeError> {
        let method = message.method();
        self.channel.send(message).map_err(|e| {
            self.ctx.try_log(|logger| error!(logger, "Unable to relay {}: {}", method, e));
            FinalizeError::Delivery(e)
        })?;
        self.ctx.try_log(|logger| info!(logger, "Relayed {} to requesting app", method));
        self.finalized.insert(request_token.to_string());
        Ok(FinalizeOutcome::Sent)
    }
}
