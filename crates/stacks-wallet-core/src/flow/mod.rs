pub mod auth;
pub mod transaction;

use kit::constants::HIGH_FEE_AMOUNT_USTX;
use kit::types::request::DecodedRequest;

use crate::finalizer::FinalizeError;
use crate::state::storage::StorageConfig;
use crate::state::StateError;

pub use auth::{AuthenticationFlow, StorageChoice};
pub use transaction::TransactionFlow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum FlowRoute {
    ChooseStorage,
    ChooseAccount,
    SendForm,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    StorageSubmitted,
    /// Fee of the submitted form, in micro-stacks.
    FormSubmitted { fee: u64 },
    HighFeeAccepted,
    HighFeeDismissed,
    EditNonceOpened,
    EditNonceClosed,
    ConfirmClosed,
    Finalize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("the request was already answered")]
    AlreadyFinalized,
    #[error("'{event:?}' is not expected while on {route}")]
    UnexpectedEvent { route: FlowRoute, event: FlowEvent },
    #[error("no request is being served")]
    MissingRequest,
    #[error("no wallet is unlocked")]
    MissingWallet,
    #[error("account {0} does not exist")]
    MissingAccount(u32),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} is already in progress")]
    Busy(&'static str),
    #[error("{0}")]
    Service(String),
    #[error(transparent)]
    Finalize(#[from] FinalizeError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Drawers layered over the send form. The confirm drawer stays mounted while another
/// drawer covers it, so its values survive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawerState {
    pub confirm: bool,
    pub edit_nonce: bool,
    pub high_fee: bool,
}

impl DrawerState {
    pub fn confirm_visible(&self) -> bool {
        self.confirm && !self.edit_nonce && !self.high_fee
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRouter {
    route: FlowRoute,
    drawers: DrawerState,
    high_fee_threshold: u64,
}

impl FlowRouter {
    pub fn entry(request: &DecodedRequest, storage_config: &StorageConfig) -> Self {
        let route = match request {
            DecodedRequest::Authentication(auth)
                if auth.enable_gaia_selection && !storage_config.is_configured() =>
            {
                FlowRoute::ChooseStorage
            }
            DecodedRequest::Authentication(_) => FlowRoute::ChooseAccount,
            DecodedRequest::Transaction(_) => FlowRoute::SendForm,
        };
        Self { route, drawers: DrawerState::default(), high_fee_threshold: HIGH_FEE_AMOUNT_USTX }
    }

    pub fn with_high_fee_threshold(mut self, threshold: u64) -> Self {
        self.high_fee_threshold = threshold;
        self
    }

    pub fn route(&self) -> FlowRoute {
        self.route
    }

    pub fn drawers(&self) -> DrawerState {
        self.drawers
    }

    pub fn is_finalized(&self) -> bool {
        self.route == FlowRoute::Finalized
    }

    /// Sends the user back to storage selection when they reach account selection for a
    /// gaia-selecting request before any endpoint was stored.
    pub fn guard_choose_account(
        &mut self,
        request: &DecodedRequest,
        storage_config: &StorageConfig,
    ) -> FlowRoute {
        if self.route == FlowRoute::ChooseAccount
            && request.enables_gaia_selection()
            && !storage_config.is_configured()
        {
            self.route = FlowRoute::ChooseStorage;
        }
        self.route
    }

    pub fn apply(&mut self, event: FlowEvent) -> Result<FlowRoute, FlowError> {
        use FlowEvent::*;

        let unexpected = FlowError::UnexpectedEvent { route: self.route, event };
        match (self.route, event) {
            (FlowRoute::Finalized, _) => return Err(FlowError::AlreadyFinalized),
            (_, Finalize) => {
                self.drawers = DrawerState::default();
                self.route = FlowRoute::Finalized;
            }
            (FlowRoute::ChooseStorage, StorageSubmitted) => self.route = FlowRoute::ChooseAccount,
            (FlowRoute::SendForm, FormSubmitted { fee }) => {
                if fee > self.high_fee_threshold {
                    self.drawers.high_fee = true;
                } else {
                    self.drawers.confirm = true;
                }
            }
            (FlowRoute::SendForm, HighFeeAccepted) if self.drawers.high_fee => {
                self.drawers.high_fee = false;
                self.drawers.confirm = true;
            }
            (FlowRoute::SendForm, HighFeeDismissed) => self.drawers.high_fee = false,
            (FlowRoute::SendForm, EditNonceOpened) => self.drawers.edit_nonce = true,
            (FlowRoute::SendForm, EditNonceClosed) => self.drawers.edit_nonce = false,
            (FlowRoute::SendForm, ConfirmClosed) => {
                self.drawers.confirm = false;
                self.drawers.edit_nonce = false;
            }
            _ => return Err(unexpected),
        }
        Ok(self.route)
    }
}

#[cfg(test)]
mod tests {
    use kit::serde_json::{self, json};
    use kit::types::request::DecodedRequest;
    use test_case::test_case;

    use super::*;

    fn auth(enable_gaia_selection: bool) -> DecodedRequest {
        DecodedRequest::Authentication(
            serde_json::from_value(json!({
                "redirect_uri": "https://app.example.com",
                "public_keys": ["02aa"],
                "enableGaiaSelection": enable_gaia_selection,
            }))
            .unwrap(),
        )
    }

    fn transaction() -> DecodedRequest {
        DecodedRequest::Transaction(
            serde_json::from_value(json!({
                "txType": "token_transfer",
                "recipient": "ST2PHCPANVT8DVPSY5W2ZZ81M285Q5Z8Y6DQMZE7Z",
                "amount": "100",
            }))
            .unwrap(),
        )
    }

    #[test_case(auth(true), StorageConfig::default(), FlowRoute::ChooseStorage ; "gaia selection without endpoint")]
    #[test_case(auth(true), StorageConfig::with_hub("https://hub.me"), FlowRoute::ChooseAccount ; "gaia selection with endpoint")]
    #[test_case(auth(false), StorageConfig::default(), FlowRoute::ChooseAccount ; "plain auth")]
    #[test_case(transaction(), StorageConfig::default(), FlowRoute::SendForm ; "transaction")]
    fn picks_entry_route(request: DecodedRequest, config: StorageConfig, expected: FlowRoute) {
        assert_eq!(FlowRouter::entry(&request, &config).route(), expected);
    }

    #[test]
    fn storage_then_account() {
        let request = auth(true);
        let mut router = FlowRouter::entry(&request, &StorageConfig::default());
        assert_eq!(router.apply(FlowEvent::StorageSubmitted), Ok(FlowRoute::ChooseAccount));
        assert_eq!(
            router.guard_choose_account(&request, &StorageConfig::default()),
            FlowRoute::ChooseStorage
        );
        router.apply(FlowEvent::StorageSubmitted).unwrap();
        assert_eq!(
            router.guard_choose_account(&request, &StorageConfig::with_hub("https://hub.me")),
            FlowRoute::ChooseAccount
        );
    }

    #[test]
    fn edit_nonce_hides_confirm_without_closing_it() {
        let mut router = FlowRouter::entry(&transaction(), &StorageConfig::default());
        router.apply(FlowEvent::FormSubmitted { fee: 180 }).unwrap();
        assert!(router.drawers().confirm_visible());

        router.apply(FlowEvent::EditNonceOpened).unwrap();
        assert!(router.drawers().confirm);
        assert!(!router.drawers().confirm_visible());

        router.apply(FlowEvent::EditNonceClosed).unwrap();
        assert!(router.drawers().confirm_visible());
    }

    #[test]
    fn high_fee_requires_acknowledgement() {
        let mut router = FlowRouter::entry(&transaction(), &StorageConfig::default());
        router.apply(FlowEvent::FormSubmitted { fee: HIGH_FEE_AMOUNT_USTX + 1 }).unwrap();
        assert!(router.drawers().high_fee);
        assert!(!router.drawers().confirm_visible());
        router.apply(FlowEvent::HighFeeAccepted).unwrap();
        assert_eq!(router.drawers(), DrawerState { confirm: true, edit_nonce: false, high_fee: false });
    }

    #[test]
    fn finalized_is_terminal() {
        let mut router = FlowRouter::entry(&auth(false), &StorageConfig::default());
        assert_eq!(router.apply(FlowEvent::Finalize), Ok(FlowRoute::Finalized));
        assert_eq!(router.apply(FlowEvent::StorageSubmitted), Err(FlowError::AlreadyFinalized));
        assert_eq!(router.apply(FlowEvent::Finalize), Err(FlowError::AlreadyFinalized));
        assert_eq!(router.route(), FlowRoute::Finalized);
    }

    #[test]
    fn rejects_events_outside_their_route() {
        let mut router = FlowRouter::entry(&auth(false), &StorageConfig::default());
        assert!(matches!(
            router.apply(FlowEvent::EditNonceOpened),
            Err(FlowError::UnexpectedEvent { .. })
        ));
    }
}
