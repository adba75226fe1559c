use kit::services::ServiceContext;
use kit::types::notification::Notification;
use kit::types::wallet::{AppEntry, AuthResponseParams};

use crate::finalizer::{FinalizeOutcome, ResponseFinalizer};
use crate::settings::WalletSettings;
use crate::state::storage::StorageConfig;
use crate::state::{AppState, LoadingKey, PendingRequest};
use crate::validation::{validate_hub_url, HubUrlField};
use crate::Context;

use super::{FlowError, FlowEvent, FlowRoute, FlowRouter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageChoice {
    Default,
    Custom(String),
}

/// Sign-in of the user into a requesting app, from storage selection to the relayed
/// authentication response.
#[derive(Debug)]
pub struct AuthenticationFlow {
    ctx: Context,
    services: ServiceContext,
    router: FlowRouter,
    finalizer: ResponseFinalizer,
    hub_url_field: HubUrlField,
    default_hub_url: String,
    pending: PendingRequest,
}

impl AuthenticationFlow {
    /// Starts serving the pending authentication request. The debounced hub field needs a
    /// tokio runtime once it receives input.
    pub fn start(
        state: &AppState,
        services: ServiceContext,
        settings: &WalletSettings,
    ) -> Result<Self, FlowError> {
        let pending = state.pending_request().ok_or(FlowError::MissingRequest)?;
        if pending.request.as_authentication().is_none() {
            return Err(FlowError::MissingRequest);
        }
        let router = FlowRouter::entry(&pending.request, state.storage_config());
        let ctx = state.ctx().clone();
        ctx.try_log(|logger| info!(logger, "Serving authentication request on {}", router.route()));

        Ok(Self {
            finalizer: ResponseFinalizer::new(&ctx, services.channel.clone()),
            hub_url_field: HubUrlField::new(services.hub_probe.clone(), settings.debounce()),
            default_hub_url: settings.default_gaia_hub_url.clone(),
            pending: pending.clone(),
            router,
            services,
            ctx,
        })
    }

    pub fn route(&self) -> FlowRoute {
        self.router.route()
    }

    pub fn request_token(&self) -> &str {
        &self.pending.token
    }

    pub fn hub_url_field(&self) -> &HubUrlField {
        &self.hub_url_field
    }

    pub fn on_hub_url_input(&mut self, url: &str) {
        self.hub_url_field.on_input(url);
    }

    /// Re-evaluates the route when account selection is reached.
    pub fn enter_choose_account(&mut self, state: &AppState) -> FlowRoute {
        self.router.guard_choose_account(&self.pending.request, state.storage_config())
    }

    pub async fn submit_storage(
        &mut self,
        state: &mut AppState,
        choice: StorageChoice,
    ) -> Result<FlowRoute, FlowError> {
        self.ensure_active()?;
        if !state.begin_loading(LoadingKey::ChooseStorage) {
            return Err(FlowError::Busy("storage selection"));
        }
        let result = self.submit_storage_inner(state, choice).await;
        state.finish_loading(LoadingKey::ChooseStorage);
        result
    }

    async fn submit_storage_inner(
        &mut self,
        state: &mut AppState,
        choice: StorageChoice,
    ) -> Result<FlowRoute, FlowError> {
        let hub_url = match choice {
            StorageChoice::Default => self.default_hub_url.clone(),
            StorageChoice::Custom(url) => {
                let url = url.trim().to_string();
                validate_hub_url(&url).map_err(FlowError::InvalidInput)?;
                let validated_by_field =
                    self.hub_url_field.value() == url && self.hub_url_field.is_valid();
                if !validated_by_field && !self.services.hub_probe.probe(&url).await {
                    return Err(FlowError::InvalidInput(format!(
                        "Unable to reach a Gaia hub at {}",
                        url
                    )));
                }
                self.ensure_active()?;
                url
            }
        };

        state
            .update_storage_config(StorageConfig::with_hub(&hub_url))
            .map_err(|e| FlowError::Service(e.to_string()))?;
        self.ctx.try_log(|logger| info!(logger, "Storage endpoint set to {}", hub_url));
        self.router.apply(FlowEvent::StorageSubmitted)
    }

    pub async fn choose_account(
        &mut self,
        state: &mut AppState,
        index: u32,
    ) -> Result<FlowRoute, FlowError> {
        self.ensure_active()?;
        if self.enter_choose_account(state) != FlowRoute::ChooseAccount {
            return Ok(self.router.route());
        }
        if !state.begin_loading(LoadingKey::ChooseAccount) {
            return Err(FlowError::Busy("account selection"));
        }
        let result = self.choose_account_inner(state, index).await;
        state.finish_loading(LoadingKey::ChooseAccount);
        result
    }

    async fn choose_account_inner(
        &mut self,
        state: &mut AppState,
        index: u32,
    ) -> Result<FlowRoute, FlowError> {
        let Some(decoded) = self.pending.request.as_authentication().cloned() else {
            return Err(self.abort(state, FlowError::MissingRequest));
        };
        let Some(wallet) = state.wallet().cloned() else {
            return Err(self.abort(state, FlowError::MissingWallet));
        };
        let Some(account) = wallet.account(index).cloned() else {
            return Err(self.abort(state, FlowError::MissingAccount(index)));
        };
        let (app_domain, transit_public_key) =
            match (decoded.app_origin(), decoded.transit_public_key()) {
                (Ok(origin), Some(key)) => (origin, key.to_string()),
                (Err(e), _) => return Err(self.abort(state, FlowError::InvalidInput(e))),
                (_, None) => {
                    let err = FlowError::InvalidInput("request has no transit key".into());
                    return Err(self.abort(state, err));
                }
            };

        let hub_url = state.storage_config().hub_url_or(&self.default_hub_url).to_string();
        let gaia_config = match self.services.storage.configure_account(&wallet, &hub_url).await {
            Ok(config) => config,
            Err(e) => return Err(self.abort(state, FlowError::Service(e))),
        };
        self.ensure_active()?;

        let entry = AppEntry {
            origin: app_domain.clone(),
            last_login_at: chrono::Utc::now().timestamp_millis(),
            scopes: decoded.scopes.clone(),
            app_icon: decoded.app_icon().map(str::to_string),
            name: decoded.app_name().map(str::to_string),
            account_index: index,
        };
        if let Err(e) = self.services.storage.upload_app_entry(&gaia_config, &entry).await {
            return Err(self.abort(state, FlowError::Service(e)));
        }
        self.ensure_active()?;

        let params = AuthResponseParams {
            gaia_hub_url: hub_url,
            app_domain,
            transit_public_key,
            scopes: decoded.scopes.clone(),
            account: account.clone(),
        };
        let auth_response = match self.services.signer.make_auth_response(&params).await {
            Ok(response) => response,
            Err(e) => return Err(self.abort(state, FlowError::Service(e))),
        };
        self.ensure_active()?;

        state.switch_account(account.index);
        let token = self.pending.token.clone();
        if let Err(e) = self.finalizer.finalize_auth(&token, &decoded, &auth_response) {
            return Err(self.abort(state, e.into()));
        }
        state.clear_pending_request_for(&self.pending.token);
        self.router.apply(FlowEvent::Finalize)
    }

    /// Explicit cancellation. The cancel response is best effort.
    pub fn cancel(&mut self, state: &mut AppState) -> Result<FinalizeOutcome, FlowError> {
        self.ensure_active()?;
        let outcome = self.finalizer.cancel_auth(&self.pending.token);
        if let Err(e) = &outcome {
            self.ctx.try_log(|logger| warn!(logger, "Cancellation not delivered: {}", e));
        }
        state.clear_pending_request_for(&self.pending.token);
        self.router.apply(FlowEvent::Finalize)?;
        Ok(outcome?)
    }

    /// Host teardown. Answers with a cancellation unless a response already went out.
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
        self.ctx.try_log(|logger| error!(logger, "Unable to sign in: {}", err));
        state.notify(Notification::error(format!("Unable to sign in: {}", err)));
        err
    }
}

#[cfg(test)]
mod tests {
    use kit::serde_json::json;
    use kit::types::message::{ExtensionMethod, MessagePayload};
    use kit::types::wallet::{Account, Wallet};
    use stacks_wallet_test_utils::mocks::{services_with, MockHubProbe, MockServices};
    use stacks_wallet_test_utils::tokens::TestSigner;

    use super::*;
    use crate::finalizer::FinalizeError;
    use crate::state::local_store::InMemoryStore;

    fn auth_token(enable_gaia_selection: bool) -> String {
        auth_token_from("https://app.example.com", "Example", enable_gaia_selection)
    }

    fn auth_token_from(app: &str, name: &str, enable_gaia_selection: bool) -> String {
        let signer = TestSigner::new(7);
        signer.sign(&json!({
            "redirect_uri": format!("{}/redirect", app),
            "scopes": ["store_write", "publish_data"],
            "public_keys": [signer.public_key_hex()],
            "domain_name": app,
            "manifest_uri": format!("{}/manifest.json", app),
            "appDetails": { "name": name, "icon": format!("{}/icon.png", app) },
            "enableGaiaSelection": enable_gaia_selection,
        }))
    }

    fn wallet() -> Wallet {
        Wallet {
            accounts: (0..2)
                .map(|index| Account {
                    index,
                    stx_address: format!("SP{}", index),
                    data_public_key: format!("02{:02}", index),
                })
                .collect(),
        }
    }

    fn state_serving(token: &str) -> AppState {
        let mut state = AppState::load(&Context::empty(), Box::new(InMemoryStore::new()));
        assert!(state.receive_request(ExtensionMethod::AuthenticationRequest, token).is_some());
        state
    }

    fn start(state: &AppState, mocks: &MockServices) -> AuthenticationFlow {
        AuthenticationFlow::start(state, mocks.services(), &WalletSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn custom_storage_then_sign_in() {
        let token = auth_token(true);
        let mut state = state_serving(&token);
        state.set_wallet(Some(wallet()));
        let mocks = services_with(MockHubProbe::reachable(&["https://hub.mine.com"]));
        let mut flow = start(&state, &mocks);
        assert_eq!(flow.route(), FlowRoute::ChooseStorage);

        let route = flow
            .submit_storage(&mut state, StorageChoice::Custom("https://hub.mine.com".into()))
            .await
            .unwrap();
        assert_eq!(route, FlowRoute::ChooseAccount);
        assert_eq!(state.storage_config().own_gaia_hub_url.as_deref(), Some("https://hub.mine.com"));

        assert_eq!(flow.choose_account(&mut state, 1).await, Ok(FlowRoute::Finalized));
        assert_eq!(mocks.storage.configured_hubs(), vec!["https://hub.mine.com".to_string()]);
        let entries = mocks.storage.uploaded_entries();
        assert_eq!(entries[0].origin, "https://app.example.com");
        assert_eq!(entries[0].name.as_deref(), Some("Example"));
        assert_eq!(state.current_account().map(|a| a.index), Some(1));
        assert!(state.pending_request().is_none());

        let sent = mocks.channel.messages();
        assert_eq!(sent.len(), 1);
        match sent[0].payload() {
            MessagePayload::AuthenticationResponse(payload) => {
                assert_eq!(payload.authentication_request, token);
                assert_eq!(payload.authentication_response, mocks.signer.auth_response_for(1));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_hub_keeps_the_user_on_storage_selection() {
        let mut state = state_serving(&auth_token(true));
        let mocks = services_with(MockHubProbe::reachable(&[]));
        let mut flow = start(&state, &mocks);

        let err = flow
            .submit_storage(&mut state, StorageChoice::Custom("https://nowhere.example".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput(_)));
        assert_eq!(flow.route(), FlowRoute::ChooseStorage);
        assert!(!state.storage_config().is_configured());
        assert!(!state.is_loading(LoadingKey::ChooseStorage));
    }

    #[tokio::test]
    async fn default_storage_stores_the_default_hub() {
        let mut state = state_serving(&auth_token(true));
        let mocks = services_with(MockHubProbe::reachable(&[]));
        let mut flow = start(&state, &mocks);

        flow.submit_storage(&mut state, StorageChoice::Default).await.unwrap();
        assert_eq!(state.storage_config().hub_url(), WalletSettings::default().default_gaia_hub_url);
        assert_eq!(mocks.hub_probe.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_wallet_aborts_without_response() {
        let mut state = state_serving(&auth_token(false));
        let mocks = services_with(MockHubProbe::reachable(&[]));
        let mut flow = start(&state, &mocks);
        assert_eq!(flow.route(), FlowRoute::ChooseAccount);

        assert_eq!(flow.choose_account(&mut state, 0).await, Err(FlowError::MissingWallet));
        assert!(mocks.channel.messages().is_empty());
        assert!(state.notifications()[0].is_error());
        assert_eq!(flow.route(), FlowRoute::ChooseAccount);
    }

    #[tokio::test]
    async fn storage_failure_aborts_without_response() {
        let mut state = state_serving(&auth_token(false));
        state.set_wallet(Some(wallet()));
        let mocks = services_with(MockHubProbe::reachable(&[]));
        mocks.storage.fail_with("hub refused write");
        let mut flow = start(&state, &mocks);

        let err = flow.choose_account(&mut state, 0).await.unwrap_err();
        assert_eq!(err, FlowError::Service("hub refused write".into()));
        assert!(mocks.channel.messages().is_empty());
    }

    #[tokio::test]
    async fn cancel_then_abandon_sends_one_response() {
        let token = auth_token(false);
        let mut state = state_serving(&token);
        let mocks = services_with(MockHubProbe::reachable(&[]));
        let mut flow = start(&state, &mocks);

        assert_eq!(flow.cancel(&mut state), Ok(FinalizeOutcome::Sent));
        flow.abandon(&mut state);
        assert_eq!(flow.cancel(&mut state), Err(FlowError::AlreadyFinalized));

        let sent = mocks.channel.messages();
        assert_eq!(sent.len(), 1);
        match sent[0].payload() {
            MessagePayload::AuthenticationResponse(payload) => {
                assert_eq!(payload.authentication_response, "cancel")
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn abandon_after_sign_in_is_a_no_op() {
        let mut state = state_serving(&auth_token(false));
        state.set_wallet(Some(wallet()));
        let mocks = services_with(MockHubProbe::reachable(&[]));
        let mut flow = start(&state, &mocks);

        flow.choose_account(&mut state, 0).await.unwrap();
        flow.abandon(&mut state);
        assert_eq!(mocks.channel.messages().len(), 1);
    }

    #[tokio::test]
    async fn sign_in_answers_the_request_it_started_with() {
        let first = auth_token_from("https://app-a.example.com", "App A", false);
        let second = auth_token_from("https://app-b.example.com", "App B", false);
        let mut state = state_serving(&first);
        state.set_wallet(Some(wallet()));
        let mocks = services_with(MockHubProbe::reachable(&[]));
        let mut flow = start(&state, &mocks);
        assert!(state.receive_request(ExtensionMethod::AuthenticationRequest, &second).is_some());

        assert_eq!(flow.choose_account(&mut state, 0).await, Ok(FlowRoute::Finalized));
        let entries = mocks.storage.uploaded_entries();
        assert_eq!(entries[0].origin, "https://app-a.example.com");
        assert_eq!(entries[0].name.as_deref(), Some("App A"));
        match mocks.channel.messages()[0].payload() {
            MessagePayload::AuthenticationResponse(payload) => {
                assert_eq!(payload.authentication_request, first)
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(state.pending_request().map(|p| p.token.as_str()), Some(second.as_str()));
    }

    #[tokio::test]
    async fn cancel_spares_a_newer_request() {
        let first = auth_token_from("https://app-a.example.com", "App A", false);
        let second = auth_token_from("https://app-b.example.com", "App B", false);
        let mut state = state_serving(&first);
        let mocks = services_with(MockHubProbe::reachable(&[]));
        let mut flow = start(&state, &mocks);
        state.receive_request(ExtensionMethod::AuthenticationRequest, &second).unwrap();

        assert_eq!(flow.cancel(&mut state), Ok(FinalizeOutcome::Sent));
        assert_eq!(mocks.channel.messages()[0].request_token(), Some(first.as_str()));
        assert_eq!(state.pending_request().map(|p| p.token.as_str()), Some(second.as_str()));
    }

    #[tokio::test]
    async fn undelivered_sign_in_can_be_retried() {
        let token = auth_token(false);
        let mut state = state_serving(&token);
        state.set_wallet(Some(wallet()));
        let mocks = services_with(MockHubProbe::reachable(&[]));
        let mut flow = start(&state, &mocks);

        mocks.channel.disconnect();
        let err = flow.choose_account(&mut state, 0).await.unwrap_err();
        assert!(matches!(err, FlowError::Finalize(FinalizeError::Delivery(_))));
        assert!(state.notifications().iter().any(|n| n.is_error()));
        assert_eq!(flow.route(), FlowRoute::ChooseAccount);
        assert!(state.pending_request().is_some());

        mocks.channel.reconnect();
        assert_eq!(flow.choose_account(&mut state, 0).await, Ok(FlowRoute::Finalized));
        assert_eq!(mocks.channel.messages().len(), 1);
        assert!(state.pending_request().is_none());
    }

    #[test]
    fn start_requires_an_authentication_request() {
        let state = AppState::load(&Context::empty(), Box::new(InMemoryStore::new()));
        let mocks = services_with(MockHubProbe::reachable(&[]));
        let err = AuthenticationFlow::start(&state, mocks.services(), &WalletSettings::default())
            .unwrap_err();
        assert_eq!(err, FlowError::MissingRequest);
    }
}
