pub mod debounce;
pub mod form;
pub mod gaia_hub;

pub use debounce::{Debouncer, HubUrlField, HubUrlStatus};
pub use form::{validate_hub_url, FieldErrors, TransactionFormValues};
pub use gaia_hub::{GaiaHubClient, HubInfo};
