//! Shared runtime application state (HTTP handlers)

use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::store::CredentialStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub name: Arc<str>,
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<CredentialStore>,
}

impl AppState {
    pub fn new(name: impl Into<Arc<str>>, dispatcher: Arc<Dispatcher>) -> Self {
        let store = dispatcher.store().clone();
        Self {
            name: name.into(),
            dispatcher,
            store,
        }
    }
}
