use std::sync::Arc;

use crate::locales::LocaleStore;
use crate::model::Model;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    /// `None` when loading failed at startup; the server keeps running to report it.
    pub model: Option<Arc<Model>>,
    pub locales: LocaleStore,
}

impl AppState {
    pub fn new(model: Option<Model>, locales: LocaleStore) -> SharedState {
        Arc::new(Self {
            model: model.map(Arc::new),
            locales,
        })
    }
}
