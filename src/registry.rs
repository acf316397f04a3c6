//! Process-wide mapping `StoreId -> Store`: starts the shared maintenance
//! ticker on first use and notifies the coordinator of which process
//! hosts an active instance.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::StoreConfig;
use crate::coordinator::{
    CoordinatorClient, ReportActiveInstance, VerifyIfInstanceActive,
};
use crate::id::StoreId;
use crate::maintainer::MaintenanceTicker;
use crate::store::Store;

pub struct StoreRegistry {
    stores: Arc<Mutex<HashMap<StoreId, Store>>>,
    ticker: Mutex<Option<MaintenanceTicker>>,
    coordinator: Arc<dyn CoordinatorClient>,
    config: StoreConfig,
    host: String,
    executor_id: String,
}

impl StoreRegistry {
    pub fn new(
        config: StoreConfig,
        coordinator: Arc<dyn CoordinatorClient>,
        host: impl Into<String>,
        executor_id: impl Into<String>,
    ) -> Self {
        Self {
            stores: Arc::new(Mutex::new(HashMap::new())),
            ticker: Mutex::new(None),
            coordinator,
            config,
            host: host.into(),
            executor_id: executor_id.into(),
        }
    }

    /// Returns the existing store for `id` or constructs one rooted at
    /// `root`, starts the maintenance ticker if this is the first `get`
    /// since construction (or since the last `clear_all`), and notifies the
    /// coordinator that this process hosts an active instance. An
    /// unreachable coordinator triggers a defensive `clear_all`: this
    /// process may have been displaced, though on-disk store data is left
    /// untouched.
    pub fn get(&self, id: StoreId, root: impl AsRef<Path>) -> Store {
        let store = {
            let mut guard = self.stores.lock().unwrap();
            let is_first_ever = guard.is_empty();
            let store = guard
                .entry(id)
                .or_insert_with(|| Store::new(id, root.as_ref(), self.config))
                .clone();

            if is_first_ever {
                drop(guard);
                self.start_ticker();
            }

            store
        };

        let report = self.coordinator.report_active_instance(ReportActiveInstance {
            store_id: id,
            host: self.host.clone(),
            executor_id: self.executor_id.clone(),
        });

        if report.is_err() {
            log::warn!("coordinator unreachable reporting {id}; clearing registry");
            self.clear_all();
        }

        store
    }

    /// Asks the coordinator whether this process is still the active writer
    /// for `id`. An unreachable coordinator is treated as "not active".
    pub fn verify_active(&self, id: StoreId) -> bool {
        self.coordinator.verify_if_instance_active(VerifyIfInstanceActive {
            store_id: id,
            executor_id: self.executor_id.clone(),
        })
    }

    /// Cancels the maintenance ticker and drops every held `Store`. Store
    /// data on disk is untouched; a later `get` for the same id reloads it
    /// from the filesystem.
    pub fn clear_all(&self) {
        if let Some(ticker) = self.ticker.lock().unwrap().take() {
            ticker.stop();
        }
        self.stores.lock().unwrap().clear();
    }

    fn start_ticker(&self) {
        let mut guard = self.ticker.lock().unwrap();
        if guard.is_some() {
            return;
        }

        let stores = self.stores.clone();
        let ticker = MaintenanceTicker::start(self.config.maintenance_period(), move || {
            stores.lock().unwrap().values().cloned().collect()
        });

        *guard = Some(ticker);
    }

    pub fn maintenance_period(&self) -> Duration {
        self.config.maintenance_period()
    }
}
