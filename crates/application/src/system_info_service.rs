use tracing::info;
use uuid::Uuid;
use vela_console_core::{AppError, AppResult};
use vela_console_domain::{LoginType, SystemInfo};

use crate::datastore_ports::{EntityStore, ListOptions};

/// Input payload for updating installation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSystemInfoInput {
    /// Login type to activate.
    pub login_type: LoginType,
    /// Whether anonymous usage collection is enabled.
    pub enable_collection: bool,
    /// Public console address.
    pub base_url: String,
}

/// Application service for installation-wide settings.
#[derive(Clone)]
pub struct SystemInfoService {
    store: EntityStore,
}

impl SystemInfoService {
    /// Creates a new system info service.
    #[must_use]
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Returns the settings record, creating it on first use.
    pub async fn get_or_create(&self) -> AppResult<SystemInfo> {
        let existing = self
            .store
            .list(&SystemInfo::default(), &ListOptions::default())
            .await?;
        if let Some(info) = existing.into_iter().next() {
            return Ok(info);
        }

        let info = SystemInfo {
            install_id: Uuid::new_v4().to_string(),
            enable_collection: true,
            login_type: LoginType::Local,
            ..SystemInfo::default()
        };
        let info = self.store.add(info).await?;
        info!(install_id = %info.install_id, "created system info");
        Ok(info)
    }

    /// Returns the active login type.
    pub async fn login_type(&self) -> AppResult<LoginType> {
        Ok(self.get_or_create().await?.login_type)
    }

    /// Updates the settings record.
    pub async fn update_system_info(&self, input: UpdateSystemInfoInput) -> AppResult<SystemInfo> {
        let mut info = self.get_or_create().await?;
        if input.login_type == LoginType::Dex && input.base_url.is_empty() {
            return Err(AppError::Validation(
                "the base url is required for dex login".to_owned(),
            ));
        }

        info.login_type = input.login_type;
        info.enable_collection = input.enable_collection;
        info.base_url = input.base_url;
        self.store.put(info).await
    }
}
