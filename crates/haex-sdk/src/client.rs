use std::sync::Arc;

use haex_common::{ExtensionInfo, Result};

use crate::database::Database;
use crate::gateway::{RequestGateway, dispatch};
use crate::migrations::{Migration, MigrationRegistrar, MigrationResult};
use crate::protocol::HostRequest;

/// Entry point for an extension talking to its host.
///
/// Cheap to clone; all clones share the same gateway. Pass it explicitly to
/// whatever needs host access.
#[derive(Clone)]
pub struct HaexClient {
    gateway: Arc<dyn RequestGateway>,
}

impl HaexClient {
    pub fn new(gateway: Arc<dyn RequestGateway>) -> Self {
        Self { gateway }
    }

    pub fn from_gateway(gateway: impl RequestGateway + 'static) -> Self {
        Self::new(Arc::new(gateway))
    }

    pub fn gateway(&self) -> &Arc<dyn RequestGateway> {
        &self.gateway
    }

    pub fn database(&self) -> Database {
        Database::new(Arc::clone(&self.gateway))
    }

    pub fn migrations(&self) -> MigrationRegistrar {
        MigrationRegistrar::new(Arc::clone(&self.gateway))
    }

    /// Identity and namespace of this extension as seen by the host.
    pub async fn extension_info(&self) -> Result<ExtensionInfo> {
        dispatch(self.gateway.as_ref(), HostRequest::GetExtensionInfo)
            .await?
            .into_extension_info()
    }

    pub async fn register_migrations(
        &self,
        extension_version: &str,
        migrations: Vec<Migration>,
    ) -> Result<MigrationResult> {
        self.migrations()
            .register(extension_version, migrations)
            .await
    }
}
