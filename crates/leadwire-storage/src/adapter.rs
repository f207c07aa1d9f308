// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter and OrderService traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use leadwire_config::model::StorageConfig;
use leadwire_core::types::{
    ChatSession, Contact, ContactUpdate, Conversation, FunnelStatus, InsertOutcome, Message,
    NewContact, NewMessage, Order, OrderItem, SpecialistProfile, Specialty, StaffMember,
};
use leadwire_core::{
    AdapterType, HealthStatus, LeadwireError, OrderService, PluginAdapter, StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, LeadwireError> {
        self.db
            .get()
            .ok_or_else(|| LeadwireError::persistence("storage not initialized -- call initialize() first"))
    }

    /// Manually move a contact to a status, including `LOST`.
    pub async fn set_funnel_status(
        &self,
        contact_id: &str,
        status: FunnelStatus,
    ) -> Result<(), LeadwireError> {
        queries::contacts::set_funnel_status(self.db()?, contact_id, status).await
    }

    /// Park a conversation as waiting on staff.
    pub async fn mark_conversation_pending(&self, id: &str) -> Result<(), LeadwireError> {
        queries::conversations::mark_pending(self.db()?, id).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwireError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadwireError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), LeadwireError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| LeadwireError::persistence("storage already initialized"))?;
        info!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), LeadwireError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Contacts ---

    async fn find_contact_by_phone(&self, phone: &str) -> Result<Option<Contact>, LeadwireError> {
        queries::contacts::find_by_phone(self.db()?, phone).await
    }

    async fn get_contact(&self, id: &str) -> Result<Option<Contact>, LeadwireError> {
        queries::contacts::get_contact(self.db()?, id).await
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, LeadwireError> {
        queries::contacts::create_contact(self.db()?, contact).await
    }

    async fn set_contact_address(&self, id: &str, address: &str) -> Result<(), LeadwireError> {
        queries::contacts::set_remote_address(self.db()?, id, address).await
    }

    async fn update_contact(
        &self,
        id: &str,
        update: &ContactUpdate,
    ) -> Result<Contact, LeadwireError> {
        queries::contacts::update_contact(self.db()?, id, update).await
    }

    // --- Staff ---

    async fn first_active_staff(&self) -> Result<Option<StaffMember>, LeadwireError> {
        queries::staff::first_active_staff(self.db()?).await
    }

    async fn create_staff(&self, name: &str) -> Result<StaffMember, LeadwireError> {
        queries::staff::create_staff(self.db()?, name).await
    }

    async fn set_staff_active(&self, id: &str, active: bool) -> Result<(), LeadwireError> {
        queries::staff::set_staff_active(self.db()?, id, active).await
    }

    // --- Conversations ---

    async fn resolve_active_conversation(
        &self,
        contact_id: &str,
        channel: &str,
    ) -> Result<(Conversation, bool), LeadwireError> {
        queries::conversations::resolve_active(self.db()?, contact_id, channel).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, LeadwireError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn list_conversations(&self, contact_id: &str) -> Result<Vec<Conversation>, LeadwireError> {
        queries::conversations::list_for_contact(self.db()?, contact_id).await
    }

    async fn close_conversation(&self, id: &str) -> Result<(), LeadwireError> {
        queries::conversations::close_conversation(self.db()?, id).await
    }

    // --- Messages ---

    async fn insert_message(&self, message: &NewMessage) -> Result<InsertOutcome, LeadwireError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, LeadwireError> {
        queries::messages::recent_messages(self.db()?, conversation_id, limit).await
    }

    // --- Specialists ---

    async fn upsert_specialist(&self, profile: &SpecialistProfile) -> Result<(), LeadwireError> {
        queries::specialists::upsert_specialist(self.db()?, profile).await
    }

    async fn get_specialist(
        &self,
        specialty: Specialty,
    ) -> Result<Option<SpecialistProfile>, LeadwireError> {
        queries::specialists::get_specialist(self.db()?, specialty).await
    }

    // --- Orders ---

    async fn orders_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Order>, LeadwireError> {
        queries::orders::orders_for_conversation(self.db()?, conversation_id).await
    }

    // --- Chat session ---

    async fn save_chat_session(&self, session: &ChatSession) -> Result<(), LeadwireError> {
        queries::chat_session::save(self.db()?, session).await
    }

    async fn load_chat_session(&self) -> Result<Option<ChatSession>, LeadwireError> {
        queries::chat_session::load(self.db()?).await
    }
}

#[async_trait]
impl OrderService for SqliteStorage {
    async fn create_from_conversation(
        &self,
        contact_id: &str,
        conversation_id: &str,
        items: &[OrderItem],
        notes: Option<&str>,
    ) -> Result<Order, LeadwireError> {
        let order =
            queries::orders::create_order(self.db()?, contact_id, conversation_id, items, notes)
                .await?;
        info!(
            reference = %order.reference,
            contact_id,
            items = order.items.len(),
            "order created"
        );
        Ok(order)
    }
}
