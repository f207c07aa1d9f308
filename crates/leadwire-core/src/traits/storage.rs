// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the persistence backend.

use async_trait::async_trait;

use crate::error::LeadwireError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChatSession, Contact, ContactUpdate, Conversation, InsertOutcome, Message, NewContact,
    NewMessage, Order, SpecialistProfile, Specialty, StaffMember,
};

/// Adapter for the relational persistence layer.
///
/// Every read-modify-write method is applied atomically against the latest
/// persisted row, never against a caller-held copy.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), LeadwireError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), LeadwireError>;

    // --- Contacts ---

    async fn find_contact_by_phone(&self, phone: &str) -> Result<Option<Contact>, LeadwireError>;

    async fn get_contact(&self, id: &str) -> Result<Option<Contact>, LeadwireError>;

    /// Create a contact with status `NEW` and score 0.
    ///
    /// If a contact with the same phone already exists it is returned as-is.
    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, LeadwireError>;

    async fn set_contact_address(&self, id: &str, address: &str) -> Result<(), LeadwireError>;

    /// Atomically apply an automated update; returns the updated contact.
    async fn update_contact(
        &self,
        id: &str,
        update: &ContactUpdate,
    ) -> Result<Contact, LeadwireError>;

    // --- Staff ---

    /// Earliest-created active staff member, if any.
    async fn first_active_staff(&self) -> Result<Option<StaffMember>, LeadwireError>;

    async fn create_staff(&self, name: &str) -> Result<StaffMember, LeadwireError>;

    async fn set_staff_active(&self, id: &str, active: bool) -> Result<(), LeadwireError>;

    // --- Conversations ---

    /// Return the open-or-pending conversation for (contact, channel),
    /// creating an `open` one only if none exists. The flag reports creation.
    async fn resolve_active_conversation(
        &self,
        contact_id: &str,
        channel: &str,
    ) -> Result<(Conversation, bool), LeadwireError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, LeadwireError>;

    async fn list_conversations(&self, contact_id: &str) -> Result<Vec<Conversation>, LeadwireError>;

    async fn close_conversation(&self, id: &str) -> Result<(), LeadwireError>;

    // --- Messages ---

    /// Persist a message, deduplicating on the transport id in its metadata.
    async fn insert_message(&self, message: &NewMessage) -> Result<InsertOutcome, LeadwireError>;

    /// The most recent `limit` messages, returned oldest first.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, LeadwireError>;

    // --- Specialists ---

    async fn upsert_specialist(&self, profile: &SpecialistProfile) -> Result<(), LeadwireError>;

    async fn get_specialist(
        &self,
        specialty: Specialty,
    ) -> Result<Option<SpecialistProfile>, LeadwireError>;

    // --- Orders ---

    async fn orders_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Order>, LeadwireError>;

    // --- Chat session ---

    async fn save_chat_session(&self, session: &ChatSession) -> Result<(), LeadwireError>;

    async fn load_chat_session(&self) -> Result<Option<ChatSession>, LeadwireError>;
}
