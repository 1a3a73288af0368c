//! Process-wide tool registry
//!
//! In-memory catalogue of tool descriptors. Initialisation is lazy and
//! idempotent; register/unregister are the only mutators. Readers get a
//! consistent snapshot per call.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::builtin;
use crate::descriptor::{ToolDescriptor, ToolStatus, ToolTransport};

/// Tool registry
#[derive(Default)]
pub struct ToolRegistry {
    entries: RwLock<HashMap<String, ToolDescriptor>>,
    initialized: AtomicBool,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builtin descriptors; repeated calls are no-ops
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut entries = self.entries.write().await;
        for descriptor in builtin::descriptors() {
            debug!(id = %descriptor.id, "seeding builtin tool provider");
            entries.insert(descriptor.id.clone(), descriptor);
        }
        info!(count = entries.len(), "tool registry initialized");
    }

    /// All registered descriptors
    pub async fn get_all(&self) -> Vec<ToolDescriptor> {
        let entries = self.entries.read().await;
        entries.values().cloned().collect()
    }

    /// Look up a descriptor by provider id
    pub async fn get(&self, id: &str) -> Option<ToolDescriptor> {
        let entries = self.entries.read().await;
        entries.get(id).cloned()
    }

    /// Register a descriptor; a duplicate id overwrites but keeps the
    /// original creation time
    pub async fn register(&self, mut descriptor: ToolDescriptor) {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(&descriptor.id) {
            descriptor.created_at = existing.created_at;
        }
        descriptor.updated_at = Utc::now();
        info!(id = %descriptor.id, "registering tool provider");
        entries.insert(descriptor.id.clone(), descriptor);
    }

    /// Remove a descriptor, reporting whether it existed
    pub async fn unregister(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(id).is_some();
        if removed {
            info!(id = %id, "unregistered tool provider");
        }
        removed
    }

    /// Update the lifecycle status of a provider
    pub async fn update_status(&self, id: &str, status: ToolStatus) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) => {
                entry.status = status;
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Case-insensitive match over name, description, and tags
    pub async fn search(&self, query: &str) -> Vec<ToolDescriptor> {
        let needle = query.to_lowercase();
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|d| {
                d.name.to_lowercase().contains(&needle)
                    || d.description.to_lowercase().contains(&needle)
                    || d.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }

    /// All descriptors using the given transport
    pub async fn get_by_transport(&self, transport: ToolTransport) -> Vec<ToolDescriptor> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|d| d.transport == transport)
            .cloned()
            .collect()
    }

    /// Record a completed call: bump count, stamp last use, fold latency
    /// into the rolling average
    pub async fn record_call(&self, id: &str, latency_ms: u64) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(id) {
            let stats = &mut entry.stats;
            let previous_total =
                stats.avg_latency_ms.unwrap_or(0.0) * stats.call_count as f64;
            stats.call_count += 1;
            stats.avg_latency_ms =
                Some((previous_total + latency_ms as f64) / stats.call_count as f64);
            stats.last_used = Some(Utc::now());
        }
    }
}
