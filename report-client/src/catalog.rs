use filter_core::{FieldDescriptor, FieldRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::transport::FilterTransport;

/// Field list per business, typed through the registry and cached after the
/// first successful load. Failed loads are never cached.
pub struct FieldCatalog<T: FilterTransport> {
    transport: Arc<T>,
    registry: FieldRegistry,
    cache: Mutex<HashMap<String, Vec<FieldDescriptor>>>,
}

impl<T: FilterTransport> FieldCatalog<T> {
    pub fn new(transport: Arc<T>, registry: FieldRegistry) -> Self {
        Self {
            transport,
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Fields available to `business`. On failure logs and returns an empty list.
    pub async fn fields(&self, business: &str) -> Vec<FieldDescriptor> {
        if let Some(cached) = self.cached(business) {
            return cached;
        }
        self.refresh(business).await
    }

    /// Drops any cached list for `business` and loads it again.
    pub async fn refresh(&self, business: &str) -> Vec<FieldDescriptor> {
        self.lock().remove(business);

        match self.transport.available_fields(business).await {
            Ok(names) => {
                let fields = self.registry.describe_all(&names);
                tracing::info!("Loaded {} fields for business {}", fields.len(), business);
                self.lock().insert(business.to_string(), fields.clone());
                fields
            }
            Err(e) => {
                tracing::warn!("Failed to load fields for business {}: {:#}", business, e);
                Vec::new()
            }
        }
    }

    pub fn cached(&self, business: &str) -> Option<Vec<FieldDescriptor>> {
        self.lock().get(business).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<FieldDescriptor>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
