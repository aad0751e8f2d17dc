//! The event type catalogue.
//!
//! Maps each `action_name` to a human-readable label and a summary
//! formatter. The catalogue is composed once at process start from the
//! contributions of every event-emitting feature module, then treated
//! as read-only — it is plain immutable data (`Send + Sync`), so no
//! locking is ever needed on the read path.

use std::collections::BTreeMap;

use thiserror::Error;

/// Renders a one-line summary from an event's structured payload.
///
/// Plain function pointers keep descriptors copyable and the catalogue
/// trivially shareable across threads.
pub type SummaryFormatter = fn(&serde_json::Value) -> String;

/// Errors raised while composing the catalogue.
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// Two modules registered the same `action_name`. Registration
    /// conflicts fail catalogue construction (and therefore startup)
    /// instead of silently last-writing.
    #[error("event type '{0}' is already registered")]
    Duplicate(String),
}

/// Descriptor for one registered event type.
#[derive(Clone)]
pub struct EventTypeDescriptor {
    label: String,
    formatter: SummaryFormatter,
}

impl EventTypeDescriptor {
    /// The human-readable label for listing surfaces.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Renders the ingestion-time summary for a payload.
    pub fn summarize(&self, data: &serde_json::Value) -> String {
        (self.formatter)(data)
    }
}

impl std::fmt::Debug for EventTypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTypeDescriptor")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Accumulates event type registrations during startup.
#[derive(Debug, Default)]
pub struct CatalogueBuilder {
    entries: BTreeMap<String, EventTypeDescriptor>,
}

impl CatalogueBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an event type.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogueError::Duplicate`] if `action_name` was
    /// already registered.
    pub fn register(
        &mut self,
        action_name: &str,
        label: &str,
        formatter: SummaryFormatter,
    ) -> Result<&mut Self, CatalogueError> {
        if self.entries.contains_key(action_name) {
            return Err(CatalogueError::Duplicate(action_name.to_string()));
        }
        self.entries.insert(
            action_name.to_string(),
            EventTypeDescriptor {
                label: label.to_string(),
                formatter,
            },
        );
        Ok(self)
    }

    /// Finalizes the catalogue. Immutable from here on.
    pub fn build(self) -> EventTypeCatalogue {
        EventTypeCatalogue {
            entries: self.entries,
        }
    }
}

/// The immutable, process-wide event type registry.
#[derive(Debug, Clone, Default)]
pub struct EventTypeCatalogue {
    entries: BTreeMap<String, EventTypeDescriptor>,
}

impl EventTypeCatalogue {
    /// Looks up the descriptor for an `action_name`.
    ///
    /// `None` means the type is unknown. Ingestion rejects unknown
    /// types; query surfaces instead degrade to displaying the raw
    /// `action_name` (see [`EventTypeCatalogue::display_label`]), so a
    /// catalogue entry removed after historic events referenced it
    /// never fails a query.
    pub fn resolve(&self, action_name: &str) -> Option<&EventTypeDescriptor> {
        self.entries.get(action_name)
    }

    /// Whether an `action_name` is registered.
    pub fn contains(&self, action_name: &str) -> bool {
        self.entries.contains_key(action_name)
    }

    /// The label to display for an `action_name`, falling back to the
    /// raw name when the type is no longer catalogued.
    pub fn display_label<'a>(&'a self, action_name: &'a str) -> &'a str {
        self.resolve(action_name)
            .map(EventTypeDescriptor::label)
            .unwrap_or(action_name)
    }

    /// All registered `action_name → label` pairs, for filter-UI
    /// population.
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(name, descriptor)| (name.clone(), descriptor.label.clone()))
            .collect()
    }

    /// Number of registered event types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
