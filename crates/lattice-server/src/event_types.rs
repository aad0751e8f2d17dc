//! Catalogue contributions from each event-emitting feature area.
//!
//! Each feature module exposes a `register` function that contributes
//! its `action_name → descriptor` entries; [`build_catalogue`] composes
//! them into the one immutable catalogue before the server accepts any
//! request. A registration conflict between modules fails startup.

use lattice_eventlog::{CatalogueBuilder, CatalogueError, EventTypeCatalogue};

/// Composes every feature module's contributions into the process-wide
/// catalogue.
pub fn build_catalogue() -> Result<EventTypeCatalogue, CatalogueError> {
    let mut builder = CatalogueBuilder::new();
    content::register(&mut builder)?;
    audience::register(&mut builder)?;
    hub_admin::register(&mut builder)?;
    Ok(builder.build())
}

fn str_field<'a>(data: &'a serde_json::Value, key: &str) -> &'a str {
    data[key].as_str().unwrap_or("?")
}

/// Content events reported by nodes.
pub mod content {
    use super::*;

    pub fn register(builder: &mut CatalogueBuilder) -> Result<(), CatalogueError> {
        builder.register("post_published", "Post published", |data| {
            format!(
                "Post published: \"{}\" at {}",
                str_field(data, "title"),
                str_field(data, "url"),
            )
        })?;
        builder.register("post_unpublished", "Post unpublished", |data| {
            format!(
                "Post unpublished: \"{}\" at {}",
                str_field(data, "title"),
                str_field(data, "url"),
            )
        })?;
        Ok(())
    }
}

/// Audience and revenue events reported by nodes.
pub mod audience {
    use super::*;

    pub fn register(builder: &mut CatalogueBuilder) -> Result<(), CatalogueError> {
        builder.register("reader_registered", "Reader registered", |data| {
            format!("New reader registered: {}", str_field(data, "email"))
        })?;
        builder.register("newsletter_subscribed", "Newsletter subscription", |data| {
            format!(
                "{} subscribed to {}",
                str_field(data, "email"),
                str_field(data, "list"),
            )
        })?;
        builder.register("donation_received", "Donation received", |data| {
            format!(
                "Donation of {} {} from {}",
                str_field(data, "amount"),
                str_field(data, "currency"),
                str_field(data, "email"),
            )
        })?;
        Ok(())
    }
}

/// Administrative events the hub records about itself (node_id 0).
pub mod hub_admin {
    use super::*;

    pub fn register(builder: &mut CatalogueBuilder) -> Result<(), CatalogueError> {
        builder.register("node_registered", "Node registered", |data| {
            format!("Node registered: {}", str_field(data, "url"))
        })?;
        builder.register("node_key_rotated", "Node keys rotated", |data| {
            format!("Key pair rotated for node {}", str_field(data, "url"))
        })?;
        builder.register("node_deleted", "Node removed", |data| {
            format!("Node removed: {}", str_field(data, "url"))
        })?;
        Ok(())
    }
}
