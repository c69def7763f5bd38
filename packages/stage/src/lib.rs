//! # Stagehand Stage
//!
//! Layer model and composition. A project is an ordered stack of layer
//! documents; composing them yields the hierarchy the outliner shows.
//!
//! ```text
//! LayerSource[] → parse → stack → resolve arcs → inherit status → ComposedHierarchy
//! ```

pub mod composer;
pub mod error;
pub mod hierarchy;
pub mod layer;
pub mod resolver;

pub use composer::{compose_layers, Composer};
pub use error::StageError;
pub use hierarchy::{Collision, ComposedHierarchy, OpinionIndex};
pub use layer::{find_layer, Layer, LayerSource, LayerStatus};
pub use resolver::Resolver;
