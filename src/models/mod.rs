pub mod candidate;
pub mod config;
pub mod coords;
pub mod template;

pub use candidate::{PixelKey, WriteCandidate};
pub use config::{EndpointConfig, EngineConfig, PainterConfig};
pub use coords::{ChunkKey, PixelCoords, Placement, TileCoords};
pub use template::{Template, TemplateCollection, TemplateRecord, TemplateSet};
