pub mod cache;
pub mod collection;
pub mod config;
pub mod crs;
pub mod error;
pub mod export;
pub mod join;
pub mod loader;
pub mod preview;
pub mod session;
pub mod value;

pub use cache::LoadCache;
pub use collection::{Crs, Feature, FeatureCollection};
pub use config::PipelineConfig;
pub use error::{GeojoinError, JoinError, LoadError, Result, Side};
pub use export::{export_artifact, to_geojson_string, write_geojson, ExportArtifact};
pub use join::{join, JoinOutcome, JoinSpec, MergeHow, Predicate, SpatialHow};
pub use loader::{load_dataset, load_path, InputFormat};
pub use preview::{preview, Preview};
pub use session::{Notice, Session};
pub use value::AttributeValue;
