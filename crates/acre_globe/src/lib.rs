//! acre_globe - Icosahedral acre mesh builder
//!
//! Tiles a sphere with roughly equal-area hexagonal cells ("acres") plus
//! exactly twelve pentagons, stitches every acre to its neighbors across
//! sector boundaries and assigns each one a block-aligned range of vertex
//! ids for fine topography.
//!
//! # Features
//!
//! - **Two-level subdivision**: icosahedron faces split into sectors, sectors
//!   into a triangular lattice whose centers become acres
//! - **Seam stitching**: acres on sector edges and corners are built once and
//!   shared by every sector that touches them
//! - **Dependency scheduler**: build stages run as work sources on a fixed
//!   worker pool
//! - **Validation**: graph checks plus a vertex-id touch histogram compared
//!   against the closed form for the configured globe
//!
//! # Example
//!
//! ```ignore
//! use acre_globe::{DiscardAcres, GlobeBuilder, GlobeConfig};
//!
//! let build = GlobeBuilder::new(GlobeConfig::new(2, 6)).build(DiscardAcres)?;
//! assert!(build.report.is_ok());
//! println!("{} acres", build.globe.acre_count());
//! ```

pub mod constants;
pub mod error;
pub mod geo_point;
pub mod geo_spec;
pub mod lattice;

// Re-export commonly used items
pub use config::GlobeConfig;
pub use error::{BuildError, BuildResult};
pub use geo_point::GeoPoint;
pub use geo_spec::GeoSpec;

pub mod config;

// Acres and the id sequences that name them
pub mod acre;
pub mod sequence;
pub use acre::{Acre, AcreFlavor, AcreId, AcreRecord};
pub use sequence::{AcreSequence, PointSequence};

// Point deduplication
pub mod spatial_map;
pub use spatial_map::{DAabb3, SpatialMap};

// Sectors and acre stitching
pub mod acre_builder;
pub mod sector;
pub mod sector_builder;
pub use acre_builder::AcreGraph;
pub use sector::{GlobalSector, Sector, SectorId, SectorSet};

// Vertex-id ranges and per-acre topography
pub mod vertex_ids;
pub use vertex_ids::{Topography, VertexIdLayout, VertexRange};

// Dependency-ordered work scheduler
pub mod scheduler;
pub use scheduler::{WorkManager, WorkSource, WorkSourceKey};

// Build stages and the entry point
pub mod consumer;
pub mod globe;
pub mod metrics;
pub mod pipeline;
pub use consumer::{AcreConsumer, DiscardAcres, RecordCollector};
pub use globe::{Globe, GlobeBuild, GlobeBuilder};
pub use metrics::{BuildMetrics, StageTiming};

// Post-build checks
pub mod validator;
pub use validator::{ValidationReport, VertexCounter};
