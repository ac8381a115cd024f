//! Territory partition generation
//!
//! Places random seeds inside the bounds, relaxes them with a bounded Lloyd's
//! algorithm, and produces clipped Voronoi cells via Delaunay triangulation.

mod delaunay;
mod lloyd;
mod points;
mod voronoi;

pub use delaunay::{compute_delaunay, DelaunayResult};
pub use lloyd::{lloyd_relaxation_with_options, LloydOptions, Relaxation, RelaxationState};
pub use points::{average_spacing, generate_seed_points, perturb_point};
pub use voronoi::{generate_cells, RawCell};
