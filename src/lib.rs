//! Simulation core for a Conway's Game of Life engine: two interchangeable
//! evolution algorithms over an unbounded integer lattice, a hash-consed
//! quadtree node pool shared process-wide, a bounded/unbounded grid façade,
//! a run-length encoder, and a background evolution worker with lock-free
//! snapshot publication.
//!
//! Rendering, the GUI editor, and alternate rulesets or persistence formats
//! are all out of scope — see the crate's design notes for the boundary.

pub mod cancel;
pub mod cell;
pub mod error;
pub mod grid;
pub mod node;
pub mod pool;
pub mod quadtree;
pub mod rect;
pub mod rle;
pub mod sparse_life;
pub mod worker;

pub use cancel::CancelToken;
pub use cell::{Cell, CellSet};
pub use error::SimError;
pub use grid::{Algorithm, FlipAxis, Grid};
pub use quadtree::HashQuadtree;
pub use rect::Rect;
pub use rle::RleCodec;
pub use worker::SimulationWorker;
