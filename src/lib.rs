//! # dualtree
//!
//! `dualtree` computes kernel density estimates and three-body potentials over large
//! point sets without evaluating every pair or triple. It can be used from Rust and
//! compiled to WebAssembly (WASM).
//!
//! ## Features
//!
//! - **Midpoint kd-trees**: Built in place over a contiguous point buffer, in parallel with `rayon`.
//! - **Dual-tree traversal**: Query and reference trees are walked together, and node pairs whose
//!   contribution is tightly bounded are approximated instead of evaluated.
//! - **Triple-tree traversal**: The same idea for three-point interactions over a single tree.
//! - **Guaranteed error**: Every approximation is charged against a per-point error budget, so the
//!   reported value of every point stays within the requested absolute or relative tolerance.
//! - **WASM-first**: Exported through `wasm-bindgen`, with `wasm-bindgen-rayon` threads in the browser.
//!
//! ## Main Interface
//!
//! [`KernelDensity`] estimates densities and [`ThreeBodySimulator`] sums Axilrod-Teller
//! potentials. Both are configured through builders. The tree and traversal layers
//! ([`KdTree`], [`DualTreeTraversal`], [`TripleTreeTraversal`]) are public for new
//! problems implementing [`DualTreeProblem`] or [`TripleTreeProblem`].

mod accumulator;
mod bounds;
mod error;
mod kde;
mod kdtree;
mod kernel;
mod nbody;
mod potential;
mod range;
mod statistic;
mod store;
mod traversal;
mod wasm;

pub mod dataset;
pub mod naive;
pub mod output;

pub use accumulator::finalize;
pub use accumulator::unpermute;
pub use bounds::BoundingBox;
pub use bounds::dist_sq;
pub use error::Error;
pub use error::Result;
pub use kde::DEFAULT_ABSOLUTE_ERROR;
pub use kde::KdeDelta;
pub use kde::KdeOutput;
pub use kde::KdePostponed;
pub use kde::KdeProblem;
pub use kde::KdeResult;
pub use kde::KdeSummary;
pub use kde::KernelDensity;
pub use kde::KernelDensityBuilder;
pub use kdtree::DEFAULT_LEAF_SIZE;
pub use kdtree::KdNode;
pub use kdtree::KdTree;
pub use kdtree::KdTreeBuilder;
pub use kdtree::TreeStatistic;
pub use kernel::EpanechnikovKernel;
pub use kernel::GaussianKernel;
pub use kernel::Kernel;
pub use nbody::NbodyDelta;
pub use nbody::NbodyOutput;
pub use nbody::NbodyPostponed;
pub use nbody::NbodyProblem;
pub use nbody::NbodyResult;
pub use nbody::NbodySummary;
pub use nbody::ThreeBodySimulator;
pub use nbody::ThreeBodySimulatorBuilder;
pub use potential::AxilrodTeller;
pub use range::Range;
pub use statistic::NodeState;
pub use statistic::Postponed;
pub use statistic::PostponedOf;
pub use statistic::QueryResult;
pub use statistic::ResultOf;
pub use statistic::Summary;
pub use store::points_from_flat;
pub use store::PointSlice;
pub use store::PointStore;
pub use traversal::DualTreeProblem;
pub use traversal::DualTreeTraversal;
pub use traversal::NodeTriple;
pub use traversal::SlotState;
pub use traversal::TraversalRun;
pub use traversal::TraversalStats;
pub use traversal::TripleTreeProblem;
pub use traversal::TripleTreeTraversal;
pub use wasm::kde_2d;
pub use wasm::kde_3d;
pub use wasm::three_body_3d;
