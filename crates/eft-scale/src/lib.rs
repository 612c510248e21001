#![deny(missing_docs)]
#![doc = "Quadratic EFT scaling terms: reweighting grids, bin accumulation, coefficient extraction and model evaluation."]

/// Per-bin running sums for every sample point.
pub mod accumulator;
/// Report and legacy exporters.
pub mod export;
/// Canonical reweighting grid.
pub mod grid;
/// Canonical hashing helpers.
pub mod hash;
/// Bin-indexable sequence adapters.
pub mod hist;
/// Scaling model and its terms.
pub mod model;
/// Per-event reweighting and parallel ingestion.
pub mod reweight;
/// Canonical JSON and document serde helpers.
pub mod serde;
/// Finite-difference coefficient extraction.
pub mod solver;
/// Seeded synthetic closure data.
pub mod synth;

pub use accumulator::{BinAccumulator, BinStatistics, CellStats};
pub use export::{export, render_accumulator_table, write_export, ExportFormat, Translations};
pub use grid::{build_points, PointKind, PointRole, SampleGrid, SamplePoint};
pub use hash::{accumulator_digest, model_digest, stable_hash_string};
pub use hist::{BinSequence, BinSequenceMut, ExternalHistogram, Histogram, OneBased};
pub use model::{BinEdges, Couplings, EftTerm, EvalOpts, ScaledBins, ScalingModel, TermKind};
pub use reweight::{
    decompose_event, ingest_events, reweight_event, BinnedEvent, IngestOpts, WeightOracle,
};
pub use crate::serde::{
    from_json_slice, model_from_json, model_to_json, read_model, read_stats, stats_from_json,
    stats_to_json, to_canonical_json_bytes, write_model, write_stats,
};
pub use solver::{solve, SolveMode, SolveOpts, TermSolver};
pub use synth::{QuadraticTruth, SynthOpts, SyntheticEvent};
