/// Data layer: readings, training tables, loading, and splitting.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → LabeledDataset
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ LabeledDataset │  feature columns + 2 target columns
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  split    │  seeded shuffle → train / holdout indices
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod split;
