/// Data layer: profile types, stack loading, and result export.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → ProfileStack
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ ProfileStack  │  Vec<ProfileSlice>, optional times
///   └──────────────┘
///        │   (analysis)
///        ▼
///   ┌──────────┐
///   │  export   │  DistanceSeries → CSV, diagnostics → JSON
///   └──────────┘
/// ```

pub mod export;
pub mod loader;
pub mod model;
