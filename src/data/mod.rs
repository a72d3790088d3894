/// Data layer: typed records, parsing, and range filtering.
///
/// Architecture:
/// ```text
///  Test.txt  (HH:MM:SS:ms,ch1..ch7)      calibration .csv (h,Angle(rad),R)
///        │                                        │
///        ▼                                        ▼
///   ┌──────────┐                            ┌──────────┐
///   │  loader   │  lines → SensorLog         │  loader   │  csv → Table
///   └──────────┘  (+ ParseReport)           └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  channel ∈ [lower, upper] → FilteredSeries
///   └──────────┘
/// ```

pub mod error;
pub mod filter;
pub mod loader;
pub mod model;
pub mod timestamp;
