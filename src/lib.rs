/*!
# Funnel Analytics Dashboard

A marketing-funnel analytics dashboard built in Rust: it loads daily
aggregated counters from a spreadsheet export, slices them by a
user-selected demographic segment and date, computes stage-to-stage
percentages and conversion rates, and serves stacked-bar and
per-segment funnel charts.

## Architecture

The data flows one direction:

```text
CSV export → loader → SheetSnapshot → row resolver → ratio computer
           → chart parameter builder → plotters PNG / JSON API
```

Each (segment type, date) query is computed independently in a single
pass over the snapshot; nothing is mutated after startup, so the
catalog and the snapshot are shared across request handlers without
locking.

### Core Components
- **Segment/Stage Catalog** - Ordered segment labels, display colors
  and funnel stage lists per segment type
- **Row Resolver** - Maps a (stage, segment) pair onto the raw column
  naming scheme, including the derived 全体 pseudo-segment and the
  pre-funnel friend-count column family
- **Ratio Computer** - Percent-of-stage-total tables for the
  comparative view and conversion-rate series for the per-segment view
- **Chart Parameter Builder** - Bar offsets, cumulative stacking
  bases and axis label strings, rendered to PNG with plotters

### Web Layer
- **Technologies**: Rust, axum
- Serves the dashboard page, a JSON API over the computed tables, and
  the rendered chart images

## Modules

- **catalog**: segment/stage registry (labels, colors, stage lists)
- **row**: raw-row data model, column-key construction, row resolver
- **funnel**: percent-of-total and conversion-rate computation
- **chart**: chart parameter construction and PNG rendering
- **loader**: CSV snapshot loading
- **app**: routing and request handlers
- **error**: the query error taxonomy

## REST API Endpoints

- `/api/meta` - Available dates and segment types
- `/api/share?segment_type=..&date=..` - Percent-of-total table
- `/api/series?segment_type=..&date=..` - Conversion-rate series
- `/api/chart/stacked.png?segment_type=..&date=..` - Comparative chart
- `/api/chart/segment.png?segment_type=..&date=..&label=..` - One
  segment's funnel chart
*/

// Re-export all modules so they appear in the documentation
pub mod app;
pub mod catalog;
pub mod chart;
pub mod error;
pub mod funnel;
pub mod loader;
pub mod row;

/// Re-export the core types to make the crate easier to use
pub use error::FunnelError;
pub use funnel::{SegmentSeries, SegmentShare, ShareTable, StageBreakdown, StagePoint};
pub use row::{DailyRow, SheetSnapshot};
