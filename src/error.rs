use thiserror::Error;

/// Errors raised by the funnel computation core.
///
/// Both variants are fatal to the query they occur in: a funnel with an
/// unknown segment type or a missing stage column cannot produce
/// meaningful ratios, so the whole query aborts with no partial result.
/// "No row for the requested date" is deliberately *not* an error — the
/// query functions return `Ok(None)` for it and the caller renders an
/// empty state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunnelError {
    /// The requested segment type is not registered in the catalog.
    #[error("unknown segment type: {0}")]
    UnknownSegmentType(String),

    /// The raw row lacks the column for this (segment, stage) pair.
    /// Never silently coerced to zero: a zeroed stage would corrupt the
    /// percentage math undetectably.
    #[error("missing column for segment {segment} at stage {stage}")]
    MissingColumn { segment: String, stage: String },
}
