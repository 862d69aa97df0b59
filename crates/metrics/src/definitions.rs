//! Metric name and label definitions.
//!
//! Every metric pincer records is named here so the set stays discoverable.

/// Inbound transport events reaching the ingest handler
pub mod ingest {
    /// Messages written to the message store
    pub const MESSAGES_STORED_TOTAL: &str = "pincer_ingest_messages_stored_total";
    /// Events dropped (unregistered conversation, no text content)
    pub const MESSAGES_DROPPED_TOTAL: &str = "pincer_ingest_messages_dropped_total";
    /// Events whose store write failed
    pub const STORE_ERRORS_TOTAL: &str = "pincer_ingest_store_errors_total";
}

/// Dispatch loop progress
pub mod dispatch {
    /// Poll cycles executed
    pub const POLL_CYCLES_TOTAL: &str = "pincer_dispatch_poll_cycles_total";
    /// Messages fully handled (watermark advanced past them)
    pub const MESSAGES_HANDLED_TOTAL: &str = "pincer_dispatch_messages_handled_total";
    /// Handling attempts that failed and blocked the watermark
    pub const HANDLING_FAILURES_TOTAL: &str = "pincer_dispatch_handling_failures_total";
    /// Messages skipped after exceeding the retry limit
    pub const MESSAGES_QUARANTINED_TOTAL: &str = "pincer_dispatch_messages_quarantined_total";
    /// Number of messages returned by the last poll
    pub const BATCH_SIZE: &str = "pincer_dispatch_batch_size";
}

/// Reasoning engine invocations
pub mod engine {
    /// Engine runs started
    pub const RUNS_TOTAL: &str = "pincer_engine_runs_total";
    /// Engine runs that failed, timed out or returned nothing
    pub const FAILURES_TOTAL: &str = "pincer_engine_failures_total";
    /// Wall-clock duration of engine runs in seconds
    pub const DURATION_SECONDS: &str = "pincer_engine_duration_seconds";
}

/// Outbound transport sends
pub mod outbound {
    /// Replies sent
    pub const SENT_TOTAL: &str = "pincer_outbound_sent_total";
    /// Replies the transport rejected
    pub const ERRORS_TOTAL: &str = "pincer_outbound_errors_total";
}

/// Common label keys
pub mod labels {
    pub const CHANNEL: &str = "channel";
    pub const OUTCOME: &str = "outcome";
    pub const REASON: &str = "reason";
}

/// Histogram bucket boundaries
pub mod buckets {
    /// Engine runs: seconds to several minutes
    pub const ENGINE_DURATION: &[f64] = &[
        0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 180.0, 300.0, 600.0,
    ];
}
