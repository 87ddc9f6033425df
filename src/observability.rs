use biometrics::{Collector, Counter, Moments};

pub(crate) static CATALOG_REQUESTS: Counter = Counter::new("daybook.catalog.requests");
pub(crate) static CATALOG_ERRORS: Counter = Counter::new("daybook.catalog.errors");

pub(crate) static STREAM_REQUESTS: Counter = Counter::new("daybook.stream.requests");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("daybook.stream.fragments");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("daybook.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("daybook.stream.bytes");
pub(crate) static STREAM_INTERRUPTS: Counter = Counter::new("daybook.stream.interrupts");
pub(crate) static STREAM_DURATION: Moments = Moments::new("daybook.stream.duration_seconds");

pub(crate) static HISTORY_LOADS: Counter = Counter::new("daybook.history.loads");
pub(crate) static HISTORY_LOAD_ERRORS: Counter = Counter::new("daybook.history.load_errors");
pub(crate) static HISTORY_WRITES: Counter = Counter::new("daybook.history.writes");
pub(crate) static HISTORY_WRITE_ERRORS: Counter = Counter::new("daybook.history.write_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CATALOG_REQUESTS);
    collector.register_counter(&CATALOG_ERRORS);

    collector.register_counter(&STREAM_REQUESTS);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_INTERRUPTS);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&HISTORY_LOADS);
    collector.register_counter(&HISTORY_LOAD_ERRORS);
    collector.register_counter(&HISTORY_WRITES);
    collector.register_counter(&HISTORY_WRITE_ERRORS);
}
