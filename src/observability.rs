use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("palaver.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("palaver.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("palaver.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("palaver.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("palaver.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("palaver.stream.bytes");
pub(crate) static STREAM_IGNORED_LINES: Counter = Counter::new("palaver.stream.ignored_lines");
pub(crate) static STREAM_MALFORMED_LINES: Counter =
    Counter::new("palaver.stream.malformed_lines");

pub(crate) static SESSION_EXCHANGES: Counter = Counter::new("palaver.session.exchanges");
pub(crate) static SESSION_FAILED_EXCHANGES: Counter =
    Counter::new("palaver.session.failed_exchanges");
pub(crate) static SESSION_UNTERMINATED_STREAMS: Counter =
    Counter::new("palaver.session.unterminated_streams");
pub(crate) static SESSION_EXCHANGE_DURATION: Moments =
    Moments::new("palaver.session.exchange_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_IGNORED_LINES);
    collector.register_counter(&STREAM_MALFORMED_LINES);

    collector.register_counter(&SESSION_EXCHANGES);
    collector.register_counter(&SESSION_FAILED_EXCHANGES);
    collector.register_counter(&SESSION_UNTERMINATED_STREAMS);
    collector.register_moments(&SESSION_EXCHANGE_DURATION);
}
