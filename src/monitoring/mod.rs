/*!
 * Monitoring
 * Structured tracing for the setup path; counters live in `signals::atomic_stats`
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, span_operation, OperationSpan, ENV_TRACE_JSON};
