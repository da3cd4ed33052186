use slog::Drain;
use stackmap_core::Context;

/// A context logging to the test harness' captured stdout.
pub fn test_context() -> Context {
    let decorator = slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    Context::new(slog::Logger::root(drain, slog::o!()))
}
