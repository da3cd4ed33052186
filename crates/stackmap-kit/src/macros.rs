#[macro_export]
macro_rules! diagnosed_warning {
    ($($arg:tt)*) => {{
        use stackmap_kit::types::diagnostics::Diagnostic;

        let res = format_args!($($arg)*).to_string();
        Diagnostic::warning_from_string(res)
    }};
}
