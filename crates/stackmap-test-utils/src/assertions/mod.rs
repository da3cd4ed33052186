//! Common assertion macros for stackmap tests

/// Assert that a result contains a specific error pattern
#[macro_export]
macro_rules! assert_error {
    ($result:expr, $pattern:expr) => {
        match &$result {
            Ok(_) => panic!("Expected error containing '{}', but got success", $pattern),
            Err(e) => {
                let error_str = e.to_string();
                assert!(
                    error_str.contains($pattern),
                    "Expected error containing '{}', but got: {}",
                    $pattern,
                    error_str
                );
            }
        }
    };
}

/// Assert that an analysis result contains a specific error
#[macro_export]
macro_rules! assert_analysis_error {
    ($result:expr, $pattern:expr) => {
        assert!(!$result.success, "Expected analysis error, but analysis succeeded");
        let errors_str =
            $result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
        assert!(
            errors_str.contains($pattern),
            "Expected error containing '{}', but got:\n{}",
            $pattern,
            errors_str
        );
    };
}

/// Assert that an analysis warning contains pattern
#[macro_export]
macro_rules! assert_analysis_warning {
    ($result:expr, $pattern:expr) => {
        let pattern = $pattern;
        let found = $result.warnings.iter().any(|w| w.to_string().contains(pattern));
        if !found {
            let warnings_str = $result
                .warnings
                .iter()
                .map(|w| format!("  - {}", w))
                .collect::<Vec<_>>()
                .join("\n");
            panic!(
                "Expected warning containing '{}', but got:\n{}",
                pattern,
                if warnings_str.is_empty() { "  (no warnings)".to_string() } else { warnings_str }
            );
        }
    };
}

/// Assert that analysis succeeded
#[macro_export]
macro_rules! assert_success {
    ($result:expr) => {
        if !$result.success {
            let errors_str =
                $result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
            panic!("Expected success, but got errors:\n{}", errors_str);
        }
    };
}
