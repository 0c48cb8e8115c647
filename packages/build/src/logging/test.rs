// Logging Tests

#[cfg(test)]
mod tests {
    use crate::logging::*;

    mod log_level_tests {
        use super::*;

        #[test]
        fn should_have_correct_ordering() {
            assert!(LogLevel::Debug < LogLevel::Info);
            assert!(LogLevel::Info < LogLevel::Warn);
            assert!(LogLevel::Warn < LogLevel::Error);
        }

        #[test]
        fn should_parse_level_names() {
            assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info));
            assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
            assert!("loud".parse::<LogLevel>().is_err());
        }
    }

    mod console_logger_tests {
        use super::*;

        #[test]
        fn should_check_level_enabled() {
            let logger = ConsoleLogger::new(LogLevel::Warn);

            assert_eq!(logger.level(), LogLevel::Warn);
            assert!(!logger.is_enabled(LogLevel::Debug));
            assert!(!logger.is_enabled(LogLevel::Info));
            assert!(logger.is_enabled(LogLevel::Warn));
            assert!(logger.is_enabled(LogLevel::Error));
        }
    }

    mod memory_logger_tests {
        use super::*;

        #[test]
        fn should_keep_enabled_records_only() {
            let logger = MemoryLogger::new(LogLevel::Info);
            logger.debug("hidden");
            logger.info("building");
            logger.error("failed");

            assert_eq!(logger.records(), vec!["info building", "error failed"]);
        }
    }

    mod null_logger_tests {
        use super::*;

        #[test]
        fn should_not_log_anything() {
            let logger = NullLogger::new();

            logger.debug("debug message");
            logger.error("error message");
            assert!(!logger.is_enabled(LogLevel::Warn));
        }
    }
}
