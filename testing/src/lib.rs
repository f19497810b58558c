//! # Pharmacart Testing
//!
//! Testing utilities and helpers for the Pharmacart cart architecture.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - An in-memory, fault-injectable [`KeyValueStore`](pharmacart_core::storage::KeyValueStore)
//! - A Given-When-Then builder for reducer tests
//! - Assertion helpers for reducer effects
//!
//! ## Example
//!
//! ```
//! use pharmacart_core::environment::Clock;
//! use pharmacart_core::storage::KeyValueStore;
//! use pharmacart_testing::{InMemoryKeyValueStore, test_clock};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = InMemoryKeyValueStore::new();
//! backend.set("pharmacart.cart", r#"{"items":[]}"#.to_string()).await?;
//! assert_eq!(backend.get("pharmacart.cart").await?.as_deref(), Some(r#"{"items":[]}"#));
//!
//! backend.fail_writes(true);
//! assert!(backend.remove("pharmacart.cart").await.is_err());
//! assert!(backend.contains_key("pharmacart.cart"));
//!
//! // Every call sees the same instant
//! assert_eq!(test_clock().now(), test_clock().now());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use pharmacart_core::environment::Clock;


/// In-memory storage backends
pub mod storage_mocks;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use pharmacart_testing::mocks::FixedClock;
    /// use pharmacart_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a test-friendly tracing subscriber
///
/// Honors `RUST_LOG` and writes through the test harness so output is only
/// shown for failing tests. Safe to call from every test; only the first call
/// installs the subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
pub use storage_mocks::{InMemoryKeyValueStore, StorageOperation};
