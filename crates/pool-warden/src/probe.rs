//! Liveness probe.
//!
//! Runs a fixed, side-effect-free statement and accepts the connection only
//! when it returns exactly one row carrying the expected literal.

use crate::config::ProbeConfig;
use crate::connection::{Connection, close_quietly};
use crate::error::ProbeFailure;
use crate::row::Row;

/// Classifies connections as live or dead.
#[derive(Debug, Clone)]
pub struct LivenessProbe {
    config: ProbeConfig,
}

impl LivenessProbe {
    /// Create a probe from its settings.
    #[must_use]
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// The probe settings.
    #[must_use]
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run the probe without consuming the connection.
    pub async fn check<C: Connection>(&self, conn: &mut C) -> Result<(), ProbeFailure> {
        let rows = conn
            .query(&self.config.statement)
            .await
            .map_err(ProbeFailure::Query)?;
        self.classify(&rows)
    }

    /// Probe `conn`, returning it when live.
    ///
    /// A dead connection is closed here before the failure is returned, so
    /// it can never reach the application.
    pub async fn validate<C: Connection>(&self, mut conn: C) -> Result<C, ProbeFailure> {
        match self.check(&mut conn).await {
            Ok(()) => Ok(conn),
            Err(failure) => {
                tracing::warn!(reason = %failure, "liveness probe rejected connection");
                close_quietly(conn, "probe failed").await;
                Err(failure)
            }
        }
    }

    /// Classify a probe result set.
    pub fn classify(&self, rows: &[Row]) -> Result<(), ProbeFailure> {
        let row = match rows {
            [] => return Err(ProbeFailure::NoRows),
            [row] => row,
            _ => return Err(ProbeFailure::TooManyRows(rows.len())),
        };

        let actual = match &self.config.column {
            Some(column) => row
                .get_by_name(column)
                .ok_or_else(|| ProbeFailure::MissingColumn(column.clone()))?,
            None if row.len() == 1 => row.get(0).ok_or(ProbeFailure::NoRows)?,
            None => return Err(ProbeFailure::MissingColumn(format!("{} columns", row.len()))),
        };

        if *actual == self.config.expected {
            Ok(())
        } else {
            Err(ProbeFailure::UnexpectedValue {
                expected: self.config.expected.clone(),
                actual: actual.clone(),
            })
        }
    }
}

impl Default for LivenessProbe {
    fn default() -> Self {
        Self::new(ProbeConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::error::DriverError;
    use crate::row::Value;

    #[derive(Debug)]
    struct Scripted {
        reply: Result<Vec<Row>, DriverError>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connection for Scripted {
        async fn query(&mut self, _sql: &str) -> Result<Vec<Row>, DriverError> {
            self.reply.clone()
        }

        async fn close(self) -> Result<(), DriverError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn scripted(reply: Result<Vec<Row>, DriverError>) -> (Scripted, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Scripted {
                reply,
                closes: closes.clone(),
            },
            closes,
        )
    }

    #[test]
    fn test_classify_expected_row() {
        let probe = LivenessProbe::default();
        assert_ok!(probe.classify(&[Row::new().with("1", 1)]));
    }

    #[test]
    fn test_classify_wrong_value() {
        let probe = LivenessProbe::default();
        let err = assert_err!(probe.classify(&[Row::new().with("1", 2)]));
        assert_eq!(
            err,
            ProbeFailure::UnexpectedValue {
                expected: Value::Int(1),
                actual: Value::Int(2),
            }
        );
    }

    #[test]
    fn test_classify_row_count() {
        let probe = LivenessProbe::default();
        assert_eq!(probe.classify(&[]), Err(ProbeFailure::NoRows));

        let row = Row::new().with("1", 1);
        assert_eq!(
            probe.classify(&[row.clone(), row]),
            Err(ProbeFailure::TooManyRows(2))
        );
    }

    #[test]
    fn test_classify_shape() {
        let probe = LivenessProbe::default();
        assert!(matches!(
            probe.classify(&[Row::new().with("one", 1)]),
            Err(ProbeFailure::MissingColumn(_))
        ));

        // A text "1" is not the integer literal.
        assert!(matches!(
            probe.classify(&[Row::new().with("1", "1")]),
            Err(ProbeFailure::UnexpectedValue { .. })
        ));
    }

    #[test]
    fn test_classify_single_column_mode() {
        let probe = LivenessProbe::new(ProbeConfig::default().column(None));
        assert_ok!(probe.classify(&[Row::new().with("anything", 1)]));
        assert_err!(probe.classify(&[Row::new().with("a", 1).with("b", 1)]));
    }

    #[tokio::test]
    async fn test_validate_returns_live_connection_unclosed() {
        let (conn, closes) = scripted(Ok(vec![Row::new().with("1", 1)]));
        let probe = LivenessProbe::default();

        let conn = assert_ok!(probe.validate(conn).await);
        assert!(conn.reply.is_ok());
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validate_closes_dead_connection_once() {
        let (conn, closes) = scripted(Err(DriverError::new("SQL30081N")));
        let probe = LivenessProbe::default();

        let err = assert_err!(probe.validate(conn).await);
        assert!(matches!(err, ProbeFailure::Query(_)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
