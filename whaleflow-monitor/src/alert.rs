use serde::{Deserialize, Serialize};
use std::time::Duration;
use whaleflow_data::OrderPayload;

/// Order size (BTC) at which an informational alert is raised.
pub const INFO_ALERT_THRESHOLD: f64 = 100.0;

/// Order size (BTC) at which the alert becomes critical.
pub const CRITICAL_ALERT_THRESHOLD: f64 = 1000.0;

/// Alert severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum AlertSeverity {
    /// Auto-dismisses after its display duration.
    Info,
    /// Requires explicit dismissal or the longer display duration.
    Critical,
}

impl AlertSeverity {
    pub fn display_duration(&self) -> Duration {
        match self {
            AlertSeverity::Info => Duration::from_millis(7_000),
            AlertSeverity::Critical => Duration::from_millis(10_000),
        }
    }
}

/// User-facing whale-order alert.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
    pub display_for: Duration,
}

impl Alert {
    /// Build the alert an order warrants, if any.
    pub fn for_order(order: &OrderPayload) -> Option<Self> {
        let severity = if order.size >= CRITICAL_ALERT_THRESHOLD {
            AlertSeverity::Critical
        } else if order.size >= INFO_ALERT_THRESHOLD {
            AlertSeverity::Info
        } else {
            return None;
        };

        Some(Self {
            severity,
            message: format!(
                "Whale order: {:.2} BTC {} at {:.2} on {}",
                order.size, order.side, order.price, order.exchange
            ),
            display_for: severity.display_duration(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whaleflow_data::OrderSide;

    fn order(size: f64) -> OrderPayload {
        OrderPayload {
            size,
            side: OrderSide::Long,
            price: 93_000.0,
            exchange: "binance".to_string(),
        }
    }

    #[test]
    fn test_alert_thresholds() {
        struct TestCase {
            size: f64,
            expected: Option<AlertSeverity>,
        }

        let tests = vec![
            TestCase {
                // TC0: below both thresholds
                size: 99.0,
                expected: None,
            },
            TestCase {
                // TC1: informational threshold is inclusive
                size: 100.0,
                expected: Some(AlertSeverity::Info),
            },
            TestCase {
                // TC2: just under critical stays informational
                size: 999.99,
                expected: Some(AlertSeverity::Info),
            },
            TestCase {
                // TC3: critical threshold is inclusive
                size: 1000.0,
                expected: Some(AlertSeverity::Critical),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Alert::for_order(&order(test.size)).map(|alert| alert.severity);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_display_durations() {
        let info = Alert::for_order(&order(100.0)).expect("info alert");
        assert_eq!(info.display_for, Duration::from_millis(7_000));

        let critical = Alert::for_order(&order(1500.0)).expect("critical alert");
        assert_eq!(critical.display_for, Duration::from_millis(10_000));
    }

    #[test]
    fn test_message_embeds_order_details() {
        let alert = Alert::for_order(&order(150.0)).expect("alert");
        assert!(alert.message.contains("150.00"));
        assert!(alert.message.contains("long"));
        assert!(alert.message.contains("93000.00"));
        assert!(alert.message.contains("binance"));
    }
}
