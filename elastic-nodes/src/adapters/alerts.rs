// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::codes;
use crate::app::ports::{OperatorAlertPort, TerminationAlert};

pub const ALERT_TARGET: &str = "elastic_nodes::alerts";

/// Reports operator alerts as `error` events on [`ALERT_TARGET`].
#[derive(Clone, Default)]
pub struct TracingAlerts;

impl TracingAlerts {
    pub fn new() -> Self {
        Self
    }
}

impl OperatorAlertPort for TracingAlerts {
    fn termination_failed(&self, alert: TerminationAlert) {
        let location = alert.instance_location.as_deref().unwrap_or("unknown");
        tracing::error!(
            target: ALERT_TARGET,
            code = codes::RETRIES_EXHAUSTED,
            node = %alert.node_name,
            instance = %location,
            attempts = alert.attempts,
            error = %alert.last_error,
            "unable to terminate node {} after {} attempts; terminate the instance manually at {}",
            alert.node_name,
            alert.attempts,
            location
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn alert_names_node_and_manual_termination_link() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            TracingAlerts::new().termination_failed(TerminationAlert {
                node_name: "node-1".to_string(),
                instance_location: Some("https://eb.example.com/#/instances/i-42".to_string()),
                attempts: 4,
                last_error: "boom".to_string(),
            });
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("ERROR"));
        assert!(output.contains(ALERT_TARGET));
        assert!(output.contains("node-1"));
        assert!(output.contains("https://eb.example.com/#/instances/i-42"));
    }
}
