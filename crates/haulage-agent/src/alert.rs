use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use haulage_core::config::AlertsConfig;
use haulage_core::error::{HaulageError, Result};
use haulage_core::traits::Notifier;
use haulage_core::types::Alert;

/// Fans alerts out to every configured notifier.
///
/// Delivery happens on a detached task; a failing channel is logged and
/// never reaches the caller.
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl AlertDispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn from_config(config: &AlertsConfig) -> Self {
        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
        if config.log {
            notifiers.push(Arc::new(LogNotifier));
        }
        for url in &config.webhooks {
            notifiers.push(Arc::new(WebhookNotifier::new(url)));
        }
        Self::new(notifiers)
    }

    pub fn channels(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    /// Raise an alert. The returned handle may be awaited or dropped.
    pub fn raise(
        &self,
        alert_type: impl Into<String>,
        alert_data: serde_json::Value,
    ) -> JoinHandle<()> {
        let alert = Alert::new(alert_type, alert_data);
        info!(alert_type = %alert.alert_type, "Raising alert");

        let notifiers = self.notifiers.clone();
        tokio::spawn(async move {
            for notifier in notifiers {
                if let Err(e) = notifier.notify(&alert).await {
                    warn!(channel = notifier.name(), error = %e, "Alert delivery failed");
                }
            }
        })
    }
}

/// Writes alerts to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, alert: &Alert) -> BoxFuture<'_, Result<()>> {
        warn!(alert_type = %alert.alert_type, "{}", alert.message);
        Box::pin(async { Ok(()) })
    }
}

/// POSTs the alert as JSON to a URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn notify(&self, alert: &Alert) -> BoxFuture<'_, Result<()>> {
        let alert = alert.clone();
        Box::pin(async move {
            let resp = self
                .client
                .post(&self.url)
                .json(&alert)
                .send()
                .await
                .map_err(|e| HaulageError::Notification(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(HaulageError::Notification(format!(
                    "webhook {} returned {}",
                    self.url,
                    resp.status()
                )));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulage_test_utils::RecordingNotifier;
    use serde_json::json;

    struct BrokenNotifier;

    impl Notifier for BrokenNotifier {
        fn name(&self) -> &str {
            "broken"
        }

        fn notify(&self, _alert: &Alert) -> BoxFuture<'_, Result<()>> {
            Box::pin(async { Err(HaulageError::Notification("down".into())) })
        }
    }

    #[tokio::test]
    async fn test_alert_reaches_every_channel() {
        let recorder = Arc::new(RecordingNotifier::new());
        let dispatcher = AlertDispatcher::new(vec![
            Arc::new(BrokenNotifier),
            recorder.clone(),
            Arc::new(LogNotifier),
        ]);

        dispatcher
            .raise("delay", json!({"shipment": "SHP-1"}))
            .await
            .unwrap();

        let alerts = recorder.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(
            alerts[0].message,
            r#"Alert: delay - Details: {"shipment":"SHP-1"}"#
        );
    }

    #[test]
    fn test_from_config() {
        let config = AlertsConfig {
            log: true,
            webhooks: vec!["http://localhost:9/hook".into()],
        };
        let dispatcher = AlertDispatcher::from_config(&config);
        assert_eq!(dispatcher.channels(), vec!["log", "webhook"]);

        let quiet = AlertsConfig {
            log: false,
            webhooks: vec![],
        };
        assert!(AlertDispatcher::from_config(&quiet).channels().is_empty());
    }
}
