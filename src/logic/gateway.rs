//! Ingestion Gateway
//!
//! Validates one agent payload and routes it: metrics straight to the bus,
//! flows through the rate meter, the flow table and the detection engine.
//! Nothing shared is touched until the payload has validated.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use super::detection::DetectionEngine;
use super::events::{Channel, EventBus};
use super::flow::FlowAggregator;
use super::rate::RateMeter;
use crate::models::{Alert, NetworkFlow, SystemMetrics, TelemetryEvent, ValidationError};

/// Receipt for an accepted payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub kind: &'static str,
    pub alerts: usize,
}

pub struct IngestionGateway {
    flows: Arc<FlowAggregator>,
    rate: Arc<RateMeter>,
    engine: Arc<DetectionEngine>,
    bus: Arc<EventBus>,
}

impl IngestionGateway {
    pub fn new(
        flows: Arc<FlowAggregator>,
        rate: Arc<RateMeter>,
        engine: Arc<DetectionEngine>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self { flows, rate, engine, bus }
    }

    /// Validate and process one raw payload.
    ///
    /// Once validation passes this always acknowledges, even when detection
    /// produced nothing or failed internally.
    pub async fn submit(&self, body: &[u8]) -> Result<Ack, ValidationError> {
        let event = TelemetryEvent::parse(body)?;
        let kind = event.kind();

        let alerts = match event {
            TelemetryEvent::SystemMetrics(metrics) => self.handle_metrics(metrics),
            TelemetryEvent::NetworkFlow(flow) => self.handle_flow(flow).await,
        };

        for alert in &alerts {
            tracing::info!("[{}] {} - {}", alert.severity, alert.description, alert.details);
            self.bus.publish(Channel::Alert, alert);
        }

        Ok(Ack { kind, alerts: alerts.len() })
    }

    fn handle_metrics(&self, metrics: SystemMetrics) -> Vec<Alert> {
        self.bus.publish(Channel::Metrics, &metrics);
        self.engine.detect(&TelemetryEvent::SystemMetrics(metrics))
    }

    /// Detection scores the vector exactly as the agent reported it; the
    /// server-side flow table is tracked for observation only.
    async fn handle_flow(&self, flow: NetworkFlow) -> Vec<Alert> {
        self.rate.record(flow.len);
        if let Some(rates) = self.rate.maybe_flush(Instant::now()) {
            self.bus.publish(Channel::Throughput, &rates);
        }

        match flow.packet_descriptor(epoch_seconds()) {
            Some(packet) => {
                self.flows.ingest(&packet);
            }
            None => {
                tracing::debug!("flow '{}' sent without src/dst, flow table skipped", flow.flow_key);
            }
        }

        let engine = Arc::clone(&self.engine);
        let event = TelemetryEvent::NetworkFlow(flow);

        match tokio::task::spawn_blocking(move || engine.detect(&event)).await {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::error!("Detection task failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn epoch_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use crate::logic::detection::{
        DetectionConfig, RuleThresholds, DEFAULT_ANOMALY_THRESHOLD, DEFAULT_BENIGN_LABEL,
    };
    use crate::logic::events::BusMessage;
    use crate::logic::features::DEFAULT_MODEL_FEATURES;
    use crate::logic::flow::FlowKey;
    use crate::logic::model::{
        AnomalyModel, ArtifactPaths, ClassifierModel, InferenceError, LabelDecoder,
    };

    const WAIT: Duration = Duration::from_millis(500);

    struct Harness {
        gateway: IngestionGateway,
        flows: Arc<FlowAggregator>,
        rate: Arc<RateMeter>,
        bus: Arc<EventBus>,
    }

    struct CountingAnomaly {
        features: Vec<String>,
        calls: Arc<AtomicUsize>,
        panics: bool,
    }

    impl AnomalyModel for CountingAnomaly {
        fn feature_names(&self) -> &[String] {
            &self.features
        }

        fn decision_score(&self, _row: &[f32]) -> Result<f32, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panics {
                panic!("backend crashed");
            }
            Ok(-0.9)
        }
    }

    struct BenignClassifier(Vec<String>);

    impl ClassifierModel for BenignClassifier {
        fn feature_names(&self) -> &[String] {
            &self.0
        }

        fn predict_class(&self, _row: &[f32]) -> Result<i64, InferenceError> {
            Ok(0)
        }
    }

    fn detection_config() -> DetectionConfig {
        DetectionConfig {
            thresholds: RuleThresholds::default(),
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            artifacts: ArtifactPaths {
                anomaly_model: "/nonexistent/a.onnx".into(),
                classifier_model: "/nonexistent/c.onnx".into(),
                label_decoder: "/nonexistent/l.json".into(),
            },
            benign_label: DEFAULT_BENIGN_LABEL.to_string(),
            signature_in_pipeline: false,
        }
    }

    fn harness(rate_interval: Duration) -> Harness {
        harness_with(DetectionEngine::rules_only(&detection_config()), rate_interval)
    }

    /// Engine with a scripted anomaly model; returns the model's call counter
    fn model_harness(panics: bool) -> (Harness, Arc<AtomicUsize>) {
        let features: Vec<String> = DEFAULT_MODEL_FEATURES.iter().map(|s| s.to_string()).collect();
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = DetectionEngine::with_models(
            &detection_config(),
            Box::new(CountingAnomaly { features: features.clone(), calls: Arc::clone(&calls), panics }),
            Box::new(BenignClassifier(features)),
            LabelDecoder::from_classes(vec!["BENIGN".into()]),
        );
        (harness_with(engine, Duration::from_secs(60)), calls)
    }

    fn harness_with(engine: DetectionEngine, rate_interval: Duration) -> Harness {
        let flows = Arc::new(FlowAggregator::new(Duration::from_secs(120)));
        let rate = Arc::new(RateMeter::new(rate_interval));
        let bus = Arc::new(EventBus::new(64));
        let engine = Arc::new(engine);

        Harness {
            gateway: IngestionGateway::new(Arc::clone(&flows), Arc::clone(&rate), engine, Arc::clone(&bus)),
            flows,
            rate,
            bus,
        }
    }

    fn flow_body(packet_rate: f64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": "network_flow",
            "len": 1500,
            "packet_rate": packet_rate,
            "byte_count": 180000,
            "src_bytes": 180000,
            "dst_bytes": 0,
            "flow_duration": 2.0,
            "flow_key": "1.2.3.4:1234-5.6.7.8:80"
        }))
        .unwrap()
    }

    /// Flow body carrying an explicit client-to-server direction
    fn directed_body(packet_rate: f64) -> Vec<u8> {
        let mut body = serde_json::from_slice::<serde_json::Value>(&flow_body(packet_rate)).unwrap();
        body["src"] = json!("1.2.3.4:1234");
        body["dst"] = json!("5.6.7.8:80");
        serde_json::to_vec(&body).unwrap()
    }

    async fn next(sub: &mut crate::logic::events::Subscription) -> BusMessage {
        timeout(WAIT, sub.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_flood_flow_publishes_critical_alert() {
        let h = harness(Duration::from_secs(60));
        let mut alerts = h.bus.subscribe(&[Channel::Alert]);

        let ack = h.gateway.submit(&flow_body(1500.0)).await.unwrap();
        assert_eq!(ack, Ack { kind: "network_flow", alerts: 1 });

        let msg = next(&mut alerts).await;
        assert_eq!(msg.data["severity"], "Critical");
        assert_eq!(msg.data["type"], "Rule-Based Alert");
        assert!(msg.data["details"].as_str().unwrap().contains("1.2.3.4:1234-5.6.7.8:80"));
    }

    #[tokio::test]
    async fn test_quiet_flow_is_acked_without_alerts() {
        let h = harness(Duration::from_secs(60));

        let ack = h.gateway.submit(&flow_body(500.0)).await.unwrap();
        assert_eq!(ack.alerts, 0);
        assert_eq!(h.rate.pending_bytes(), 1500);
    }

    #[tokio::test]
    async fn test_flow_updates_server_side_table() {
        let h = harness(Duration::from_secs(60));

        h.gateway.submit(&directed_body(500.0)).await.unwrap();
        h.gateway.submit(&directed_body(500.0)).await.unwrap();

        let key: FlowKey = "5.6.7.8:80-1.2.3.4:1234".parse().unwrap();
        let record = h.flows.get(&key).unwrap();
        assert_eq!(record.packet_count, 2);
        assert_eq!(record.src_bytes, 3000);
    }

    #[tokio::test]
    async fn test_server_reply_counts_as_destination_bytes() {
        let h = harness(Duration::from_secs(60));

        // 5.6.7.8:80 sorts second, yet it is the sender here
        let mut body = serde_json::from_slice::<serde_json::Value>(&flow_body(10.0)).unwrap();
        body["src"] = json!("5.6.7.8:80");
        body["dst"] = json!("1.2.3.4:1234");
        h.gateway.submit(&serde_json::to_vec(&body).unwrap()).await.unwrap();

        let key: FlowKey = "1.2.3.4:1234-5.6.7.8:80".parse().unwrap();
        let record = h.flows.get(&key).unwrap();
        assert_eq!(record.src_bytes, 0);
        assert_eq!(record.dst_bytes, 1500);
    }

    #[tokio::test]
    async fn test_flow_without_direction_skips_table() {
        let h = harness(Duration::from_secs(60));

        h.gateway.submit(&flow_body(500.0)).await.unwrap();
        assert!(h.flows.is_empty());
    }

    #[tokio::test]
    async fn test_reported_vector_is_scored_as_sent() {
        let (h, calls) = model_harness(false);

        // Agent row lacks packet_count and byte_rate; the table now has this flow too
        let ack = h.gateway.submit(&directed_body(500.0)).await.unwrap();
        h.gateway.submit(&directed_body(500.0)).await.unwrap();

        assert_eq!(ack.alerts, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.flows.len(), 1);
    }

    #[tokio::test]
    async fn test_scorer_panic_keeps_rule_alert() {
        let (h, calls) = model_harness(true);
        let mut alerts = h.bus.subscribe(&[Channel::Alert]);

        let mut body = serde_json::from_slice::<serde_json::Value>(&flow_body(1500.0)).unwrap();
        body["packet_count"] = json!(3000);
        body["byte_rate"] = json!(90000.0);
        let ack = h.gateway.submit(&serde_json::to_vec(&body).unwrap()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ack.alerts, 1);
        assert_eq!(next(&mut alerts).await.data["type"], "Rule-Based Alert");
    }

    #[tokio::test]
    async fn test_huge_lengths_are_accepted_repeatedly() {
        let h = harness(Duration::from_secs(60));

        let mut body = serde_json::from_slice::<serde_json::Value>(&directed_body(10.0)).unwrap();
        body["len"] = json!(1e20);
        let body = serde_json::to_vec(&body).unwrap();

        assert!(h.gateway.submit(&body).await.is_ok());
        assert!(h.gateway.submit(&body).await.is_ok());

        let key: FlowKey = "1.2.3.4:1234-5.6.7.8:80".parse().unwrap();
        assert_eq!(h.flows.get(&key).unwrap().byte_count, u64::MAX);
    }

    #[tokio::test]
    async fn test_invalid_payload_leaves_state_untouched() {
        let h = harness(Duration::ZERO);
        let mut all = h.bus.subscribe(&[]);

        let mut bad = serde_json::from_slice::<serde_json::Value>(&flow_body(1500.0)).unwrap();
        bad["src_bytes"] = json!("lots");
        let bad = serde_json::to_vec(&bad).unwrap();

        assert!(h.gateway.submit(&bad).await.is_err());
        assert!(h.gateway.submit(b"{").await.is_err());
        assert!(h.gateway.submit(br#"{"type": "unknown"}"#).await.is_err());

        assert_eq!(h.rate.pending_bytes(), 0);
        assert!(h.flows.is_empty());
        assert!(timeout(Duration::from_millis(50), all.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_throughput_published_when_window_closes() {
        let h = harness(Duration::ZERO);
        let mut traffic = h.bus.subscribe(&[Channel::Throughput]);

        h.gateway.submit(&flow_body(10.0)).await.unwrap();

        let msg = next(&mut traffic).await;
        assert!(msg.data["sent"].as_f64().unwrap() > 0.0);
        assert_eq!(msg.data["received"], 0.0);
        assert_eq!(h.rate.pending_bytes(), 0);
    }

    #[tokio::test]
    async fn test_system_metrics_forwarded_and_checked() {
        let h = harness(Duration::from_secs(60));
        let mut sub = h.bus.subscribe(&[]);

        let body = serde_json::to_vec(&json!({
            "type": "system_metrics",
            "metrics": {
                "cpu_usage": 99.0,
                "memory_usage": 61.0,
                "cpu_load": 3.2,
                "top_processes": [{"pid": 42, "name": "miner", "cpu_percent": 97.0, "memory_percent": 1.0}]
            }
        }))
        .unwrap();

        let ack = h.gateway.submit(&body).await.unwrap();
        assert_eq!(ack, Ack { kind: "system_metrics", alerts: 1 });

        let metrics = next(&mut sub).await;
        assert_eq!(metrics.event, Channel::Metrics);
        assert_eq!(metrics.data["top_processes"][0]["name"], "miner");

        let alert = next(&mut sub).await;
        assert_eq!(alert.event, Channel::Alert);
        assert_eq!(alert.data["severity"], "High");
    }

    #[tokio::test]
    async fn test_opaque_flow_key_still_detected() {
        let h = harness(Duration::from_secs(60));

        let mut body = serde_json::from_slice::<serde_json::Value>(&flow_body(2000.0)).unwrap();
        body["flow_key"] = json!("session-17");

        let ack = h.gateway.submit(&serde_json::to_vec(&body).unwrap()).await.unwrap();
        assert_eq!(ack.alerts, 1);
        assert!(h.flows.is_empty());
    }
}
