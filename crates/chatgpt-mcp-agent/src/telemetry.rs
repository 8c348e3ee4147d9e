// OpenTelemetry spans for chatgpt tool calls
// Only compiled in when the 'telemetry' feature is enabled

#[cfg(feature = "telemetry")]
pub use with_telemetry::*;

#[cfg(not(feature = "telemetry"))]
pub use without_telemetry::*;

use crate::dispatch::{Reply, ToolCall};
use chatgpt_bridge::BridgeError;

/// A span attribute value, independent of the exporter.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Count(i64),
    Flag(bool),
}

/// Attributes describing what a call asked for. Prompt text is never recorded,
/// only its length.
pub fn request_attributes(call: &ToolCall) -> Vec<(&'static str, AttrValue)> {
    let mut attrs = vec![(
        "chatgpt.operation",
        AttrValue::Text(call.operation().as_str().to_string()),
    )];
    match call {
        ToolCall::Ask(request) => {
            attrs.push(("chatgpt.prompt_chars", char_count(&request.prompt)));
            attrs.push((
                "chatgpt.search_like",
                AttrValue::Flag(request.kind().is_search()),
            ));
            attrs.push((
                "chatgpt.named_conversation",
                AttrValue::Flag(request.conversation().is_some()),
            ));
            attrs.push((
                "chatgpt.new_chat",
                AttrValue::Flag(request.should_start_new_chat()),
            ));
        }
        ToolCall::Search {
            query,
            conversation_id,
            ..
        } => {
            attrs.push(("chatgpt.prompt_chars", char_count(query)));
            attrs.push(("chatgpt.search_like", AttrValue::Flag(true)));
            let named = conversation_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty());
            attrs.push(("chatgpt.named_conversation", AttrValue::Flag(named)));
        }
        ToolCall::GetConversations => {}
    }
    attrs
}

/// Attributes describing how a call ended.
pub fn outcome_attributes(outcome: &Result<Reply, BridgeError>) -> Vec<(&'static str, AttrValue)> {
    match outcome {
        Ok(reply) => {
            let mut attrs = vec![
                ("chatgpt.success", AttrValue::Flag(true)),
                ("chatgpt.reply_chars", char_count(&reply.text)),
            ];
            if let Some(complete) = reply.complete {
                attrs.push(("chatgpt.complete", AttrValue::Flag(complete)));
            }
            attrs
        }
        Err(e) => {
            let message = e.to_string();
            vec![
                ("chatgpt.success", AttrValue::Flag(false)),
                ("error.type", AttrValue::Text(classify_error(&message).to_string())),
                ("error.message", AttrValue::Text(message)),
            ]
        }
    }
}

fn char_count(text: &str) -> AttrValue {
    AttrValue::Count(i64::try_from(text.chars().count()).unwrap_or(i64::MAX))
}

/// Buckets an error message into a coarse `error.type` attribute.
pub fn classify_error(error: &str) -> &'static str {
    let lower = error.to_lowercase();
    if lower.contains("cannot access") || lower.contains("not running") {
        "app_unavailable"
    } else if lower.contains("injection") || lower.contains("clipboard") {
        "injection_failed"
    } else if lower.contains("scrape") {
        "scrape_failed"
    } else if lower.contains("invalid") || lower.contains("required") {
        "validation_error"
    } else if lower.contains("osascript") || lower.contains("platform") {
        "platform_error"
    } else {
        "other"
    }
}

#[cfg(feature = "telemetry")]
mod with_telemetry {
    use super::{outcome_attributes, request_attributes, AttrValue};
    use crate::dispatch::{Reply, ToolCall, TOOL_NAME};
    use chatgpt_bridge::BridgeError;
    use opentelemetry::global::BoxedSpan;
    use opentelemetry::{
        global,
        trace::{Span, SpanKind, Status, Tracer},
        KeyValue,
    };
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{
        propagation::TraceContextPropagator, runtime, trace::TracerProvider as SdkTracerProvider,
        Resource,
    };
    use opentelemetry_semantic_conventions::{
        attribute::{SERVICE_NAME, SERVICE_VERSION},
        SCHEMA_URL,
    };
    use std::time::{Duration, Instant};
    use tracing::info;

    /// One span per `chatgpt` tool call, named after the operation.
    pub struct ToolCallSpan {
        span: BoxedSpan,
        started: Instant,
    }

    impl ToolCallSpan {
        pub fn start(call: &ToolCall) -> Self {
            let tracer = global::tracer("chatgpt-mcp");
            let mut span = tracer
                .span_builder(format!("{TOOL_NAME}.{}", call.operation().as_str()))
                .with_kind(SpanKind::Server)
                .start(&tracer);
            span.set_attribute(KeyValue::new(
                "chatgpt.started_at",
                chrono::Utc::now().to_rfc3339(),
            ));
            for (key, value) in request_attributes(call) {
                span.set_attribute(key_value(key, value));
            }
            Self {
                span,
                started: Instant::now(),
            }
        }

        pub fn finish(mut self, outcome: &Result<Reply, BridgeError>) {
            let elapsed_ms = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
            self.span
                .set_attribute(KeyValue::new("chatgpt.elapsed_ms", elapsed_ms));
            for (key, value) in outcome_attributes(outcome) {
                self.span.set_attribute(key_value(key, value));
            }
            let status = match outcome {
                Ok(_) => Status::Ok,
                Err(e) => Status::error(e.to_string()),
            };
            self.span.set_status(status);
            self.span.end();
        }
    }

    fn key_value(key: &'static str, value: AttrValue) -> KeyValue {
        match value {
            AttrValue::Text(text) => KeyValue::new(key, text),
            AttrValue::Count(count) => KeyValue::new(key, count),
            AttrValue::Flag(flag) => KeyValue::new(key, flag),
        }
    }

    pub fn init_telemetry() -> anyhow::Result<()> {
        // Users must opt in via OTEL_SDK_ENABLED=true
        let telemetry_enabled = std::env::var("OTEL_SDK_ENABLED")
            .unwrap_or_default()
            .eq_ignore_ascii_case("true");

        if !telemetry_enabled {
            info!("OpenTelemetry is disabled by default (set OTEL_SDK_ENABLED=true to enable)");
            return Ok(());
        }

        let is_ci = std::env::var("CI").unwrap_or_default() == "true"
            || std::env::var("GITHUB_ACTIONS").unwrap_or_default() == "true";
        if is_ci {
            info!("Running in CI environment, disabling OpenTelemetry");
            return Ok(());
        }

        global::set_text_map_propagator(TraceContextPropagator::new());

        let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4318".to_string());
        info!("Initializing OpenTelemetry with endpoint: {}", otlp_endpoint);

        let mut resource_kvs = vec![
            KeyValue::new(SERVICE_NAME, "chatgpt-mcp-agent"),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            KeyValue::new("os.type", std::env::consts::OS),
            KeyValue::new("os.arch", std::env::consts::ARCH),
        ];
        if let Ok(hostname) = hostname::get() {
            if let Some(hostname_str) = hostname.to_str() {
                resource_kvs.push(KeyValue::new("host.name", hostname_str.to_string()));
            }
        }
        let resource = Resource::from_schema_url(resource_kvs, SCHEMA_URL);

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(format!("{otlp_endpoint}/v1/traces"))
            .with_timeout(Duration::from_millis(500))
            .build()?;

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_resource(resource)
            .build();

        global::set_tracer_provider(provider);

        info!("OpenTelemetry telemetry initialized successfully");
        Ok(())
    }

    pub fn shutdown_telemetry() {
        global::shutdown_tracer_provider();
    }
}

#[cfg(not(feature = "telemetry"))]
mod without_telemetry {
    use crate::dispatch::{Reply, ToolCall};
    use chatgpt_bridge::BridgeError;
    use tracing::debug;

    pub struct ToolCallSpan;

    impl ToolCallSpan {
        pub fn start(_call: &ToolCall) -> Self {
            ToolCallSpan
        }

        pub fn finish(self, _outcome: &Result<Reply, BridgeError>) {}
    }

    pub fn init_telemetry() -> anyhow::Result<()> {
        Ok(())
    }

    pub fn shutdown_telemetry() {
        debug!("Telemetry disabled: shutdown_telemetry (no-op)");
    }
}
