//! Tracing layer for JSONL output.
//!
//! Each event becomes one JSON object on its own line:
//! `{"ts", "level", "event", "message", "entity"?, "fields"?}`.
//! An `entity` recorded on an enclosing span is copied onto every event
//! inside it.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Entity name carried by a span.
#[derive(Debug, Clone)]
struct SpanEntity(String);

/// Collects event fields into a JSON map.
#[derive(Default)]
struct JsonFieldVisitor {
    fields: Map<String, Value>,
    message: Option<String>,
}

impl JsonFieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON number form.
        let v = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.insert(field, v);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }
}

/// Picks `entity` out of span attributes.
#[derive(Default)]
struct EntityVisitor(Option<String>);

impl Visit for EntityVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "entity" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "entity" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

/// JSONL tracing layer.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    /// A layer writing to stderr.
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// A layer writing to `writer`.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = EntityVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(entity), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(SpanEntity(entity));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let span_entity = ctx.event_scope(event).and_then(|scope| {
            scope
                .filter_map(|span| span.extensions().get::<SpanEntity>().map(|e| e.0.clone()))
                .next()
        });

        let mut obj = Map::new();
        obj.insert("ts".into(), Value::String(Utc::now().to_rfc3339()));
        obj.insert(
            "level".into(),
            Value::String(event.metadata().level().as_str().to_lowercase()),
        );
        obj.insert(
            "event".into(),
            Value::String(event.metadata().target().to_string()),
        );
        if let Some(msg) = visitor.message {
            obj.insert("message".into(), Value::String(msg));
        }
        if !visitor.fields.contains_key("entity") {
            if let Some(entity) = span_entity {
                obj.insert("entity".into(), Value::String(entity));
            }
        }
        if !visitor.fields.is_empty() {
            obj.insert("fields".into(), Value::Object(visitor.fields));
        }

        let line = Value::Object(obj).to_string();
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(writer, "{line}");
    }
}
