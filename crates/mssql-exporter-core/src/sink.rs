//! Typed metric sample model and the emission boundary.

use std::sync::Mutex;

/// Exposed metric shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Point-in-time value.
    Gauge,
    /// Monotonic cumulative value; consumers compute rates.
    Counter,
}

/// One fully-labeled metric sample.
///
/// Label names are fixed per metric; `label_values` is positional and must
/// match `label_names` in length and order.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub help: &'static str,
    pub label_names: &'static [&'static str],
    pub label_values: Vec<String>,
    pub kind: MetricKind,
    pub value: f64,
}

/// Sink receiving typed samples from scrape units.
pub trait MetricSink: Send + Sync {
    fn emit(&self, sample: Sample);
}

/// In-process collecting sink; drained once per scrape by the exposition layer.
#[derive(Debug, Default)]
pub struct BufferSink {
    samples: Mutex<Vec<Sample>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains all buffered samples.
    pub fn take(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.samples.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricSink for BufferSink {
    fn emit(&self, sample: Sample) {
        self.samples.lock().unwrap().push(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> Sample {
        Sample {
            name: name.to_string(),
            help: "test",
            label_names: &["a"],
            label_values: vec!["x".to_string()],
            kind: MetricKind::Gauge,
            value: 1.0,
        }
    }

    #[test]
    fn take_drains_the_buffer() {
        let sink = BufferSink::new();
        sink.emit(sample("one"));
        sink.emit(sample("two"));
        assert_eq!(sink.len(), 2);

        let drained = sink.take();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].name, "one");
        assert!(sink.is_empty());
    }
}
