//! # Prometheus Metrics — Endpoint Exposition
//!
//! Operational metrics for the write endpoint in the Prometheus text
//! exposition format, served on `/metrics`.
//!
//! ## Metrics Exposed
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `lifeflow_writes_total` | Counter | `action`, `outcome` | Write envelopes handled |
//! | `lifeflow_http_request_duration_seconds` | Histogram | `method`, `path` | Request latency |
//! | `lifeflow_donor_rows` | Gauge | — | Data rows in the donor sheet |
//! | `lifeflow_inventory_units` | Gauge | `product` | Units on hand per product |
//!
//! Gauges are refreshed after every successful write and on each scrape.

use crate::records::InventoryRecord;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Label set for write outcomes. `outcome` is `ok` or `error`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct WriteLabel {
    pub action: String,
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub path: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct ProductLabel {
    pub product: String,
}

fn latency_histogram() -> Histogram {
    Histogram::new(exponential_buckets(0.001, 2.0, 14))
}

/// Thread-safe metrics registry for the endpoint.
pub struct Metrics {
    pub registry: Registry,
    pub writes: Family<WriteLabel, Counter>,
    pub http_request_duration: Family<HttpLabel, Histogram, fn() -> Histogram>,
    pub donor_rows: Gauge,
    pub inventory_units: Family<ProductLabel, Gauge>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let writes = Family::<WriteLabel, Counter>::default();
        registry.register(
            "lifeflow_writes",
            "Write envelopes handled by action and outcome",
            writes.clone(),
        );

        let http_request_duration =
            Family::<HttpLabel, Histogram, fn() -> Histogram>::new_with_constructor(
                latency_histogram,
            );
        registry.register(
            "lifeflow_http_request_duration_seconds",
            "HTTP request latency by method and normalized path",
            http_request_duration.clone(),
        );

        let donor_rows = Gauge::default();
        registry.register(
            "lifeflow_donor_rows",
            "Data rows in the donor sheet",
            donor_rows.clone(),
        );

        let inventory_units = Family::<ProductLabel, Gauge>::default();
        registry.register(
            "lifeflow_inventory_units",
            "Units on hand per blood product",
            inventory_units.clone(),
        );

        Self {
            registry,
            writes,
            http_request_duration,
            donor_rows,
            inventory_units,
        }
    }

    pub fn record_write(&self, action: &str, ok: bool) {
        self.writes
            .get_or_create(&WriteLabel {
                action: action.to_string(),
                outcome: if ok { "ok" } else { "error" }.to_string(),
            })
            .inc();
    }

    pub fn observe_sheets(&self, donor_rows: usize, inventory: &InventoryRecord) {
        self.donor_rows.set(donor_rows as i64);
        for (product, units) in [
            ("blood", inventory.blood_units_available),
            ("plasma", inventory.plasma_units_available),
            ("platelets", inventory.platelet_units_available),
        ] {
            self.inventory_units
                .get_or_create(&ProductLabel {
                    product: product.to_string(),
                })
                .set(units as i64);
        }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        if let Err(e) = encode(&mut buf, &self.registry) {
            tracing::warn!(error = %e, "metrics encoding failed");
        }
        buf
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
