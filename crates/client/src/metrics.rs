// Path: crates/client/src/metrics.rs
//! Metrics the plugin reports about itself.

use crate::remote::RemoteVm;
use async_trait::async_trait;
use plugvm_ipc::vm;
use plugvm_telemetry::Gatherer;
use plugvm_types::VmError;
use prometheus::proto;

fn metric_type(raw: i32) -> Result<proto::MetricType, VmError> {
    let kind = vm::MetricType::try_from(raw)
        .map_err(|_| VmError::Metrics(format!("unknown metric type {}", raw)))?;
    Ok(match kind {
        vm::MetricType::Counter => proto::MetricType::COUNTER,
        vm::MetricType::Gauge => proto::MetricType::GAUGE,
        vm::MetricType::Summary => proto::MetricType::SUMMARY,
        vm::MetricType::Untyped => proto::MetricType::UNTYPED,
        vm::MetricType::Histogram => proto::MetricType::HISTOGRAM,
    })
}

fn convert_metric(m: vm::Metric) -> proto::Metric {
    let mut out = proto::Metric::default();
    for pair in m.label {
        let mut label = proto::LabelPair::default();
        label.set_name(pair.name);
        label.set_value(pair.value);
        out.mut_label().push(label);
    }
    if let Some(g) = m.gauge {
        let mut gauge = proto::Gauge::default();
        gauge.set_value(g.value);
        out.set_gauge(gauge);
    }
    if let Some(c) = m.counter {
        let mut counter = proto::Counter::default();
        counter.set_value(c.value);
        out.set_counter(counter);
    }
    if let Some(s) = m.summary {
        let mut summary = proto::Summary::default();
        summary.set_sample_count(s.sample_count);
        summary.set_sample_sum(s.sample_sum);
        for q in s.quantile {
            let mut quantile = proto::Quantile::default();
            quantile.set_quantile(q.quantile);
            quantile.set_value(q.value);
            summary.mut_quantile().push(quantile);
        }
        out.set_summary(summary);
    }
    if let Some(u) = m.untyped {
        let mut untyped = proto::Untyped::default();
        untyped.set_value(u.value);
        out.set_untyped(untyped);
    }
    if let Some(h) = m.histogram {
        let mut histogram = proto::Histogram::default();
        histogram.set_sample_count(h.sample_count);
        histogram.set_sample_sum(h.sample_sum);
        for b in h.bucket {
            let mut bucket = proto::Bucket::default();
            bucket.set_cumulative_count(b.cumulative_count);
            bucket.set_upper_bound(b.upper_bound);
            histogram.mut_bucket().push(bucket);
        }
        out.set_histogram(histogram);
    }
    if m.timestamp_ms != 0 {
        out.set_timestamp_ms(m.timestamp_ms);
    }
    out
}

/// Converts families from the wire into the form the node's registry gathers.
pub fn convert_families(
    families: Vec<vm::MetricFamily>,
) -> Result<Vec<proto::MetricFamily>, VmError> {
    families
        .into_iter()
        .map(|f| {
            let mut family = proto::MetricFamily::default();
            family.set_field_type(metric_type(f.metric_type)?);
            family.set_name(f.name);
            family.set_help(f.help);
            for m in f.metric {
                family.mut_metric().push(convert_metric(m));
            }
            Ok(family)
        })
        .collect()
}

/// Gathers the plugin's self-reported metrics over `Gather`.
#[derive(Debug, Clone)]
pub struct PluginGatherer {
    vm: RemoteVm,
}

impl PluginGatherer {
    pub fn new(vm: RemoteVm) -> Self {
        Self { vm }
    }
}

#[async_trait]
impl Gatherer for PluginGatherer {
    async fn gather(&self) -> Result<Vec<proto::MetricFamily>, VmError> {
        let resp = self
            .vm
            .call("Gather", (), |mut c, req| async move { c.gather(req).await })
            .await?;
        convert_families(resp.metric_families)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_and_histograms_convert() {
        let families = vec![
            vm::MetricFamily {
                name: "requests".into(),
                help: "handled requests".into(),
                metric_type: vm::MetricType::Counter as i32,
                metric: vec![vm::Metric {
                    label: vec![vm::LabelPair {
                        name: "path".into(),
                        value: "/".into(),
                    }],
                    counter: Some(vm::Counter { value: 3.0 }),
                    ..Default::default()
                }],
            },
            vm::MetricFamily {
                name: "latency".into(),
                help: String::new(),
                metric_type: vm::MetricType::Histogram as i32,
                metric: vec![vm::Metric {
                    histogram: Some(vm::Histogram {
                        sample_count: 2,
                        sample_sum: 0.5,
                        bucket: vec![vm::Bucket {
                            cumulative_count: 2,
                            upper_bound: 1.0,
                        }],
                    }),
                    ..Default::default()
                }],
            },
        ];

        let out = convert_families(families).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get_name(), "requests");
        assert_eq!(out[0].get_field_type(), proto::MetricType::COUNTER);
        let metric = &out[0].get_metric()[0];
        assert_eq!(metric.get_label()[0].get_value(), "/");
        assert_eq!(metric.get_counter().get_value(), 3.0);

        assert_eq!(out[1].get_field_type(), proto::MetricType::HISTOGRAM);
        let hist = out[1].get_metric()[0].get_histogram();
        assert_eq!(hist.get_sample_count(), 2);
        assert_eq!(hist.get_bucket()[0].get_upper_bound(), 1.0);
    }

    #[test]
    fn unknown_metric_type_is_an_error() {
        let families = vec![vm::MetricFamily {
            name: "x".into(),
            help: String::new(),
            metric_type: 17,
            metric: vec![],
        }];
        assert!(matches!(convert_families(families), Err(VmError::Metrics(_))));
    }
}
