//! Wavefront line protocol output
//!
//! One line per data point:
//!
//! ```text
//! <metric> <value> <timestamp> source=<source> [<key>=<value> ...]
//! ```
//!
//! The timestamp is in epoch seconds and tags are written in key order.
//! Empty fields and fields containing whitespace, control characters, `=`,
//! `"` or `\` are double-quoted. Inside quotes `\` and `"` are
//! backslash-escaped and line breaks are written as `\n` and `\r`, so a
//! point always stays on one line.

use crate::error::{EmitError, FormatError};
use crate::identity::CanonicalName;
use crate::sink::MetricSink;
use crate::stat::StatKind;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::warn;

/// One value ready to be written to the proxy
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Metric name as written on the wire
    pub metric: String,
    pub statistic: StatKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub tags: BTreeMap<String, String>,
}

/// How emitted metric names are built from canonical names
#[derive(Debug, Clone, Default)]
pub struct MetricNaming {
    pub prefix: String,
    /// Leave off the statistic suffix when a rule asks for one statistic
    pub no_suffix_for_single: bool,
}

impl MetricNaming {
    /// `prefix` + canonical name + `.` + short statistic name
    pub fn name(&self, canonical: &CanonicalName, statistic: StatKind, rule_stats: usize) -> String {
        if self.no_suffix_for_single && rule_stats == 1 {
            format!("{}{}", self.prefix, canonical)
        } else {
            format!("{}{}.{}", self.prefix, canonical, statistic.short_name())
        }
    }
}

/// Format one data point as a protocol line, without the trailing newline.
pub fn format_line(point: &DataPoint) -> Result<String, FormatError> {
    if !point.value.is_finite() {
        return Err(FormatError::NonFinite {
            metric: point.metric.clone(),
            value: point.value,
        });
    }

    let mut line = String::new();
    // Writing to a String cannot fail
    let _ = write!(
        line,
        "{} {} {} source={}",
        quote(&point.metric),
        point.value,
        point.timestamp.timestamp(),
        quote(&point.source)
    );
    for (key, value) in &point.tags {
        let _ = write!(line, " {}={}", quote(key), quote(value));
    }
    Ok(line)
}

fn quote(field: &str) -> String {
    let needs_quotes = field.is_empty()
        || field
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '=' | '"' | '\\'));
    if !needs_quotes {
        return field.to_string();
    }

    let mut out = String::with_capacity(field.len() + 2);
    out.push('"');
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:04x}}}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Writes data points to a sink, counting emitted and rejected points
pub struct MetricEmitter<'a, S> {
    sink: &'a mut S,
    emitted: usize,
    rejected: usize,
}

impl<'a, S: MetricSink> MetricEmitter<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            emitted: 0,
            rejected: 0,
        }
    }

    /// Write one point.
    ///
    /// Points that cannot be formatted are logged and counted as rejected;
    /// only sink failures are returned as errors.
    pub async fn emit(&mut self, point: &DataPoint) -> Result<(), EmitError> {
        match format_line(point) {
            Ok(line) => {
                self.sink.write_line(&line).await?;
                self.emitted += 1;
            }
            Err(e) => {
                warn!(error = %e, "Rejected data point");
                self.rejected += 1;
            }
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), EmitError> {
        self.sink.flush().await
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(metric: &str, value: f64) -> DataPoint {
        DataPoint {
            metric: metric.to_string(),
            statistic: StatKind::Average,
            value,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            source: "my-lb".to_string(),
            tags: BTreeMap::new(),
        }
    }

    #[derive(Default)]
    struct VecSink {
        lines: Vec<String>,
        flushed: bool,
    }

    impl MetricSink for VecSink {
        async fn write_line(&mut self, line: &str) -> Result<(), EmitError> {
            self.lines.push(line.to_string());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), EmitError> {
            self.flushed = true;
            Ok(())
        }
    }

    #[test]
    fn test_plain_line() {
        assert_eq!(
            format_line(&point("aws.elb.latency", 12.5)).unwrap(),
            "aws.elb.latency 12.5 1700000000 source=my-lb"
        );
    }

    #[test]
    fn test_tags_in_key_order() {
        let mut p = point("aws.elb.requestcount.sum", 3.0);
        p.tags.insert("Namespace".to_string(), "AWS/ELB".to_string());
        p.tags.insert("AvailabilityZone".to_string(), "us-east-2a".to_string());
        assert_eq!(
            format_line(&p).unwrap(),
            "aws.elb.requestcount.sum 3 1700000000 source=my-lb AvailabilityZone=us-east-2a Namespace=AWS/ELB"
        );
    }

    #[test]
    fn test_quoting() {
        let mut p = point("aws.custom.queue depth", 1.0);
        p.source = "say \"hi\"".to_string();
        p.tags.insert("Key=1".to_string(), "a b".to_string());
        p.tags.insert("empty".to_string(), String::new());
        assert_eq!(
            format_line(&p).unwrap(),
            r#""aws.custom.queue depth" 1 1700000000 source="say \"hi\"" "Key=1"="a b" empty="""#
        );
    }

    #[test]
    fn test_line_breaks_cannot_start_a_new_line() {
        let mut p = point("m", 1.0);
        p.source = "s".to_string();
        p.tags
            .insert("QueueName".to_string(), "a\nfake.metric 1 1 source=x".to_string());
        let line = format_line(&p).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(
            line,
            r#"m 1 1700000000 source=s QueueName="a\nfake.metric 1 1 source=x""#
        );

        p.tags.clear();
        p.source = "a\r\u{7}b".to_string();
        assert_eq!(
            format_line(&p).unwrap(),
            r#"m 1 1700000000 source="a\r\u{0007}b""#
        );
    }

    #[test]
    fn test_backslash_cannot_escape_closing_quote() {
        let mut p = point("m", 1.0);
        p.source = "dir\\".to_string();
        p.tags.insert("path".to_string(), r"C:\temp".to_string());
        assert_eq!(
            format_line(&p).unwrap(),
            r#"m 1 1700000000 source="dir\\" path="C:\\temp""#
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                format_line(&point("m", value)),
                Err(FormatError::NonFinite { .. })
            ));
        }
    }

    #[test]
    fn test_naming() {
        let canonical = CanonicalName::new("AWS/ELB", "Latency");
        let naming = MetricNaming {
            prefix: "prod.".to_string(),
            no_suffix_for_single: false,
        };
        assert_eq!(naming.name(&canonical, StatKind::Maximum, 2), "prod.aws.elb.latency.max");
        assert_eq!(naming.name(&canonical, StatKind::SampleCount, 1), "prod.aws.elb.latency.count");

        let bare = MetricNaming {
            prefix: String::new(),
            no_suffix_for_single: true,
        };
        assert_eq!(bare.name(&canonical, StatKind::Average, 1), "aws.elb.latency");
        assert_eq!(bare.name(&canonical, StatKind::Average, 2), "aws.elb.latency.avg");
    }

    #[tokio::test]
    async fn test_emitter_counts_and_flushes() {
        let mut sink = VecSink::default();
        let mut emitter = MetricEmitter::new(&mut sink);

        emitter.emit(&point("a", 1.0)).await.unwrap();
        emitter.emit(&point("b", f64::NAN)).await.unwrap();
        emitter.emit(&point("c", 2.0)).await.unwrap();
        emitter.flush().await.unwrap();

        assert_eq!(emitter.emitted(), 2);
        assert_eq!(emitter.rejected(), 1);
        assert!(sink.flushed);
        assert_eq!(sink.lines.len(), 2);
        assert!(sink.lines[1].starts_with("c 2 "));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any finite point formats to a single line with the metric first
            #[test]
            fn format_is_single_line(
                metric in "[a-z.]{1,20}",
                value in -1e12f64..1e12,
                secs in 0i64..4_000_000_000,
                source in any::<String>(),
                tags in prop::collection::btree_map(any::<String>(), any::<String>(), 0..4)
            ) {
                let p = DataPoint {
                    metric: metric.clone(),
                    statistic: StatKind::Sum,
                    value,
                    timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
                    source,
                    tags,
                };
                let line = format_line(&p).unwrap();
                prop_assert!(!line.contains('\n'));
                prop_assert!(!line.contains('\r'));
                prop_assert!(line.starts_with(&metric));
                let needle = format!(" {secs} ");
                prop_assert!(line.contains(&needle));
            }

            /// Formatting never panics, finite or not
            #[test]
            fn format_never_panics(value in any::<f64>(), source in ".*") {
                let mut p = DataPoint {
                    metric: "m".to_string(),
                    statistic: StatKind::Sum,
                    value,
                    timestamp: Utc.timestamp_opt(0, 0).unwrap(),
                    source,
                    tags: BTreeMap::new(),
                };
                let _ = format_line(&p);
                p.value = f64::NAN;
                prop_assert!(format_line(&p).is_err());
            }
        }
    }
}
