//! Metric identities and canonical names

/// Canonical metric name: lowercase namespace with `/` replaced by `.`,
/// followed by `.` and the lowercase metric name.
///
/// This newtype keeps canonical names from being mixed up with raw
/// CloudWatch namespaces or metric names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display, derive_more::Deref)]
pub struct CanonicalName(String);

impl CanonicalName {
    /// Build the canonical name for a namespace and metric name.
    ///
    /// ```
    /// use cwbridge_core::CanonicalName;
    ///
    /// let name = CanonicalName::new("AWS/ELB", "Latency");
    /// assert_eq!(name.as_str(), "aws.elb.latency");
    /// ```
    pub fn new(namespace: &str, name: &str) -> Self {
        let namespace = namespace.replace('/', ".").to_lowercase();
        Self(format!("{}.{}", namespace, name.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A key-value tag attached to a metric by CloudWatch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One metric as returned by the enumeration API.
///
/// Immutable once constructed; the canonical name is computed up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricIdentity {
    namespace: String,
    name: String,
    dimensions: Vec<Dimension>,
    canonical: CanonicalName,
}

impl MetricIdentity {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        dimensions: Vec<Dimension>,
    ) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        let canonical = CanonicalName::new(&namespace, &name);
        Self {
            namespace,
            name,
            dimensions,
            canonical,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dimensions in the order the API returned them
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn canonical_name(&self) -> &CanonicalName {
        &self.canonical
    }

    /// Look up a dimension value by key
    pub fn dimension(&self, key: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|d| d.name == key)
            .map(|d| d.value.as_str())
    }
}

impl std::fmt::Display for MetricIdentity {
    /// Canonical name followed by the dimensions, e.g.
    /// `aws.elb.latency{LoadBalancerName=a, AvailabilityZone=b}`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical)?;
        if self.dimensions.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, d) in self.dimensions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", d.name, d.value)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        assert_eq!(
            CanonicalName::new("AWS/ApplicationELB", "TargetResponseTime").as_str(),
            "aws.applicationelb.targetresponsetime"
        );
        assert_eq!(CanonicalName::new("Custom", "Hits").as_str(), "custom.hits");
        assert_eq!(CanonicalName::new("A/B/C", "x").to_string(), "a.b.c.x");
    }

    #[test]
    fn test_identity_accessors() {
        let id = MetricIdentity::new(
            "AWS/ELB",
            "Latency",
            vec![
                Dimension::new("LoadBalancerName", "my-lb"),
                Dimension::new("AvailabilityZone", "us-east-2a"),
            ],
        );

        assert_eq!(id.namespace(), "AWS/ELB");
        assert_eq!(id.name(), "Latency");
        assert_eq!(&**id.canonical_name(), "aws.elb.latency");
        assert_eq!(id.dimension("LoadBalancerName"), Some("my-lb"));
        assert_eq!(id.dimension("Service"), None);
    }

    #[test]
    fn test_identity_equality_includes_dimensions() {
        let a = MetricIdentity::new("AWS/ELB", "Latency", vec![Dimension::new("k", "v")]);
        let b = MetricIdentity::new("AWS/ELB", "Latency", vec![Dimension::new("k", "v")]);
        let c = MetricIdentity::new("AWS/ELB", "Latency", vec![Dimension::new("k", "w")]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_identity_display_includes_dimensions() {
        let bare = MetricIdentity::new("AWS/SQS", "NumberOfMessagesSent", vec![]);
        assert_eq!(bare.to_string(), "aws.sqs.numberofmessagessent");

        let id = MetricIdentity::new(
            "AWS/ELB",
            "Latency",
            vec![
                Dimension::new("LoadBalancerName", "a"),
                Dimension::new("AvailabilityZone", "us-east-2a"),
            ],
        );
        assert_eq!(id.to_string(), "aws.elb.latency{LoadBalancerName=a, AvailabilityZone=us-east-2a}");
    }
}
