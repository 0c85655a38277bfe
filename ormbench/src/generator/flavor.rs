/// Benchmark endpoint exposed by each backend flavor.
const BENCHMARK_ENDPOINTS: [(&str, &str); 3] = [
    ("sqlalchemy_v2", "/benchmark/sync-to-async"),
    ("tortoise", "/benchmark/native-async"),
    ("edgedb", "/benchmark/edgedb-native"),
];

/// Returns `None` for flavors without a known benchmark endpoint; callers skip the operation.
pub fn benchmark_endpoint(flavor: &str) -> Option<&'static str> {
    BENCHMARK_ENDPOINTS
        .iter()
        .find(|(tag, _)| *tag == flavor)
        .map(|(_, endpoint)| *endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_flavors_map_to_endpoints() {
        assert_eq!(
            benchmark_endpoint("sqlalchemy_v2"),
            Some("/benchmark/sync-to-async")
        );
        assert_eq!(benchmark_endpoint("tortoise"), Some("/benchmark/native-async"));
        assert_eq!(benchmark_endpoint("edgedb"), Some("/benchmark/edgedb-native"));
    }

    #[test]
    fn unknown_flavor_has_no_endpoint() {
        assert_eq!(benchmark_endpoint(ormbench_core::UNKNOWN_FLAVOR), None);
        assert_eq!(benchmark_endpoint("sqlalchemy"), None);
        assert_eq!(benchmark_endpoint(""), None);
    }
}
