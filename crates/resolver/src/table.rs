use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chatrouter_core::{CommunityId, Route, RoutePattern};

/// An immutable, indexed snapshot of a community's routes (spec.md §4.2:
/// "Fetch the route table for the community (hot-cached, invalidated by
/// admin-plane versioning signal)"). Built once per version and shared
/// behind an `Arc` by [`RouteTableCache`].
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    exact: HashMap<String, Vec<usize>>,
    alias: HashMap<String, Vec<usize>>,
    /// Prefix patterns, longest-first so the first hit in iteration order is
    /// the longest-prefix match.
    prefixes: Vec<(String, usize)>,
    event_type: HashMap<String, Vec<usize>>,
    version: u64,
}

impl RouteTable {
    #[must_use]
    pub fn build(routes: Vec<Route>, version: u64) -> Self {
        let mut table = Self {
            version,
            ..Default::default()
        };
        for (idx, route) in routes.iter().enumerate() {
            match &route.pattern {
                RoutePattern::Exact { command } => {
                    table.exact.entry(command.clone()).or_default().push(idx);
                }
                RoutePattern::Alias { aliases } => {
                    for alias in aliases {
                        table.alias.entry(alias.clone()).or_default().push(idx);
                    }
                }
                RoutePattern::Prefix { prefix } => {
                    table.prefixes.push((prefix.clone(), idx));
                }
                RoutePattern::EventType { event_type } => {
                    table
                        .event_type
                        .entry(event_type.clone())
                        .or_default()
                        .push(idx);
                }
            }
        }
        // Longest-prefix-first, so a scan in order finds the most specific
        // prefix match before any shorter one.
        table.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        table.routes = routes;
        table
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub(crate) fn route(&self, idx: usize) -> &Route {
        &self.routes[idx]
    }

    pub(crate) fn exact_matches(&self, command: &str) -> &[usize] {
        self.exact.get(command).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn alias_matches(&self, command: &str) -> &[usize] {
        self.alias.get(command).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn prefix_matches(&self, command: &str) -> Vec<usize> {
        self.prefixes
            .iter()
            .filter(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, idx)| *idx)
            .collect()
    }

    pub(crate) fn event_type_matches(&self, event_type: &str) -> &[usize] {
        self.event_type.get(event_type).map_or(&[], Vec::as_slice)
    }
}

/// Per-community cache of the latest [`RouteTable`], invalidated lazily when
/// a higher version token is observed (spec.md §4.2 cache clause).
#[derive(Default)]
pub struct RouteTableCache {
    tables: dashmap::DashMap<CommunityId, std::sync::Arc<RouteTable>>,
    observed_version: dashmap::DashMap<CommunityId, AtomicU64>,
}

impl RouteTableCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the admin plane has published a new version for a
    /// community; does not itself rebuild the table, only marks it stale
    /// for the next `get_or_build` call.
    pub fn notify_version(&self, community: &CommunityId, version: u64) {
        self.observed_version
            .entry(community.clone())
            .and_modify(|v| {
                v.fetch_max(version, Ordering::SeqCst);
            })
            .or_insert_with(|| AtomicU64::new(version));
    }

    /// Return the cached table for `community` if it is at least as new as
    /// the latest observed version, otherwise rebuild it from `routes` and
    /// cache the result.
    pub fn get_or_build(
        &self,
        community: &CommunityId,
        version: u64,
        routes: impl FnOnce() -> Vec<Route>,
    ) -> std::sync::Arc<RouteTable> {
        if let Some(entry) = self.tables.get(community) {
            if entry.version() >= version {
                return entry.clone();
            }
        }
        let table = std::sync::Arc::new(RouteTable::build(routes(), version));
        self.tables.insert(community.clone(), table.clone());
        table
    }
}

#[cfg(test)]
mod tests {
    use chatrouter_core::{CachePolicy, RateLimitClass, RoutePattern, TargetSelection};

    use super::*;

    fn route(pattern: RoutePattern, priority: i32) -> Route {
        Route {
            id: "r1".into(),
            pattern,
            module: "weather".into(),
            required_scopes: vec![],
            rate_limit_class: RateLimitClass::Chatty,
            cache_policy: CachePolicy::disabled(),
            target_selection: TargetSelection::SameAsOrigin,
            priority,
            ordered: true,
        }
    }

    #[test]
    fn longest_prefix_sorts_first() {
        let table = RouteTable::build(
            vec![
                route(
                    RoutePattern::Prefix {
                        prefix: "!w".into(),
                    },
                    0,
                ),
                route(
                    RoutePattern::Prefix {
                        prefix: "!weather".into(),
                    },
                    0,
                ),
            ],
            1,
        );
        let matches = table.prefix_matches("!weather today");
        assert_eq!(matches.len(), 2);
        assert_eq!(table.route(matches[0]).pattern, RoutePattern::Prefix {
            prefix: "!weather".into(),
        });
    }

    #[test]
    fn cache_skips_rebuild_for_stale_version() {
        let cache = RouteTableCache::new();
        let community = CommunityId::new("c1");
        let mut build_calls = 0;
        cache.get_or_build(&community, 1, || {
            build_calls += 1;
            vec![]
        });
        cache.get_or_build(&community, 1, || {
            build_calls += 1;
            vec![]
        });
        assert_eq!(build_calls, 1);
    }
}
