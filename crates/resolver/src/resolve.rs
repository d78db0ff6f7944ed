use std::collections::HashSet;

use chatrouter_core::{Event, EventKind, RouteBinding};

use crate::normalize::normalize_command;
use crate::table::RouteTable;

/// Resolve an event against a route table into an ordered, deduplicated
/// list of bindings (spec.md §4.2). An empty result is the `no-route` case:
/// the caller records an audit row and terminates successfully, it is not
/// an error.
#[must_use]
pub fn resolve(event: &Event, table: &RouteTable, command_prefixes: &[String]) -> Vec<RouteBinding> {
    match event.kind {
        EventKind::Command => resolve_command(event, table, command_prefixes),
        EventKind::Event => resolve_platform_event(event, table),
    }
}

fn resolve_command(
    event: &Event,
    table: &RouteTable,
    command_prefixes: &[String],
) -> Vec<RouteBinding> {
    let raw = event.text.as_deref().unwrap_or_default();
    let (token, context_text) = normalize_command(raw, command_prefixes);

    let mut candidates: Vec<usize> = Vec::new();
    candidates.extend_from_slice(table.exact_matches(&token));
    candidates.extend_from_slice(table.alias_matches(&token));
    candidates.extend(table.prefix_matches(&token));

    dedup_preserving_first(&mut candidates);
    // Ties broken by route priority, then by insertion order (spec.md §4.2
    // step 3). `sort_by_key` is stable, so equal priorities keep the
    // relative order candidates were discovered in, which already reflects
    // insertion order within each pattern kind.
    candidates.sort_by_key(|idx| table.route(*idx).priority);

    candidates
        .into_iter()
        .map(|idx| RouteBinding {
            route: table.route(idx).clone(),
            matched_command: token.clone(),
            context_text: context_text.clone(),
        })
        .collect()
}

fn resolve_platform_event(event: &Event, table: &RouteTable) -> Vec<RouteBinding> {
    let Some(event_type) = event.event_type.as_deref() else {
        return Vec::new();
    };
    let mut candidates: Vec<usize> = table.event_type_matches(event_type).to_vec();
    dedup_preserving_first(&mut candidates);
    candidates.sort_by_key(|idx| table.route(*idx).priority);

    candidates
        .into_iter()
        .map(|idx| RouteBinding {
            route: table.route(idx).clone(),
            matched_command: String::new(),
            context_text: String::new(),
        })
        .collect()
}

fn dedup_preserving_first(indices: &mut Vec<usize>) {
    let mut seen = HashSet::with_capacity(indices.len());
    indices.retain(|idx| seen.insert(*idx));
}

#[cfg(test)]
mod tests {
    use chatrouter_core::{
        CachePolicy, CommunityId, Principal, RateLimitClass, Route, RoutePattern, TargetSelection,
    };

    use super::*;
    use crate::table::RouteTable;

    fn route(id: &str, pattern: RoutePattern, priority: i32) -> Route {
        Route {
            id: id.into(),
            pattern,
            module: "weather".into(),
            required_scopes: vec![],
            rate_limit_class: RateLimitClass::Chatty,
            cache_policy: CachePolicy::disabled(),
            target_selection: TargetSelection::SameAsOrigin,
            priority,
            ordered: false,
        }
    }

    fn command_event(text: &str) -> Event {
        Event::new_command(
            CommunityId::new("c1"),
            "discord",
            "chan1",
            Principal {
                id: "u1".into(),
                username: "alice".into(),
                platform_user_id: "p1".into(),
            },
            text,
        )
    }

    #[test]
    fn exact_and_prefix_both_match_are_deduped_and_priority_ordered() {
        let table = RouteTable::build(
            vec![
                route(
                    "prefix-route",
                    RoutePattern::Prefix {
                        prefix: "weather".into(),
                    },
                    5,
                ),
                route(
                    "exact-route",
                    RoutePattern::Exact {
                        command: "weather".into(),
                    },
                    1,
                ),
            ],
            1,
        );
        let event = command_event("!weather London");
        let bindings = resolve_command(&event, &table, &["!".to_string()]);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].route.id, "exact-route");
        assert_eq!(bindings[0].context_text, "London");
    }

    #[test]
    fn no_match_yields_empty_bindings() {
        let table = RouteTable::build(vec![], 1);
        let event = command_event("!unknown arg");
        let bindings = resolve_command(&event, &table, &["!".to_string()]);
        assert!(bindings.is_empty());
    }

    #[test]
    fn alias_matches_resolve() {
        let table = RouteTable::build(
            vec![route(
                "alias-route",
                RoutePattern::Alias {
                    aliases: vec!["forecast".into()],
                },
                0,
            )],
            1,
        );
        let event = command_event("!forecast Paris");
        let bindings = resolve_command(&event, &table, &["!".to_string()]);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].route.id, "alias-route");
    }
}
