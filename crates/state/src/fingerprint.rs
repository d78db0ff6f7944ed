use std::hash::{Hash, Hasher};

use chatrouter_core::{CommunityId, ModuleId};

/// Compute the cache fingerprint for a dispatch (spec.md §4.5: "Stable hash
/// over `(community, module, command, normalized-args, principal-role-bucket)`
/// -- specifically excludes principal id unless the route declares
/// user-scoped caching").
#[must_use]
pub fn compute_fingerprint(
    community: &CommunityId,
    module: &ModuleId,
    command: &str,
    normalized_args: &str,
    principal_role_bucket: &str,
    user_scoped_principal_id: Option<&str>,
) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    community.as_str().hash(&mut hasher);
    module.as_str().hash(&mut hasher);
    command.hash(&mut hasher);
    normalized_args.hash(&mut hasher);
    principal_role_bucket.hash(&mut hasher);
    if let Some(principal_id) = user_scoped_principal_id {
        principal_id.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}
