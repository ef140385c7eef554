// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

/// Last path segment of a resource URL.
pub fn resource_id(resource_url: &str) -> &str {
    let trimmed = resource_url.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Browser page of an instance on the cloud's web console.
pub fn page_url(endpoint_url: &str, resource_url: &str) -> String {
    format!(
        "{}/#/instances/{}",
        endpoint_url.trim_end_matches('/'),
        resource_id(resource_url)
    )
}

/// True when `resource_url` lives under `endpoint_url` at a path boundary.
pub fn belongs_to_endpoint(resource_url: &str, endpoint_url: &str) -> bool {
    let endpoint = endpoint_url.trim_end_matches('/');
    if endpoint.is_empty() {
        return false;
    }
    match resource_url.strip_prefix(endpoint) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
