// # Google Cloud DNS Provider
//
// This crate provides a Google Cloud DNS zone client for gcdns.
//
// ## Behaviour
//
// - One HTTP request per zone operation (paged listings take one per page)
// - Full error propagation; no retry, no backoff (owned by the poll loop)
// - HTTP timeout configured (30 seconds)
// - Specific error handling for HTTP status codes (401/403, 404, 409, 412, 429, 5xx)
// - Dry-run mode for safe testing
// - Access tokens cached until shortly before expiry
//
// ## Security Requirements
//
// - The private key and access tokens NEVER appear in logs
// - Credentials are read from a service-account JSON key file only
// - Loading fails fast if the key is malformed
//
// ## API Reference
//
// - Cloud DNS API v1: https://cloud.google.com/dns/docs/reference/rest/v1
// - List managed zones: GET `/projects/:project/managedZones`
// - List record sets: GET `/projects/:project/managedZones/:zone/rrsets`
// - Apply a change: POST `/projects/:project/managedZones/:zone/changes`
// - Service-account auth: https://developers.google.com/identity/protocols/oauth2/service-account

pub mod client;
pub mod credentials;

pub use client::{CLOUD_DNS_API_BASE, CloudDnsClient};
pub use credentials::{CLOUD_DNS_SCOPE, ServiceAccountKey, TokenProvider};
