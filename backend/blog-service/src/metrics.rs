//! Prometheus metrics for blog-service.
//!
//! Collectors are process-global and registered on first use; `/metrics`
//! renders them in text format.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    /// Feed pages served by audience (global, group, profile, follow).
    pub static ref FEED_REQUEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_feed_request_total",
        "Feed pages served segmented by audience",
        &["audience"]
    )
    .expect("failed to register blog_feed_request_total");

    /// Content mutations by kind (post/comment) and action (create/edit/delete).
    pub static ref CONTENT_MUTATION_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_content_mutation_total",
        "Applied content mutations segmented by kind and action",
        &["kind", "action"]
    )
    .expect("failed to register blog_content_mutation_total");

    /// Mutations refused by the ownership guard.
    pub static ref OWNERSHIP_DENIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_ownership_denied_total",
        "Mutations refused because the actor is not the author",
        &["kind", "action"]
    )
    .expect("failed to register blog_ownership_denied_total");

    /// Follow graph changes by outcome.
    pub static ref FOLLOW_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_follow_events_total",
        "Follow and unfollow requests segmented by outcome",
        &["event"]
    )
    .expect("failed to register blog_follow_events_total");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
