//! HTTP middleware stack for the API Gateway

pub mod cors;
pub mod ip_extractor;
pub mod metrics;
pub mod request_id;
pub mod security_headers;

pub use cors::cors;
pub use metrics::{metrics_handler, PrometheusMetrics};
pub use request_id::RequestId;
pub use security_headers::SecurityHeaders;
