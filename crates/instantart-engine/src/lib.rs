pub mod config;
pub mod gateway;
pub mod media;
mod studio;

use chrono::Utc;

pub use config::{GatewayConfig, Secret};
pub use gateway::{
    build_gateway, handle_relay_request, GatewayError, GatewayImage, GatewayKind,
    GenerationGateway, RelayResponse, SourceImage,
};
pub use studio::{image_bytes, Studio};

/// Sortable session id: UTC start time plus a short random suffix.
pub fn new_session_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S"), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::new_session_id;

    #[test]
    fn session_ids_are_unique_and_timestamped() {
        let first = new_session_id();
        let second = new_session_id();
        assert_ne!(first, second);
        assert_eq!(first.len(), "20260101T000000-".len() + 8);
        assert_eq!(first.as_bytes()[8], b'T');
    }
}
