//! Track search on behalf of a room.

use std::sync::Arc;

use super::token_manager::TokenManager;
use crate::error::{TunepoolError, TunepoolResult};
use crate::provider::{ProviderApi, TrackSummary};

pub struct Catalog {
    provider: Arc<dyn ProviderApi>,
    tokens: Arc<TokenManager>,
    limit: u32,
}

impl Catalog {
    pub fn new(provider: Arc<dyn ProviderApi>, tokens: Arc<TokenManager>, limit: u32) -> Self {
        Self {
            provider,
            tokens,
            limit,
        }
    }

    /// Searches tracks using the room's credentials.
    ///
    /// # Errors
    /// * [`TunepoolError::InvalidRequest`] if `query` is blank
    /// * [`TunepoolError::RoomNotFound`] if the room does not exist
    pub async fn search(&self, room: &str, query: &str) -> TunepoolResult<Vec<TrackSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(TunepoolError::InvalidRequest(
                "search query must not be empty".to_string(),
            ));
        }

        let provider = &self.provider;
        let limit = self.limit;
        let tracks = self
            .tokens
            .call_with_token(room, move |token| async move {
                provider.search_tracks(&token, query, limit).await
            })
            .await?;

        log::debug!(
            "[Catalog] '{}' in room '{}' matched {} track(s)",
            query,
            room,
            tracks.len()
        );
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::test_support::room_with_queue;
    use crate::services::test_support::Harness;

    fn track(id: &str) -> TrackSummary {
        TrackSummary {
            id: id.into(),
            uri: format!("spotify:track:{id}"),
            title: format!("Song {id}"),
            description: "Artist".into(),
            image: String::new(),
            length: 200_000,
        }
    }

    #[tokio::test]
    async fn search_uses_configured_limit_and_trimmed_query() {
        let h = Harness::new(vec![room_with_queue("lobby", vec![])]);
        h.provider
            .set_tracks((0..8).map(|i| track(&i.to_string())).collect());

        let results = h.catalog.search("lobby", "  daft punk ").await.unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(h.provider.searches(), vec![("daft punk".to_string(), 5)]);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let h = Harness::new(vec![room_with_queue("lobby", vec![])]);

        let err = h.catalog.search("lobby", "   ").await.unwrap_err();

        assert!(matches!(err, TunepoolError::InvalidRequest(_)));
        assert!(h.provider.searches().is_empty());
    }

    #[tokio::test]
    async fn unknown_room_is_lookup_failure() {
        let h = Harness::new(vec![]);
        let err = h.catalog.search("ghost", "anything").await.unwrap_err();
        assert!(matches!(err, TunepoolError::RoomNotFound(_)));
    }
}
