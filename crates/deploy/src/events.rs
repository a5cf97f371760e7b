//! Exhaustive event retrieval over `starknet_getEvents` pages.

use crate::network::{ChainReader, EmittedEvent, EventFilter, NetworkError};

/// Default number of events requested per page.
pub const DEFAULT_CHUNK_SIZE: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum EventsError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The node handed back the token it was given, so paging would never end.
    #[error("continuation token '{0}' did not advance")]
    StalledCursor(String),
}

/// Whether a continuation token marks the last page.
///
/// A missing token ends pagination. Otherwise the last comma-separated part of the
/// token is read as hex and pagination ends when it is zero. Tokens whose last part
/// is not hex are treated as opaque and followed; [`EventPager::fetch_all`] stops
/// with [`EventsError::StalledCursor`] if the node hands the same token back.
pub fn is_exhausted(token: Option<&str>) -> bool {
    let Some(token) = token else {
        return true;
    };
    let last = token.rsplit(',').next().unwrap_or(token).trim();
    let digits = last
        .strip_prefix("0x")
        .or_else(|| last.strip_prefix("0X"))
        .unwrap_or(last);
    if digits.is_empty() {
        return false;
    }
    digits.chars().all(|c| c.is_ascii_hexdigit()) && digits.chars().all(|c| c == '0')
}

/// Follows continuation tokens until the filter's events are exhausted.
pub struct EventPager<'a, R: ?Sized> {
    reader: &'a R,
    chunk_size: u64,
}

impl<'a, R> EventPager<'a, R>
where
    R: ChainReader + ?Sized,
{
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Fetch every event matching `filter`, one page at a time.
    pub async fn fetch_all(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<EmittedEvent>, EventsError> {
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .reader
                .events_page(filter, cursor.as_deref(), self.chunk_size)
                .await?;
            pages += 1;

            tracing::debug!(
                page = pages,
                events = page.events.len(),
                continuation_token = ?page.continuation_token,
                "Fetched events page"
            );
            events.extend(page.events);

            if is_exhausted(page.continuation_token.as_deref()) {
                break;
            }
            if page.continuation_token == cursor {
                return Err(EventsError::StalledCursor(
                    page.continuation_token.unwrap_or_default(),
                ));
            }
            cursor = page.continuation_token;
        }

        tracing::info!(pages, events = events.len(), "Fetched all events");
        Ok(events)
    }
}
