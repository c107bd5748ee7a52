//! Function enumeration across listing pages.

use futures::stream::{self, Stream, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::provider::FunctionLister;
use crate::types::FunctionDescriptor;

enum Cursor {
    First,
    Next(String),
    Exhausted,
}

/// Walks a [`FunctionLister`] from the first page until no continuation token is returned.
#[derive(Clone)]
pub struct ResourceEnumerator {
    lister: Arc<dyn FunctionLister>,
}

impl ResourceEnumerator {
    pub fn new(lister: Arc<dyn FunctionLister>) -> Self {
        Self { lister }
    }

    /// Lazily list every function, in the order the pages return them.
    ///
    /// Pages are only requested as the stream is polled. Each call starts a fresh listing from the
    /// first page. The first listing error ends the stream.
    pub fn list_functions(&self) -> impl Stream<Item = Result<FunctionDescriptor>> + Send + 'static + use<> {
        let lister = self.lister.clone();

        stream::try_unfold((Cursor::First, 0usize), move |(cursor, page)| {
            let lister = lister.clone();
            async move {
                let token = match cursor {
                    Cursor::First => None,
                    Cursor::Next(token) => Some(token),
                    Cursor::Exhausted => return Ok(None),
                };

                let listing = lister.list_page(token).await?;
                debug!(page, count = listing.items.len(), "Received function listing page");

                let next = match listing.next_token {
                    Some(token) if !token.is_empty() => Cursor::Next(token),
                    _ => Cursor::Exhausted,
                };
                let items = stream::iter(listing.items.into_iter().map(Ok::<_, Error>));
                Ok::<_, Error>(Some((items, (next, page + 1))))
            }
        })
        .try_flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{StaticLister, descriptor};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_concatenates_pages_in_order() {
        let lister = Arc::new(StaticLister::new(vec![
            vec![descriptor("a", 128, "us-east-1"), descriptor("b", 256, "us-east-1")],
            vec![],
            vec![descriptor("c", 512, "us-east-1")],
        ]));
        let enumerator = ResourceEnumerator::new(lister.clone());

        let functions: Vec<_> = enumerator.list_functions().try_collect().await.unwrap();

        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(lister.calls(), 3);
    }

    #[tokio::test]
    async fn test_listing_outlives_enumerator() {
        let lister = Arc::new(StaticLister::new(vec![vec![descriptor("a", 128, "us-east-1")], vec![descriptor("b", 128, "us-east-1")]]));

        // The stream is built from a temporary and polled on another task
        let listing = ResourceEnumerator::new(lister.clone()).list_functions();
        let functions: Vec<_> = tokio::spawn(listing.try_collect::<Vec<_>>()).await.unwrap().unwrap();

        assert_eq!(functions.len(), 2);
        assert_eq!(lister.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_account() {
        let enumerator = ResourceEnumerator::new(Arc::new(StaticLister::single_page(vec![])));
        let functions: Vec<_> = enumerator.list_functions().try_collect().await.unwrap();
        assert!(functions.is_empty());
    }

    #[tokio::test]
    async fn test_listing_is_lazy_and_restartable() {
        let lister = Arc::new(StaticLister::new(vec![
            vec![descriptor("a", 128, "us-east-1")],
            vec![descriptor("b", 128, "us-east-1")],
        ]));
        let enumerator = ResourceEnumerator::new(lister.clone());

        let first = enumerator.list_functions().boxed().next().await.unwrap().unwrap();
        assert_eq!(first.name, "a");
        assert_eq!(lister.calls(), 1);

        let all: Vec<_> = enumerator.list_functions().try_collect().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(lister.calls(), 3);
    }

    #[tokio::test]
    async fn test_error_on_later_page_ends_listing() {
        let lister = StaticLister::new(vec![vec![descriptor("a", 128, "us-east-1")], vec![descriptor("b", 128, "us-east-1")]])
            .failing_on_page(1);
        let enumerator = ResourceEnumerator::new(Arc::new(lister));

        let result: Result<Vec<_>> = enumerator.list_functions().try_collect().await;
        assert!(matches!(result, Err(Error::Enumeration { .. })));
    }
}
