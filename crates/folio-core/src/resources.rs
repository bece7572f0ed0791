//! Loading-state adapters
//!
//! A `Resource` wraps a fetch function and publishes `{data, loading, error}`
//! snapshots to subscribers. Each resource owns its state (no sharing or
//! caching between instances). Unmounting cancels in-flight fetches so no
//! state update lands afterwards.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::models::{DateRange, Experience, MetricsSnapshot, Project};
use crate::services::{ExperienceService, MetricsService, ProjectService};

/// Snapshot of a resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loadable<T> {
    pub data: Option<T>,
    pub loading: bool,
    /// Message of the last failure; cleared when the next fetch starts
    pub error: Option<String>,
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }
}

type Fetcher<P, T> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<T>> + Send + Sync>;

pub struct Resource<P, T> {
    fetcher: Fetcher<P, T>,
    state: watch::Sender<Loadable<T>>,
    cancel: CancellationToken,
    generation: AtomicU64,
}

impl<P, T> Resource<P, T>
where
    P: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// New resource in the loading state; nothing is fetched until `fetch`
    pub fn new<F, Fut>(fetcher: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (state, _) = watch::channel(Loadable::default());
        Self {
            fetcher: Arc::new(move |params| fetcher(params).boxed()),
            state,
            cancel: CancellationToken::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Loadable<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Loadable<T> {
        self.state.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Run the fetcher and publish its outcome. Only the most recent of
    /// overlapping fetches publishes.
    pub async fn fetch(&self, params: P) -> Loadable<T> {
        if !self.is_mounted() {
            return self.snapshot();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Fetch abandoned after unmount");
                return self.snapshot();
            }
            outcome = (self.fetcher)(params) => outcome,
        };

        if self.generation.load(Ordering::SeqCst) == generation {
            self.state.send_modify(|s| {
                s.loading = false;
                match outcome {
                    Ok(data) => s.data = Some(data),
                    Err(e) => s.error = Some(e.to_string()),
                }
            });
        }
        self.snapshot()
    }

    /// Re-run with new parameters
    pub async fn refetch(&self, params: P) -> Loadable<T> {
        self.fetch(params).await
    }

    /// Stop publishing; in-flight fetches are abandoned
    pub fn unmount(&self) {
        self.cancel.cancel();
    }
}

impl<P, T> Drop for Resource<P, T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Projects, optionally limited
pub fn projects(service: ProjectService) -> Resource<Option<usize>, Vec<Project>> {
    Resource::new(move |limit| {
        let service = service.clone();
        async move { service.list(limit).await }
    })
}

/// Published testimonials shown on the home page
pub fn testimonials(service: ExperienceService) -> Resource<(), Vec<Experience>> {
    Resource::new(move |()| {
        let service = service.clone();
        async move { service.public_feed().await }
    })
}

/// Dashboard metrics for a date range
pub fn metrics(service: MetricsService) -> Resource<DateRange, MetricsSnapshot> {
    Resource::new(move |range| {
        let service = service.clone();
        async move { service.snapshot(range).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::Error;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[tokio::test]
    async fn test_starts_loading_and_settles() {
        let resource = Resource::new(|n: u32| async move { Ok(n * 2) });
        assert!(resource.snapshot().loading);

        let state = resource.fetch(21).await;
        assert_eq!(state.data, Some(42));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_error_is_set_then_cleared_on_next_fetch() {
        let fail = Arc::new(AtomicBool::new(true));
        let flag = fail.clone();
        let resource = Resource::new(move |()| {
            let fail = flag.load(Ordering::SeqCst);
            async move {
                if fail {
                    Err(Error::Other("boom".to_string()))
                } else {
                    Ok("ok")
                }
            }
        });

        let failed = resource.fetch(()).await;
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(!failed.loading);

        fail.store(false, Ordering::SeqCst);
        let mut rx = resource.subscribe();
        let ok = resource.refetch(()).await;
        assert!(ok.error.is_none());
        assert_eq!(ok.data, Some("ok"));
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_discards_in_flight_result() {
        let resource = Arc::new(Resource::new(|()| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(1)
        }));

        let task = tokio::spawn({
            let resource = resource.clone();
            async move { resource.fetch(()).await }
        });
        tokio::task::yield_now().await;
        resource.unmount();

        let state = task.await.unwrap();
        assert!(state.data.is_none());
        assert!(!resource.is_mounted());
        assert!(resource.fetch(()).await.data.is_none());
    }

    #[tokio::test]
    async fn test_projects_resource_passes_limit() {
        let backend = Arc::new(MemoryBackend::new());
        for i in 0..3 {
            backend.seed(
                "projects",
                vec![serde_json::json!({"title": format!("P{}", i), "slug": format!("p{}", i)})],
            );
        }
        let resource = projects(ProjectService::new(backend));
        assert_eq!(resource.fetch(Some(2)).await.data.map(|d| d.len()), Some(2));
        assert_eq!(resource.refetch(None).await.data.map(|d| d.len()), Some(3));
    }
}
