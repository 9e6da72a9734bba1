//! Remediation actions and the explicit lookup table the supervisor uses.
//!
//! The same action serves both "retry a stuck job" and "trigger a missing
//! run": in practice both mean "invoke the job's entry point once more".
//! Jobs absent from the table are still audited, just never triggered.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use indexmap::IndexMap;

use crate::error::RemediationError;

#[async_trait]
pub trait RemediationAction: Send + Sync {
    async fn trigger(&self) -> Result<(), RemediationError>;
}

struct FnAction<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> RemediationAction for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), RemediationError>> + Send,
{
    async fn trigger(&self) -> Result<(), RemediationError> {
        (self.f)().await
    }
}

/// Wrap an async closure as a remediation action.
pub fn from_fn<F, Fut>(f: F) -> Arc<dyn RemediationAction>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RemediationError>> + Send + 'static,
{
    Arc::new(FnAction { f })
}

/// Job name → remediation action, fixed at construction.
#[derive(Clone, Default)]
pub struct RemediationTable {
    actions: IndexMap<String, Arc<dyn RemediationAction>>,
}

impl RemediationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, job_name: impl Into<String>, action: Arc<dyn RemediationAction>) -> Self {
        self.actions.insert(job_name.into(), action);
        self
    }

    pub fn get(&self, job_name: &str) -> Option<&Arc<dyn RemediationAction>> {
        self.actions.get(job_name)
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Run an action with panics converted into [`RemediationError::Panicked`].
pub(crate) async fn invoke(action: &Arc<dyn RemediationAction>) -> Result<(), RemediationError> {
    match AssertUnwindSafe(action.trigger()).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(RemediationError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn closures_become_actions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let table = RemediationTable::new().with(
            "daily-filings",
            from_fn(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        let action = table.get("daily-filings").unwrap();
        invoke(action).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(table.get("analyst-data").is_none());
        assert_eq!(table.job_names().collect::<Vec<_>>(), vec!["daily-filings"]);
    }

    #[tokio::test]
    async fn panics_are_contained() {
        fn explode() -> Result<(), RemediationError> {
            panic!("provider client blew up")
        }
        let action = from_fn(|| async { explode() });
        let err = invoke(&action).await.unwrap_err();
        match err {
            RemediationError::Panicked(msg) => assert!(msg.contains("blew up")),
            other => panic!("expected Panicked, got: {other:?}"),
        }
    }
}
