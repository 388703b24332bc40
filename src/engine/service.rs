use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::matching::{MatchingEngine, SubmitError};
use crate::models::{Balances, Depth, ExecutionReport, NewOrder, Quote, UserId};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("engine task has stopped")]
    Stopped,
    #[error(transparent)]
    Rejected(#[from] SubmitError),
}

enum EngineMsg {
    Submit {
        order: NewOrder,
        reply: oneshot::Sender<Result<ExecutionReport, SubmitError>>,
    },
    Depth {
        max_levels: Option<usize>,
        reply: oneshot::Sender<Depth>,
    },
    Balances {
        user_id: UserId,
        reply: oneshot::Sender<Balances>,
    },
    Quote {
        reply: oneshot::Sender<Option<Quote>>,
    },
}

/// Cloneable client of the task that owns the [`MatchingEngine`]. Requests are
/// handled one at a time in arrival order, so queries only ever see the state
/// between two submissions.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMsg>,
}

/// Moves `engine` onto its own task. The task ends once every handle is dropped
/// and yields the engine back for inspection.
pub fn spawn(engine: MatchingEngine, capacity: usize) -> (EngineHandle, JoinHandle<MatchingEngine>) {
    let (tx, mut rx) = mpsc::channel::<EngineMsg>(capacity.max(1));
    let task = tokio::spawn(async move {
        let mut engine = engine;
        while let Some(msg) = rx.recv().await {
            match msg {
                EngineMsg::Submit { order, reply } => {
                    let result = engine.submit(order);
                    if reply.send(result).is_err() {
                        debug!("submitter went away before the report was delivered");
                    }
                }
                EngineMsg::Depth { max_levels, reply } => {
                    let _ = reply.send(engine.depth(max_levels));
                }
                EngineMsg::Balances { user_id, reply } => {
                    let _ = reply.send(engine.balances(&user_id));
                }
                EngineMsg::Quote { reply } => {
                    let _ = reply.send(engine.quote());
                }
            }
        }
        info!("engine task stopped");
        engine
    });
    (EngineHandle { tx }, task)
}

impl EngineHandle {
    pub async fn submit(&self, order: NewOrder) -> Result<ExecutionReport, ServiceError> {
        let report = self.request(|reply| EngineMsg::Submit { order, reply }).await?;
        Ok(report?)
    }

    pub async fn depth(&self, max_levels: Option<usize>) -> Result<Depth, ServiceError> {
        self.request(|reply| EngineMsg::Depth { max_levels, reply }).await
    }

    pub async fn balances(&self, user_id: impl Into<UserId>) -> Result<Balances, ServiceError> {
        let user_id = user_id.into();
        self.request(|reply| EngineMsg::Balances { user_id, reply }).await
    }

    pub async fn quote(&self) -> Result<Option<Quote>, ServiceError> {
        self.request(|reply| EngineMsg::Quote { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> EngineMsg) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| ServiceError::Stopped)?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::config::Settings;
    use crate::models::Side;

    #[tokio::test]
    async fn handle_round_trips_through_engine_task() {
        let (handle, task) = spawn(MatchingEngine::from_settings(&Settings::default()), 8);

        handle
            .submit(NewOrder::new("1", Side::Ask, dec!(100), dec!(5)))
            .await
            .unwrap();
        let report = handle
            .submit(NewOrder::new("2", Side::Bid, dec!(100), dec!(3)))
            .await
            .unwrap();
        assert_eq!(report.filled_quantity, dec!(3));

        let depth = handle.depth(None).await.unwrap();
        assert_eq!(depth.asks.len(), 1);
        assert_eq!(handle.balances("2").await.unwrap()["GOOGLE"], dec!(13));
        assert!(handle.quote().await.unwrap().is_none());

        drop(handle);
        let engine = task.await.unwrap();
        assert_eq!(engine.book().len(), 1);
    }

    #[tokio::test]
    async fn rejections_surface_as_service_errors() {
        let (handle, _task) = spawn(MatchingEngine::from_settings(&Settings::default()), 8);
        let err = handle
            .submit(NewOrder::new("ghost", Side::Bid, dec!(1), dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(SubmitError::UnknownUser(_))));
    }
}
