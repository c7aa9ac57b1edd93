use async_trait::async_trait;

use crate::Result;

/// Handle for the unit of work wrapped around a rollbackable command body.
///
/// The dispatcher opens the transaction before the body runs and decides its
/// fate from the final banphrase verdict: committed when the reply passed,
/// rolled back when it was moderated away. A handle that is dropped without
/// either call leaves the decision to the provider's drop behavior.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait TransactionProvider: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// Provider for deployments without a transactional store.
pub struct NoopTransactionProvider;

struct NoopTransaction;

#[async_trait]
impl Transaction for NoopTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl TransactionProvider for NoopTransactionProvider {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(NoopTransaction))
    }
}
