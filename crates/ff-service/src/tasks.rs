//! The background side of the service: executes queued [`Task`]s.

use std::sync::Arc;

use async_trait::async_trait;
use ff_core::error::Result;
use ff_core::traits::{MailTransport, Task, TaskHandler};
use ff_db_sqlite::{users, Database};

/// Runs tasks against the same database the service writes to.
pub struct TaskRunner {
    db: Database,
    mail: Arc<dyn MailTransport>,
}

impl TaskRunner {
    pub fn new(db: Database, mail: Arc<dyn MailTransport>) -> Self {
        Self { db, mail }
    }
}

#[async_trait]
impl TaskHandler for TaskRunner {
    async fn handle(&self, task: &Task) -> Result<()> {
        match task {
            Task::SendEmail(message) => self.mail.deliver(message).await,
            Task::DeleteAccount { user_id } => {
                let mut tx = self.db.begin().await?;
                // Already gone counts as done.
                if !users::delete(&mut tx, *user_id).await? {
                    tracing::debug!(user_id, "account already deleted");
                }
                ff_db_sqlite::commit(tx).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use ff_core::error::AppError;
    use ff_core::traits::{MailMessage, MockMailTransport};

    #[tokio::test]
    async fn delete_account_is_idempotent() {
        let h = Harness::new().await;
        let ann = h.register("ann").await;
        let runner = TaskRunner::new(h.app.db.clone(), Arc::new(MockMailTransport::new()));

        let task = Task::DeleteAccount { user_id: ann.id };
        runner.handle(&task).await.unwrap();
        runner.handle(&task).await.unwrap();
        assert!(matches!(h.app.get_user(ann.id).await, Err(AppError::NotFound(..))));
    }

    #[tokio::test]
    async fn mail_goes_to_transport() {
        let h = Harness::new().await;
        let mut transport = MockMailTransport::new();
        transport
            .expect_deliver()
            .withf(|m: &MailMessage| m.to == "ann@example.com")
            .times(1)
            .returning(|_| Ok(()));
        let runner = TaskRunner::new(h.app.db.clone(), Arc::new(transport));

        let message = MailMessage {
            to: "ann@example.com".into(),
            sender: "noreply@firefly.local".into(),
            subject: "[Firefly] hi".into(),
            template: "auth/email/confirm".into(),
            params: serde_json::json!({}),
        };
        runner.handle(&Task::SendEmail(message)).await.unwrap();
    }
}
