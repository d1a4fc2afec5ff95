use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::notification::{NewOutboxMessage, OutboxMessage};
use crate::domain::ports::OutboxRepository;
use crate::schema::notification_outbox;

use super::models::{NewOutboxRow, OutboxRow};

/// Shared by every repository that enqueues side effects inside its own transaction.
pub(crate) fn insert_outbox(
    conn: &mut PgConnection,
    messages: Vec<NewOutboxMessage>,
) -> Result<(), DomainError> {
    if messages.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewOutboxRow> = messages
        .into_iter()
        .map(|m| NewOutboxRow {
            id: m.id,
            kind: m.kind.as_str().to_string(),
            payload: m.payload,
        })
        .collect();
    diesel::insert_into(notification_outbox::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

pub struct DieselOutboxRepository {
    pool: DbPool,
}

impl DieselOutboxRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OutboxRepository for DieselOutboxRepository {
    fn enqueue(&self, messages: Vec<NewOutboxMessage>) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;
        insert_outbox(&mut conn, messages)
    }

    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let rows = notification_outbox::table
                .filter(notification_outbox::processed_at.is_null())
                .filter(notification_outbox::failed_at.is_null())
                .filter(notification_outbox::next_attempt_at.le(now))
                .order(notification_outbox::next_attempt_at.asc())
                .limit(limit)
                .select(OutboxRow::as_select())
                .for_update()
                .skip_locked()
                .load(conn)?;

            let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
            if !ids.is_empty() {
                diesel::update(notification_outbox::table.filter(notification_outbox::id.eq_any(&ids)))
                    .set(notification_outbox::next_attempt_at.eq(lease_until))
                    .execute(conn)?;
            }

            Ok(rows.into_iter().map(OutboxMessage::from).collect())
        })
    }

    fn mark_processed(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        diesel::update(notification_outbox::table.find(id))
            .set((
                notification_outbox::processed_at.eq(at),
                notification_outbox::attempts.eq(notification_outbox::attempts + 1),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn mark_retry(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        diesel::update(notification_outbox::table.find(id))
            .set((
                notification_outbox::attempts.eq(notification_outbox::attempts + 1),
                notification_outbox::last_error.eq(error),
                notification_outbox::next_attempt_at.eq(next_attempt_at),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn mark_failed(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        diesel::update(notification_outbox::table.find(id))
            .set((
                notification_outbox::attempts.eq(notification_outbox::attempts + 1),
                notification_outbox::last_error.eq(error),
                notification_outbox::failed_at.eq(at),
            ))
            .execute(&mut conn)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::DieselOutboxRepository;
    use crate::domain::notification::NewOutboxMessage;
    use crate::domain::ports::OutboxRepository;
    use crate::infrastructure::test_db::setup_db;

    #[tokio::test]
    #[ignore = "requires a container runtime for testcontainers"]
    async fn claimed_messages_are_leased_until_released() {
        let (_container, pool) = setup_db().await;
        let repo = DieselOutboxRepository::new(pool);
        repo.enqueue(vec![NewOutboxMessage::invoice(Uuid::new_v4())])
            .unwrap();

        let now = Utc::now() + Duration::seconds(1);
        let lease = now + Duration::seconds(60);
        let first = repo.claim_due(now, 10, lease).unwrap();
        let second = repo.claim_due(now, 10, lease).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty(), "leased message must not be claimed twice");

        let after_lease = repo.claim_due(lease, 10, lease + Duration::seconds(60)).unwrap();
        assert_eq!(after_lease.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires a container runtime for testcontainers"]
    async fn processed_and_failed_messages_are_never_claimed() {
        let (_container, pool) = setup_db().await;
        let repo = DieselOutboxRepository::new(pool);
        let done = NewOutboxMessage::invoice(Uuid::new_v4());
        let dead = NewOutboxMessage::invoice(Uuid::new_v4());
        let (done_id, dead_id) = (done.id, dead.id);
        repo.enqueue(vec![done, dead]).unwrap();

        repo.mark_processed(done_id, Utc::now()).unwrap();
        repo.mark_failed(dead_id, "boom", Utc::now()).unwrap();

        let later = Utc::now() + Duration::hours(2);
        assert!(repo.claim_due(later, 10, later).unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a container runtime for testcontainers"]
    async fn retry_counts_attempts_and_keeps_error() {
        let (_container, pool) = setup_db().await;
        let repo = DieselOutboxRepository::new(pool);
        let message = NewOutboxMessage::invoice(Uuid::new_v4());
        let id = message.id;
        repo.enqueue(vec![message]).unwrap();

        let retry_at = Utc::now() + Duration::seconds(30);
        repo.mark_retry(id, "mail service down", retry_at).unwrap();

        let claimed = repo
            .claim_due(retry_at + Duration::seconds(1), 10, retry_at + Duration::minutes(5))
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 1);
        assert_eq!(claimed[0].last_error.as_deref(), Some("mail service down"));
    }
}
