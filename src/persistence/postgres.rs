//! PostgreSQL implementation of [`Store`].
//!
//! Queries are built at runtime (`sqlx::query_as`) so the crate compiles
//! without a live database. The schema lives in `migrations/`.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    ContributionRow, EventRow, GiftRow, GroupRow, MatchRow, ParticipantRow, SupplyRow, UserRow,
    to_column,
};
use super::{CommitCheck, DRAW_ALREADY_PERFORMED, Store};
use crate::domain::{
    Commitment, Contribution, ContributionId, Event, EventId, Gift, Group, GroupId, Match,
    Participant, Supply, SupplyId, UserId, UserProfile,
};
use crate::error::GatewayError;

const EVENT_COLUMNS: &str = "id, title, event_date, owner_id, event_type";
const SUPPLY_COLUMNS: &str = "id, event_id, item_name, description, quantity_needed, unit, \
                              image_url, url, created_at, updated_at";
const CONTRIBUTION_COLUMNS: &str =
    "id, supply_id, user_id, quantity_committed, notes, created_at, updated_at";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::Persistence(e.to_string()))
    }

    /// Loads the groups of each event, primary group first.
    async fn groups_by_event(
        &self,
        event_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Group>>, GatewayError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT eg.event_id, g.id, g.name, g.description, g.owner_id \
             FROM event_groups eg JOIN user_groups g ON g.id = eg.group_id \
             WHERE eg.event_id = ANY($1) ORDER BY eg.event_id, eg.position",
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Group>> = HashMap::new();
        for row in rows {
            if let Some(event_id) = row.event_id {
                grouped.entry(event_id).or_default().push(row.into());
            }
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<EventRow>) -> Result<Vec<Event>, GatewayError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut groups = self.groups_by_event(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let attached = groups.remove(&row.id).unwrap_or_default();
                row.into_event(attached)
            })
            .collect()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Store for PostgresStore {
    async fn find_event(&self, id: EventId) -> Result<Option<Event>, GatewayError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn insert_event(&self, event: &Event) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO events (id, title, event_date, owner_id, event_type) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::from(event.id))
        .bind(&event.title)
        .bind(event.event_date)
        .bind(Uuid::from(event.owner_id))
        .bind(event.event_type.as_str())
        .execute(&mut *tx)
        .await?;

        for (position, group) in (0_i32..).zip(&event.groups) {
            sqlx::query(
                "INSERT INTO event_groups (event_id, group_id, position) VALUES ($1, $2, $3)",
            )
            .bind(Uuid::from(event.id))
            .bind(Uuid::from(group.id))
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_events_by_owner(&self, owner: UserId) -> Result<Vec<Event>, GatewayError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE owner_id = $1 ORDER BY event_date"
        ))
        .bind(Uuid::from(owner))
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn list_events_by_group(&self, group: GroupId) -> Result<Vec<Event>, GatewayError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT e.id, e.title, e.event_date, e.owner_id, e.event_type \
             FROM events e JOIN event_groups eg ON eg.event_id = e.id \
             WHERE eg.group_id = $1 ORDER BY e.event_date",
        )
        .bind(Uuid::from(group))
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn find_groups(&self, ids: &[GroupId]) -> Result<Vec<Group>, GatewayError> {
        let wanted: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, description, owner_id FROM user_groups WHERE id = ANY($1)",
        )
        .bind(&wanted)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: HashMap<Uuid, Group> = rows.into_iter().map(|r| (r.id, r.into())).collect();
        Ok(wanted.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, GatewayError> {
        let wanted: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name FROM users WHERE id = ANY($1)")
            .bind(&wanted)
            .fetch_all(&self.pool)
            .await?;

        let mut by_id: HashMap<Uuid, UserProfile> =
            rows.into_iter().map(|r| (r.id, r.into())).collect();
        Ok(wanted.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn replace_participants(
        &self,
        event: EventId,
        users: &[UserId],
    ) -> Result<Vec<Participant>, GatewayError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM event_participants WHERE event_id = $1")
            .bind(Uuid::from(event))
            .execute(&mut *tx)
            .await?;

        let mut added = Vec::with_capacity(users.len());
        for user in users {
            let participant = Participant::new(event, *user);
            let inserted = sqlx::query(
                "INSERT INTO event_participants (id, event_id, user_id) VALUES ($1, $2, $3) \
                 ON CONFLICT (event_id, user_id) DO NOTHING",
            )
            .bind(Uuid::from(participant.id))
            .bind(Uuid::from(event))
            .bind(Uuid::from(*user))
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if inserted > 0 {
                added.push(participant);
            }
        }
        tx.commit().await?;
        Ok(added)
    }

    async fn list_participants(&self, event: EventId) -> Result<Vec<Participant>, GatewayError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT id, event_id, user_id FROM event_participants \
             WHERE event_id = $1 ORDER BY created_at, id",
        )
        .bind(Uuid::from(event))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Participant::from).collect())
    }

    async fn participant_exists(
        &self,
        event: EventId,
        user: UserId,
    ) -> Result<bool, GatewayError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM event_participants WHERE event_id = $1 AND user_id = $2)",
        )
        .bind(Uuid::from(event))
        .bind(Uuid::from(user))
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn matches_exist(&self, scope: GroupId, givers: &[UserId]) -> Result<bool, GatewayError> {
        let givers: Vec<Uuid> = givers.iter().copied().map(Uuid::from).collect();
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM secret_friend_matches \
             WHERE group_id = $1 AND giver_id = ANY($2))",
        )
        .bind(Uuid::from(scope))
        .bind(&givers)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_matches(&self, matches: &[Match]) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;
        for m in matches {
            let result = sqlx::query(
                "INSERT INTO secret_friend_matches (id, group_id, giver_id, receiver_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::from(m.id))
            .bind(Uuid::from(m.scope))
            .bind(Uuid::from(m.giver_id))
            .bind(Uuid::from(m.receiver_id))
            .bind(m.created_at)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    tx.rollback().await?;
                    return Err(GatewayError::Validation(DRAW_ALREADY_PERFORMED.to_string()));
                }
                Err(err) => return Err(err.into()),
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_matches(&self, scope: GroupId) -> Result<Vec<Match>, GatewayError> {
        let rows = sqlx::query_as::<_, MatchRow>(
            "SELECT id, group_id, giver_id, receiver_id, created_at \
             FROM secret_friend_matches WHERE group_id = $1 ORDER BY created_at, id",
        )
        .bind(Uuid::from(scope))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Match::from).collect())
    }

    async fn insert_supply(&self, supply: &Supply) -> Result<(), GatewayError> {
        sqlx::query(&format!(
            "INSERT INTO event_supplies ({SUPPLY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(Uuid::from(supply.id))
        .bind(Uuid::from(supply.event_id))
        .bind(&supply.item_name)
        .bind(&supply.description)
        .bind(to_column(supply.quantity_needed)?)
        .bind(&supply.unit)
        .bind(&supply.image_url)
        .bind(&supply.url)
        .bind(supply.created_at)
        .bind(supply.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_supply(&self, supply: &Supply) -> Result<(), GatewayError> {
        let affected = sqlx::query(
            "UPDATE event_supplies SET item_name = $2, description = $3, quantity_needed = $4, \
             unit = $5, image_url = $6, url = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(Uuid::from(supply.id))
        .bind(&supply.item_name)
        .bind(&supply.description)
        .bind(to_column(supply.quantity_needed)?)
        .bind(&supply.unit)
        .bind(&supply.image_url)
        .bind(&supply.url)
        .bind(supply.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(GatewayError::not_found("supply", supply.id));
        }
        Ok(())
    }

    async fn find_supply(&self, id: SupplyId) -> Result<Option<Supply>, GatewayError> {
        sqlx::query_as::<_, SupplyRow>(&format!(
            "SELECT {SUPPLY_COLUMNS} FROM event_supplies WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await?
        .map(Supply::try_from)
        .transpose()
    }

    async fn delete_supply(&self, id: SupplyId) -> Result<u64, GatewayError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM supply_contributions WHERE supply_id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM event_supplies WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(0);
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn list_supplies_with_contributions(
        &self,
        event: EventId,
    ) -> Result<Vec<(Supply, Vec<Contribution>)>, GatewayError> {
        let supplies = sqlx::query_as::<_, SupplyRow>(&format!(
            "SELECT {SUPPLY_COLUMNS} FROM event_supplies WHERE event_id = $1 ORDER BY created_at"
        ))
        .bind(Uuid::from(event))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = supplies.iter().map(|s| s.id).collect();
        let contributions = sqlx::query_as::<_, ContributionRow>(&format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM supply_contributions \
             WHERE supply_id = ANY($1) ORDER BY created_at"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_supply: HashMap<Uuid, Vec<Contribution>> = HashMap::new();
        for row in contributions {
            let supply_id = row.supply_id;
            by_supply
                .entry(supply_id)
                .or_default()
                .push(Contribution::try_from(row)?);
        }

        supplies
            .into_iter()
            .map(|row| {
                let pledges = by_supply.remove(&row.id).unwrap_or_default();
                Ok((Supply::try_from(row)?, pledges))
            })
            .collect()
    }

    async fn find_contribution(
        &self,
        id: ContributionId,
    ) -> Result<Option<Contribution>, GatewayError> {
        sqlx::query_as::<_, ContributionRow>(&format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM supply_contributions WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await?
        .map(Contribution::try_from)
        .transpose()
    }

    async fn list_contributions(
        &self,
        supply: SupplyId,
    ) -> Result<Vec<Contribution>, GatewayError> {
        let rows = sqlx::query_as::<_, ContributionRow>(&format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM supply_contributions \
             WHERE supply_id = $1 ORDER BY created_at"
        ))
        .bind(Uuid::from(supply))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Contribution::try_from).collect()
    }

    async fn commit_contribution(
        &self,
        contribution: &Contribution,
        check: CommitCheck<'_>,
    ) -> Result<Commitment, GatewayError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent pledges on the same supply.
        let row = sqlx::query_as::<_, SupplyRow>(&format!(
            "SELECT {SUPPLY_COLUMNS} FROM event_supplies WHERE id = $1 FOR UPDATE"
        ))
        .bind(Uuid::from(contribution.supply_id))
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Err(GatewayError::not_found("supply", contribution.supply_id));
        };
        let supply = Supply::try_from(row)?;

        let others = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity_committed), 0)::BIGINT FROM supply_contributions \
             WHERE supply_id = $1 AND id <> $2",
        )
        .bind(Uuid::from(contribution.supply_id))
        .bind(Uuid::from(contribution.id))
        .fetch_one(&mut *tx)
        .await?;

        let commitment = match check(&supply, u64::try_from(others).unwrap_or(0)) {
            Ok(commitment) => commitment,
            Err(err) => {
                tx.rollback().await?;
                return Err(err);
            }
        };

        sqlx::query(&format!(
            "INSERT INTO supply_contributions ({CONTRIBUTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET quantity_committed = EXCLUDED.quantity_committed, \
             notes = EXCLUDED.notes, updated_at = EXCLUDED.updated_at"
        ))
        .bind(Uuid::from(contribution.id))
        .bind(Uuid::from(contribution.supply_id))
        .bind(Uuid::from(contribution.user_id))
        .bind(to_column(contribution.quantity_committed)?)
        .bind(&contribution.notes)
        .bind(contribution.created_at)
        .bind(contribution.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(commitment)
    }

    async fn delete_contribution(&self, id: ContributionId) -> Result<bool, GatewayError> {
        let affected = sqlx::query("DELETE FROM supply_contributions WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn insert_gift(&self, gift: &Gift) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO gifts (id, title, urls, user_id, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::from(gift.id))
        .bind(&gift.title)
        .bind(&gift.urls)
        .bind(Uuid::from(gift.user_id))
        .bind(gift.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, event_id) in (0_i32..).zip(&gift.event_ids) {
            sqlx::query("INSERT INTO gift_events (gift_id, event_id, position) VALUES ($1, $2, $3)")
                .bind(Uuid::from(gift.id))
                .bind(Uuid::from(*event_id))
                .bind(position)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_gifts(
        &self,
        event: EventId,
        author: Option<UserId>,
    ) -> Result<Vec<Gift>, GatewayError> {
        let rows = sqlx::query_as::<_, GiftRow>(
            "SELECT g.id, g.title, g.urls, g.user_id, g.created_at, \
             ARRAY(SELECT l.event_id FROM gift_events l WHERE l.gift_id = g.id \
                   ORDER BY l.position) AS event_ids \
             FROM gifts g JOIN gift_events ge ON ge.gift_id = g.id \
             WHERE ge.event_id = $1 AND ($2::UUID IS NULL OR g.user_id = $2) \
             ORDER BY g.created_at, g.id",
        )
        .bind(Uuid::from(event))
        .bind(author.map(Uuid::from))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Gift::from).collect())
    }
}
