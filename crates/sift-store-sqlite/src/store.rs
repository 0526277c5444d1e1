//! [`SqliteStore`]: the SQLite implementation of [`InterestStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, ToSql};
use tracing::debug;
use uuid::Uuid;

use sift_core::{
  interest::{ConditionMatch, Interest, InterestData, Metadata, Owner},
  store::{ConditionQuery, Cursor, InterestStore, Order, Query, Sort},
};

use crate::{
  encode::{
    decode_condition, encode_cond_ids, encode_condition, encode_dt, RawInterest,
    INTEREST_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A sift interest store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Outcome of a conditional follower update.
enum FollowersOutcome {
  Updated,
  Missing,
  WouldGoNegative,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, e.g. for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_contains(text: &str) -> String {
  let escaped = text
    .replace('\\', "\\\\")
    .replace('%', "\\%")
    .replace('_', "\\_");
  format!("%{escaped}%")
}

/// Build the id-listing SQL for `query`. The statement binds `:g`, `:u`,
/// `:pattern`, `:cid` and `:limit`, plus `:cf` when sorting by followers.
fn search_sql(query: &Query) -> String {
  let owner_clause = if query.private_only {
    "(group_id = :g AND user_id = :u AND public = 0)"
  } else if query.include_public {
    "((group_id = :g AND user_id = :u) OR public = 1)"
  } else {
    "(group_id = :g AND user_id = :u)"
  };

  let (cmp, dir) = match query.order {
    Order::Asc => (">", "ASC"),
    Order::Desc => ("<", "DESC"),
  };

  let (cursor_clause, order_clause) = match query.sort {
    Sort::Id => (format!("id {cmp} :cid"), format!("id {dir}")),
    Sort::Followers => (
      format!(
        "(followers, id) {cmp} \
         (COALESCE((SELECT followers FROM interests WHERE id = :cid), :cf), :cid)"
      ),
      format!("followers {dir}, id {dir}"),
    ),
  };

  format!(
    "SELECT id FROM interests
     WHERE {owner_clause}
       AND (:pattern IS NULL OR descr LIKE :pattern ESCAPE '\\')
       AND (:cid = '' OR {cursor_clause})
     ORDER BY {order_clause}
     LIMIT :limit"
  )
}

// ─── InterestStore impl ──────────────────────────────────────────────────────

impl InterestStore for SqliteStore {
  type Error = Error;

  async fn create(&self, owner: &Owner, data: InterestData) -> Result<String> {
    let id  = Uuid::now_v7().to_string();
    let now = encode_dt(Utc::now());
    let md  = data.metadata;

    let cond_ids          = data.condition.cond_ids();
    let cond_str          = encode_condition(&data.condition)?;
    let cond_ids_str      = encode_cond_ids(&cond_ids)?;
    let enabled_since_str = md.enabled.then(|| now.clone());
    let expires_str       = md.expires.map(encode_dt);
    let result_str        = md.result.map(encode_dt);
    let group_id          = owner.group_id.clone();
    let user_id           = owner.user_id.clone();
    let id_str            = id.clone();

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO interests (
             id, group_id, user_id, descr, enabled, enabled_since, expires,
             created, updated, result, public, followers, rate_limit, cond, cond_ids
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?10, 0, ?11, ?12, ?13)",
          rusqlite::params![
            id_str,
            group_id,
            user_id,
            md.description,
            md.enabled,
            enabled_since_str,
            expires_str,
            now,
            result_str,
            md.public,
            md.rate_limit,
            cond_str,
            cond_ids_str,
          ],
        )?;
        {
          let mut stmt =
            tx.prepare("INSERT INTO interest_conds (cond_id, interest_id) VALUES (?1, ?2)")?;
          for cond_id in &cond_ids {
            stmt.execute(rusqlite::params![cond_id, id_str])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await;

    match written {
      Ok(()) => {}
      Err(e) if Error::is_unique_violation(&e) => return Err(Error::Duplicate(id)),
      Err(e) => return Err(e.into()),
    }

    debug!(interest_id = %id, group_id = %owner.group_id, "interest created");
    Ok(id)
  }

  async fn read(&self, id: &str, owner: &Owner) -> Result<Interest> {
    let id_str   = id.to_owned();
    let group_id = owner.group_id.clone();
    let user_id  = owner.user_id.clone();

    let raw: Option<RawInterest> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {INTEREST_COLUMNS} FROM interests
                 WHERE id = ?1 AND ((group_id = ?2 AND user_id = ?3) OR public = 1)"
              ),
              rusqlite::params![id_str, group_id, user_id],
              RawInterest::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .ok_or_else(|| Error::InterestNotFound(id.to_owned()))?
      .into_interest()
  }

  async fn update(&self, id: &str, owner: &Owner, metadata: Metadata) -> Result<Interest> {
    let id_str   = id.to_owned();
    let group_id = owner.group_id.clone();
    let user_id  = owner.user_id.clone();
    let now      = encode_dt(Utc::now());
    let md       = metadata;

    let prev: Option<RawInterest> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let prev = tx
          .query_row(
            &format!(
              "SELECT {INTEREST_COLUMNS} FROM interests
               WHERE id = ?1 AND group_id = ?2 AND user_id = ?3"
            ),
            rusqlite::params![id_str, group_id, user_id],
            RawInterest::from_row,
          )
          .optional()?;
        let Some(prev) = prev else {
          return Ok(None);
        };

        let enabled_since = if md.enabled && !prev.enabled {
          Some(now.clone())
        } else {
          prev.enabled_since.clone()
        };

        tx.execute(
          "UPDATE interests
           SET descr = ?2, enabled = ?3, enabled_since = ?4, expires = ?5,
               updated = ?6, result = ?7, public = ?8, rate_limit = ?9
           WHERE id = ?1",
          rusqlite::params![
            id_str,
            md.description,
            md.enabled,
            enabled_since,
            md.expires.map(encode_dt),
            now,
            md.result.map(encode_dt),
            md.public,
            md.rate_limit,
          ],
        )?;
        tx.commit()?;
        Ok(Some(prev))
      })
      .await?;

    prev
      .ok_or_else(|| Error::InterestNotFound(id.to_owned()))?
      .into_interest()
  }

  async fn update_followers(&self, id: &str, delta: i64) -> Result<()> {
    let id_str = id.to_owned();

    let outcome = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE interests SET followers = followers + ?2
           WHERE id = ?1 AND followers + ?2 >= 0",
          rusqlite::params![id_str, delta],
        )?;
        if changed > 0 {
          return Ok(FollowersOutcome::Updated);
        }
        let exists = conn
          .query_row(
            "SELECT 1 FROM interests WHERE id = ?1",
            rusqlite::params![id_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        Ok(if exists { FollowersOutcome::WouldGoNegative } else { FollowersOutcome::Missing })
      })
      .await?;

    match outcome {
      FollowersOutcome::Updated => Ok(()),
      FollowersOutcome::Missing => Err(Error::InterestNotFound(id.to_owned())),
      FollowersOutcome::WouldGoNegative => Err(Error::NegativeFollowers(id.to_owned())),
    }
  }

  async fn delete(&self, id: &str, owner: &Owner) -> Result<Interest> {
    let id_str   = id.to_owned();
    let group_id = owner.group_id.clone();
    let user_id  = owner.user_id.clone();

    let removed: Option<RawInterest> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let prev = tx
          .query_row(
            &format!(
              "SELECT {INTEREST_COLUMNS} FROM interests
               WHERE id = ?1 AND group_id = ?2 AND user_id = ?3"
            ),
            rusqlite::params![id_str, group_id, user_id],
            RawInterest::from_row,
          )
          .optional()?;
        if prev.is_some() {
          tx.execute(
            "DELETE FROM interest_conds WHERE interest_id = ?1",
            rusqlite::params![id_str],
          )?;
          tx.execute("DELETE FROM interests WHERE id = ?1", rusqlite::params![id_str])?;
        }
        tx.commit()?;
        Ok(prev)
      })
      .await?;

    let interest = removed
      .ok_or_else(|| Error::InterestNotFound(id.to_owned()))?
      .into_interest()?;
    debug!(interest_id = %id, "interest deleted");
    Ok(interest)
  }

  async fn search(&self, query: &Query, cursor: &Cursor) -> Result<Vec<String>> {
    let sql       = search_sql(query);
    let by_fol    = query.sort == Sort::Followers;
    let group_id  = query.owner.group_id.clone();
    let user_id   = query.owner.user_id.clone();
    let pattern   = query.pattern.as_deref().filter(|p| !p.is_empty()).map(like_contains);
    let cursor_id = cursor.id.clone();
    let cursor_f  = cursor.followers;
    let limit     = i64::from(query.limit.max(1));

    let ids = self
      .conn
      .call(move |conn| {
        let mut params: Vec<(&str, &dyn ToSql)> = vec![
          (":g", &group_id),
          (":u", &user_id),
          (":pattern", &pattern),
          (":cid", &cursor_id),
          (":limit", &limit),
        ];
        if by_fol {
          params.push((":cf", &cursor_f));
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params.as_slice(), |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(ids)
  }

  async fn search_by_condition(
    &self,
    query: &ConditionQuery,
    cursor: &str,
  ) -> Result<Vec<ConditionMatch>> {
    let cond_id   = query.cond_id.clone();
    let cursor_id = cursor.to_owned();
    let limit     = i64::from(query.limit.max(1));
    let active    = (!query.include_inactive).then(|| encode_dt(Utc::now()));

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String)> {
          Ok((row.get(0)?, row.get(1)?))
        };
        let rows = match active {
          None => {
            let mut stmt = conn.prepare(
              "SELECT i.id, i.cond
               FROM interest_conds c
               JOIN interests i ON i.id = c.interest_id
               WHERE c.cond_id = ?1 AND c.interest_id > ?2
               ORDER BY c.interest_id
               LIMIT ?3",
            )?;
            stmt
              .query_map(rusqlite::params![cond_id, cursor_id, limit], map_row)?
              .collect::<rusqlite::Result<Vec<_>>>()?
          }
          Some(now) => {
            let mut stmt = conn.prepare(
              "SELECT i.id, i.cond
               FROM interest_conds c
               JOIN interests i ON i.id = c.interest_id
               WHERE c.cond_id = ?1 AND c.interest_id > ?2
                 AND i.enabled = 1 AND (i.expires IS NULL OR i.expires > ?4)
               ORDER BY c.interest_id
               LIMIT ?3",
            )?;
            stmt
              .query_map(rusqlite::params![cond_id, cursor_id, limit, now], map_row)?
              .collect::<rusqlite::Result<Vec<_>>>()?
          }
        };
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(interest_id, cond)| {
        Ok(ConditionMatch {
          interest_id,
          condition_id: query.cond_id.clone(),
          condition:    decode_condition(&cond)?,
        })
      })
      .collect()
  }

  async fn count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM interests", [], |r| r.get(0))?))
      .await?;
    Ok(n.max(0) as u64)
  }

  async fn count_users_unique(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM (SELECT DISTINCT group_id, user_id FROM interests)",
          [],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }

  async fn close(&self) -> Result<()> {
    self.conn.clone().close().await?;
    debug!("store closed");
    Ok(())
  }
}
