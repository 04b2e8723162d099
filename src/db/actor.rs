use crate::db::models::{DbLead, DbWidget, Lead, Widget, decode_object};
use crate::db::patch::{LeadCount, LeadCreate, LeadFilter, PerPage, WidgetCreate, WidgetPatch};
use crate::db::schema::SQLITE_INIT;
use crate::error::FormyChatError;
use ahash::AHashSet;
use chrono::{DateTime, SubsecRound, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};

const LEAD_COLUMNS: &str = "id, widget_id, form, form_id, field, meta, note, created_at, google_sheet_synced_at, deleted_at";
const WIDGET_COLUMNS: &str = "id, name, is_active, config, created_at, updated_at, deleted_at";
const TRANSIENT_PREFIX: &str = "_transient_";

type Reply<T> = RpcReplyPort<Result<T, FormyChatError>>;

#[derive(Debug)]
pub enum DbActorMessage {
    /// Insert a lead and return its id.
    CreateLead(LeadCreate, Reply<i64>),

    /// Filtered, paginated listing of non-deleted leads.
    ListLeads(LeadFilter, Reply<Vec<Lead>>),

    /// Get a non-deleted lead by id.
    FindLead(i64, Reply<Option<Lead>>),

    /// Soft-delete leads of one form tag by id.
    DeleteLeads(Vec<i64>, String, Reply<u64>),

    CountLeads(LeadCount, Reply<u64>),

    /// Unsynced, non-deleted leads in creation order. `None` means no limit.
    ListPendingSync(Option<u64>, Reply<Vec<Lead>>),

    /// Stamp `google_sheet_synced_at` with one shared timestamp.
    MarkSynced(Vec<i64>, Reply<u64>),

    /// Clear `google_sheet_synced_at` on every non-deleted lead.
    ResetSyncStatus(Reply<u64>),

    /// Distinct `field` keys across all non-deleted leads, first-seen order.
    ListFieldKeys(Reply<Vec<String>>),

    CreateWidget(WidgetCreate, Reply<i64>),
    FindWidget(i64, Reply<Option<Widget>>),
    ListWidgets(Reply<Vec<Widget>>),

    /// `(id, name)` of every non-deleted widget.
    WidgetNames(Reply<Vec<(i64, String)>>),

    /// Returns false when the widget does not exist.
    PatchWidget(i64, WidgetPatch, Reply<bool>),
    DeleteWidgets(Vec<i64>, Reply<u64>),

    GetOption(String, Reply<Option<Value>>),
    UpdateOption(String, Value, Reply<()>),
    DeleteOption(String, Reply<bool>),

    SetTransient(String, Value, Duration, Reply<()>),
    GetTransient(String, Reply<Option<Value>>),
    DeleteTransient(String, Reply<bool>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

fn rpc_err(op: &str, e: impl std::fmt::Display) -> FormyChatError {
    FormyChatError::RactorError(format!("DbActor {op} RPC failed: {e}"))
}

impl DbActorHandle {
    pub async fn create_lead(&self, create: LeadCreate) -> Result<i64, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::CreateLead, create)
            .map_err(|e| rpc_err("CreateLead", e))?
    }

    pub async fn list_leads(&self, filter: LeadFilter) -> Result<Vec<Lead>, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::ListLeads, filter)
            .map_err(|e| rpc_err("ListLeads", e))?
    }

    pub async fn find_lead(&self, id: i64) -> Result<Option<Lead>, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::FindLead, id).map_err(|e| rpc_err("FindLead", e))?
    }

    pub async fn delete_leads(
        &self,
        ids: Vec<i64>,
        form: impl Into<String>,
    ) -> Result<u64, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::DeleteLeads, ids, form.into())
            .map_err(|e| rpc_err("DeleteLeads", e))?
    }

    pub async fn count_leads(&self, count: LeadCount) -> Result<u64, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::CountLeads, count)
            .map_err(|e| rpc_err("CountLeads", e))?
    }

    pub async fn list_pending_sync(&self, limit: Option<u64>) -> Result<Vec<Lead>, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::ListPendingSync, limit)
            .map_err(|e| rpc_err("ListPendingSync", e))?
    }

    pub async fn mark_synced(&self, ids: Vec<i64>) -> Result<u64, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::MarkSynced, ids)
            .map_err(|e| rpc_err("MarkSynced", e))?
    }

    pub async fn reset_sync_status(&self) -> Result<u64, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::ResetSyncStatus)
            .map_err(|e| rpc_err("ResetSyncStatus", e))?
    }

    pub async fn list_field_keys(&self) -> Result<Vec<String>, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::ListFieldKeys)
            .map_err(|e| rpc_err("ListFieldKeys", e))?
    }

    pub async fn create_widget(&self, create: WidgetCreate) -> Result<i64, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::CreateWidget, create)
            .map_err(|e| rpc_err("CreateWidget", e))?
    }

    pub async fn find_widget(&self, id: i64) -> Result<Option<Widget>, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::FindWidget, id)
            .map_err(|e| rpc_err("FindWidget", e))?
    }

    pub async fn list_widgets(&self) -> Result<Vec<Widget>, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::ListWidgets)
            .map_err(|e| rpc_err("ListWidgets", e))?
    }

    pub async fn widget_names(&self) -> Result<Vec<(i64, String)>, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::WidgetNames)
            .map_err(|e| rpc_err("WidgetNames", e))?
    }

    pub async fn patch_widget(&self, id: i64, patch: WidgetPatch) -> Result<bool, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::PatchWidget, id, patch)
            .map_err(|e| rpc_err("PatchWidget", e))?
    }

    pub async fn delete_widgets(&self, ids: Vec<i64>) -> Result<u64, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::DeleteWidgets, ids)
            .map_err(|e| rpc_err("DeleteWidgets", e))?
    }

    pub async fn get_option(&self, name: &str) -> Result<Option<Value>, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::GetOption, name.to_string())
            .map_err(|e| rpc_err("GetOption", e))?
    }

    pub async fn update_option(&self, name: &str, value: Value) -> Result<(), FormyChatError> {
        ractor::call!(
            self.actor,
            DbActorMessage::UpdateOption,
            name.to_string(),
            value
        )
        .map_err(|e| rpc_err("UpdateOption", e))?
    }

    pub async fn delete_option(&self, name: &str) -> Result<bool, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::DeleteOption, name.to_string())
            .map_err(|e| rpc_err("DeleteOption", e))?
    }

    pub async fn set_transient(
        &self,
        name: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<(), FormyChatError> {
        ractor::call!(
            self.actor,
            DbActorMessage::SetTransient,
            name.to_string(),
            value,
            ttl
        )
        .map_err(|e| rpc_err("SetTransient", e))?
    }

    pub async fn get_transient(&self, name: &str) -> Result<Option<Value>, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::GetTransient, name.to_string())
            .map_err(|e| rpc_err("GetTransient", e))?
    }

    pub async fn delete_transient(&self, name: &str) -> Result<bool, FormyChatError> {
        ractor::call!(self.actor, DbActorMessage::DeleteTransient, name.to_string())
            .map_err(|e| rpc_err("DeleteTransient", e))?
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let pool = &state.pool;
        match message {
            DbActorMessage::CreateLead(create, reply) => {
                let _ = reply.send(self.create_lead(pool, create).await);
            }
            DbActorMessage::ListLeads(filter, reply) => {
                let _ = reply.send(self.list_leads(pool, filter).await);
            }
            DbActorMessage::FindLead(id, reply) => {
                let _ = reply.send(self.find_lead(pool, id).await);
            }
            DbActorMessage::DeleteLeads(ids, form, reply) => {
                let _ = reply.send(self.delete_leads(pool, ids, form).await);
            }
            DbActorMessage::CountLeads(count, reply) => {
                let _ = reply.send(self.count_leads(pool, count).await);
            }
            DbActorMessage::ListPendingSync(limit, reply) => {
                let _ = reply.send(self.list_pending_sync(pool, limit).await);
            }
            DbActorMessage::MarkSynced(ids, reply) => {
                let _ = reply.send(self.mark_synced(pool, ids).await);
            }
            DbActorMessage::ResetSyncStatus(reply) => {
                let _ = reply.send(self.reset_sync_status(pool).await);
            }
            DbActorMessage::ListFieldKeys(reply) => {
                let _ = reply.send(self.list_field_keys(pool).await);
            }
            DbActorMessage::CreateWidget(create, reply) => {
                let _ = reply.send(self.create_widget(pool, create).await);
            }
            DbActorMessage::FindWidget(id, reply) => {
                let _ = reply.send(self.find_widget(pool, id).await);
            }
            DbActorMessage::ListWidgets(reply) => {
                let _ = reply.send(self.list_widgets(pool).await);
            }
            DbActorMessage::WidgetNames(reply) => {
                let _ = reply.send(self.widget_names(pool).await);
            }
            DbActorMessage::PatchWidget(id, patch, reply) => {
                let _ = reply.send(self.patch_widget(pool, id, patch).await);
            }
            DbActorMessage::DeleteWidgets(ids, reply) => {
                let _ = reply.send(self.delete_widgets(pool, ids).await);
            }
            DbActorMessage::GetOption(name, reply) => {
                let _ = reply.send(self.get_option(pool, &name).await);
            }
            DbActorMessage::UpdateOption(name, value, reply) => {
                let _ = reply.send(self.put_option(pool, &name, &value, None).await);
            }
            DbActorMessage::DeleteOption(name, reply) => {
                let _ = reply.send(self.delete_option(pool, &name).await);
            }
            DbActorMessage::SetTransient(name, value, ttl, reply) => {
                let res = match chrono::Duration::from_std(ttl) {
                    Ok(ttl) => {
                        let key = format!("{TRANSIENT_PREFIX}{name}");
                        self.put_option(pool, &key, &value, Some(now() + ttl)).await
                    }
                    Err(e) => Err(FormyChatError::UnexpectedError(format!(
                        "transient ttl out of range: {e}"
                    ))),
                };
                let _ = reply.send(res);
            }
            DbActorMessage::GetTransient(name, reply) => {
                let _ = reply.send(self.get_transient(pool, &name).await);
            }
            DbActorMessage::DeleteTransient(name, reply) => {
                let key = format!("{TRANSIENT_PREFIX}{name}");
                let _ = reply.send(self.delete_option(pool, &key).await);
            }
        }
        Ok(())
    }
}

/// Stored timestamps are whole seconds so text ordering matches time ordering.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Escapes `%`, `_` and the escape char itself for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `form = ?`, where the default tag also covers rows stored without one.
fn push_form_condition(qb: &mut QueryBuilder<'_, Sqlite>, form: String) {
    if form == crate::db::models::DEFAULT_FORM {
        qb.push(" AND (form = ")
            .push_bind(form)
            .push(" OR form IS NULL OR form = '')");
    } else {
        qb.push(" AND form = ").push_bind(form);
    }
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: Vec<i64>) {
    qb.push("id IN (");
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(id);
    }
    sep.push_unseparated(")");
}

impl DbActor {
    async fn create_lead(
        &self,
        pool: &SqlitePool,
        create: LeadCreate,
    ) -> Result<i64, FormyChatError> {
        let field = serde_json::to_string(&create.field)?;
        let meta = serde_json::to_string(&create.meta)?;

        let id: i64 = sqlx::query_scalar(
            r#"
        INSERT INTO scf_leads (widget_id, form, form_id, field, meta, note, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
        )
        .bind(create.widget_id)
        .bind(create.form)
        .bind(create.form_id)
        .bind(field)
        .bind(meta)
        .bind(create.note)
        .bind(now())
        .fetch_one(pool)
        .await?;

        Ok(id)
    }

    async fn list_leads(
        &self,
        pool: &SqlitePool,
        filter: LeadFilter,
    ) -> Result<Vec<Lead>, FormyChatError> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {LEAD_COLUMNS} FROM scf_leads WHERE deleted_at IS NULL"
        ));

        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (field LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR meta LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR note LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\'");
            if let Ok(widget_id) = search.parse::<i64>() {
                qb.push(" OR widget_id = ").push_bind(widget_id);
            }
            qb.push(")");
        }

        if let Some(after) = filter.after {
            qb.push(" AND created_at >= ").push_bind(after);
        }
        if let Some(before) = filter.before {
            qb.push(" AND created_at <= ").push_bind(before);
        }
        if let Some(widget_id) = filter.widget_id.filter(|w| *w != 0) {
            qb.push(" AND widget_id = ").push_bind(widget_id);
        }
        if let Some(form) = filter.form.filter(|f| !f.is_empty()) {
            push_form_condition(&mut qb, form);
        }
        if let Some(form_id) = filter.form_id.filter(|f| *f != 0) {
            qb.push(" AND form_id = ").push_bind(form_id);
        }

        let dir = filter.order.as_sql();
        qb.push(format!(
            " ORDER BY {} {dir}, id {dir}",
            filter.order_by.as_sql()
        ));

        if let PerPage::Count(per_page) = filter.per_page {
            let per_page = i64::from(per_page.max(1));
            let offset = i64::from(filter.page.max(1) - 1) * per_page;
            qb.push(" LIMIT ")
                .push_bind(per_page)
                .push(" OFFSET ")
                .push_bind(offset);
        }

        let rows = qb.build_query_as::<DbLead>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(Lead::from).collect())
    }

    async fn find_lead(&self, pool: &SqlitePool, id: i64) -> Result<Option<Lead>, FormyChatError> {
        let row = sqlx::query_as::<_, DbLead>(&format!(
            "SELECT {LEAD_COLUMNS} FROM scf_leads WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Lead::from))
    }

    async fn delete_leads(
        &self,
        pool: &SqlitePool,
        ids: Vec<i64>,
        form: String,
    ) -> Result<u64, FormyChatError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE scf_leads SET deleted_at = ");
        qb.push_bind(now()).push(" WHERE deleted_at IS NULL");
        push_form_condition(&mut qb, form);
        qb.push(" AND ");
        push_id_list(&mut qb, ids);

        let affected = qb.build().execute(pool).await?.rows_affected();
        debug!(affected, "leads soft-deleted");
        Ok(affected)
    }

    async fn count_leads(&self, pool: &SqlitePool, count: LeadCount) -> Result<u64, FormyChatError> {
        let n: i64 = match count {
            LeadCount::Total => {
                sqlx::query_scalar("SELECT COUNT(*) FROM scf_leads WHERE deleted_at IS NULL")
                    .fetch_one(pool)
                    .await?
            }
            LeadCount::Form(form) => {
                let mut qb: QueryBuilder<'_, Sqlite> =
                    QueryBuilder::new("SELECT COUNT(*) FROM scf_leads WHERE deleted_at IS NULL");
                push_form_condition(&mut qb, form);
                qb.build_query_scalar().fetch_one(pool).await?
            }
            LeadCount::Synced => {
                sqlx::query_scalar(
                    r#"
                SELECT COUNT(*) FROM scf_leads
                WHERE google_sheet_synced_at IS NOT NULL
                AND deleted_at IS NULL
                "#,
                )
                .fetch_one(pool)
                .await?
            }
            LeadCount::PendingSync => {
                sqlx::query_scalar(
                    r#"
                SELECT COUNT(*) FROM scf_leads
                WHERE google_sheet_synced_at IS NULL
                AND deleted_at IS NULL
                "#,
                )
                .fetch_one(pool)
                .await?
            }
        };
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn list_pending_sync(
        &self,
        pool: &SqlitePool,
        limit: Option<u64>,
    ) -> Result<Vec<Lead>, FormyChatError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit
            .and_then(|l| i64::try_from(l).ok())
            .unwrap_or(-1);

        let rows = sqlx::query_as::<_, DbLead>(&format!(
            r#"
        SELECT {LEAD_COLUMNS}
        FROM scf_leads
        WHERE google_sheet_synced_at IS NULL
        AND deleted_at IS NULL
        ORDER BY created_at ASC, id ASC
        LIMIT ?
        "#
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Lead::from).collect())
    }

    async fn mark_synced(&self, pool: &SqlitePool, ids: Vec<i64>) -> Result<u64, FormyChatError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE scf_leads SET google_sheet_synced_at = ");
        qb.push_bind(now()).push(" WHERE ");
        push_id_list(&mut qb, ids);

        let affected = qb.build().execute(pool).await?.rows_affected();
        debug!(affected, "leads marked synced");
        Ok(affected)
    }

    async fn reset_sync_status(&self, pool: &SqlitePool) -> Result<u64, FormyChatError> {
        let res = sqlx::query(
            r#"
        UPDATE scf_leads
        SET google_sheet_synced_at = NULL
        WHERE deleted_at IS NULL
        "#,
        )
        .execute(pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn list_field_keys(&self, pool: &SqlitePool) -> Result<Vec<String>, FormyChatError> {
        let blobs: Vec<String> = sqlx::query_scalar(
            r#"
        SELECT field FROM scf_leads
        WHERE deleted_at IS NULL AND field IS NOT NULL AND field != ''
        ORDER BY id
        "#,
        )
        .fetch_all(pool)
        .await?;

        let mut seen: AHashSet<String> = AHashSet::new();
        let mut keys = Vec::new();
        for blob in &blobs {
            for key in decode_object(Some(blob)).keys() {
                if seen.insert(key.clone()) {
                    keys.push(key.clone());
                }
            }
        }
        Ok(keys)
    }

    async fn create_widget(
        &self,
        pool: &SqlitePool,
        create: WidgetCreate,
    ) -> Result<i64, FormyChatError> {
        let now = now();
        let config = serde_json::to_string(&create.config)?;
        let id: i64 = sqlx::query_scalar(
            r#"
        INSERT INTO scf_widgets (name, is_active, config, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
        )
        .bind(create.name)
        .bind(create.is_active)
        .bind(config)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;
        Ok(id)
    }

    async fn find_widget(
        &self,
        pool: &SqlitePool,
        id: i64,
    ) -> Result<Option<Widget>, FormyChatError> {
        let row = sqlx::query_as::<_, DbWidget>(&format!(
            "SELECT {WIDGET_COLUMNS} FROM scf_widgets WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(Widget::from))
    }

    async fn list_widgets(&self, pool: &SqlitePool) -> Result<Vec<Widget>, FormyChatError> {
        let rows = sqlx::query_as::<_, DbWidget>(&format!(
            "SELECT {WIDGET_COLUMNS} FROM scf_widgets WHERE deleted_at IS NULL ORDER BY id"
        ))
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(Widget::from).collect())
    }

    async fn widget_names(&self, pool: &SqlitePool) -> Result<Vec<(i64, String)>, FormyChatError> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, name FROM scf_widgets WHERE deleted_at IS NULL ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    async fn patch_widget(
        &self,
        pool: &SqlitePool,
        id: i64,
        patch: WidgetPatch,
    ) -> Result<bool, FormyChatError> {
        let WidgetPatch {
            name,
            is_active,
            config,
        } = patch;

        let name_set = name.is_some();
        let is_active_set = is_active.is_some();
        let config_set = config.is_some();
        let config = config.map(|c| serde_json::to_string(&c)).transpose()?;
        let updated_at = now();

        let res = sqlx::query(
            r#"
        UPDATE scf_widgets
        SET
            name = COALESCE(?, name),
            is_active = COALESCE(?, is_active),
            config = COALESCE(?, config),
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
        )
        .bind(name)
        .bind(is_active)
        .bind(config)
        .bind(updated_at)
        .bind(id)
        .execute(pool)
        .await?;

        let affected = res.rows_affected();
        debug!(
            table = "scf_widgets",
            id,
            affected,
            updated_at = %updated_at,
            name_set,
            is_active_set,
            config_set,
            "db patch applied"
        );
        Ok(affected > 0)
    }

    async fn delete_widgets(&self, pool: &SqlitePool, ids: Vec<i64>) -> Result<u64, FormyChatError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE scf_widgets SET deleted_at = ");
        qb.push_bind(now()).push(" WHERE deleted_at IS NULL AND ");
        push_id_list(&mut qb, ids);
        Ok(qb.build().execute(pool).await?.rows_affected())
    }

    async fn get_option(&self, pool: &SqlitePool, name: &str) -> Result<Option<Value>, FormyChatError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM formychat_options WHERE name = ?")
                .bind(name)
                .fetch_optional(pool)
                .await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(FormyChatError::from)
    }

    async fn put_option(
        &self,
        pool: &SqlitePool,
        name: &str,
        value: &Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), FormyChatError> {
        let raw = serde_json::to_string(value)?;
        sqlx::query(
            r#"
        INSERT INTO formychat_options (name, value, expires_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            value = excluded.value,
            expires_at = excluded.expires_at,
            updated_at = excluded.updated_at
        "#,
        )
        .bind(name)
        .bind(raw)
        .bind(expires_at)
        .bind(now())
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn delete_option(&self, pool: &SqlitePool, name: &str) -> Result<bool, FormyChatError> {
        let res = sqlx::query("DELETE FROM formychat_options WHERE name = ?")
            .bind(name)
            .execute(pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_transient(
        &self,
        pool: &SqlitePool,
        name: &str,
    ) -> Result<Option<Value>, FormyChatError> {
        let key = format!("{TRANSIENT_PREFIX}{name}");
        let row: Option<(String, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT value, expires_at FROM formychat_options WHERE name = ?",
        )
        .bind(&key)
        .fetch_optional(pool)
        .await?;

        match row {
            Some((_, Some(expires_at))) if expires_at <= Utc::now() => {
                self.delete_option(pool, &key).await?;
                Ok(None)
            }
            Some((raw, _)) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

/// Spawn the database actor and return a cloneable handle.
///
/// The actor is unnamed so several databases can live in one process.
pub async fn spawn(database_url: &str) -> DbActorHandle {
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .expect("failed to spawn DbActor");

    DbActorHandle { actor }
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), FormyChatError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
