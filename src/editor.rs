//! Editing session: a [`SchemaStore`] plus the timers and backend calls that
//! keep it saved and in step with the SQL text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use crate::api::wire::{SchemaDocument, SchemaPatch};
use crate::api::{ApiError, SchemaBackend, SchemaClient};
use crate::config::{EditorConfig, LocalState};
use crate::debounce::Debouncer;
use crate::store::{SaveStatus, SchemaStore, SchemaSummary};

pub const SCHEMA_DESCRIPTION: &str = "Created with DB Maker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Canvas,
    Sql,
}

/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct Editor {
    inner: Arc<Inner>,
}

struct Inner {
    store: Mutex<SchemaStore>,
    view: Mutex<View>,
    backend: Arc<dyn SchemaBackend>,
    config: EditorConfig,
    sql_sync: Debouncer,
    autosave: Debouncer,
    /// Incremented per save so a stale status reset leaves a newer save alone.
    save_seq: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Editor {
    pub fn new(config: EditorConfig, backend: Arc<dyn SchemaBackend>) -> Self {
        let sql_sync = Debouncer::new(config.sql_sync_delay());
        let autosave = Debouncer::new(config.autosave_delay());
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(SchemaStore::new()),
                view: Mutex::new(View::default()),
                backend,
                config,
                sql_sync,
                autosave,
                save_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Session backed by the HTTP API at `config.api_url`.
    pub fn connect(config: EditorConfig) -> Self {
        let client = SchemaClient::new(&config.api_url);
        Self::new(config, Arc::new(client))
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.inner.config
    }

    fn store(&self) -> MutexGuard<'_, SchemaStore> {
        lock(&self.inner.store)
    }

    /// Read the current model.
    pub fn read<R>(&self, f: impl FnOnce(&SchemaStore) -> R) -> R {
        f(&self.store())
    }

    pub fn save_status(&self) -> SaveStatus {
        self.store().save_status()
    }

    pub fn view(&self) -> View {
        *lock(&self.inner.view)
    }

    /// Run a mutation against the store. A change to the persisted model
    /// (re)starts the auto-save countdown.
    pub fn apply<R>(&self, f: impl FnOnce(&mut SchemaStore) -> R) -> R {
        let (result, changed) = {
            let mut store = self.store();
            let before = store.revision();
            let result = f(&mut store);
            (result, store.revision() != before)
        };
        if changed {
            self.schedule_autosave();
        }
        result
    }

    fn schedule_autosave(&self) {
        {
            let store = self.store();
            if store.schema_id().is_none() || store.save_status() == SaveStatus::Saving {
                return;
            }
        }
        let weak = Arc::downgrade(&self.inner);
        self.inner.autosave.schedule(move || async move {
            if let Some(editor) = Editor::from_weak(&weak) {
                tracing::debug!("auto-saving schema");
                // failures are already reflected in the save status
                let _ = editor.save().await;
            }
        });
    }

    /// Record editor text. While the SQL view is active the model follows
    /// once typing pauses.
    pub fn edit_sql(&self, text: impl Into<String>) {
        self.store().set_sql(text);
        if self.view() != View::Sql {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        self.inner.sql_sync.schedule(move || async move {
            if let Some(editor) = Editor::from_weak(&weak) {
                editor.sync_model();
            }
        });
    }

    /// Parse the current text into the model immediately.
    pub fn sync_sql_now(&self) {
        self.inner.sql_sync.cancel();
        self.sync_model();
    }

    fn sync_model(&self) {
        self.apply(|store| {
            let text = store.sql().to_string();
            store.sync_from_sql(&text);
        });
    }

    pub fn set_view(&self, view: View) {
        let previous = std::mem::replace(&mut *lock(&self.inner.view), view);
        if previous == View::Sql && view != View::Sql {
            self.inner.sql_sync.cancel();
        }
    }

    /// Persist the current schema, creating it on first save.
    pub async fn save(&self) -> Result<SchemaDocument, ApiError> {
        let seq = self.inner.save_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let (draft, schema_id) = {
            let mut store = self.store();
            store.set_save_status(SaveStatus::Saving);
            (
                store.to_draft(Some(SCHEMA_DESCRIPTION)),
                store.schema_id().map(str::to_string),
            )
        };

        let backend = &self.inner.backend;
        let result = match &schema_id {
            Some(id) => backend.update(id, &SchemaPatch::from(draft)).await,
            None => backend.create(&draft).await,
        };

        match result {
            Ok(doc) => {
                self.store().mark_saved(&doc);
                tracing::info!(schema_id = %doc.id, name = %doc.name, "schema saved");
                self.reset_status_later(SaveStatus::Saved, self.inner.config.saved_reset(), seq);
                if let Err(e) = self.refresh_schemas().await {
                    tracing::warn!(error = %e, "failed to refresh schema list");
                }
                Ok(doc)
            }
            Err(e) => {
                self.store().set_save_status(SaveStatus::Error);
                tracing::error!(error = %e, "failed to save schema");
                self.reset_status_later(SaveStatus::Error, self.inner.config.error_reset(), seq);
                Err(e)
            }
        }
    }

    fn reset_status_later(&self, expected: SaveStatus, after: Duration, seq: u64) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let Some(editor) = Editor::from_weak(&weak) else {
                return;
            };
            if editor.inner.save_seq.load(Ordering::SeqCst) != seq {
                return;
            }
            let mut store = editor.store();
            if store.save_status() == expected {
                store.set_save_status(SaveStatus::Idle);
            }
        });
    }

    /// Replace the session with a stored schema.
    pub async fn load(&self, schema_id: &str) -> Result<(), ApiError> {
        let doc = match self.inner.backend.get(schema_id).await {
            Ok(doc) => doc,
            Err(e) => {
                self.store().set_save_status(SaveStatus::Error);
                tracing::error!(schema_id, error = %e, "failed to load schema");
                return Err(e);
            }
        };

        self.inner.autosave.cancel();
        self.inner.sql_sync.cancel();
        self.store().apply_document(&doc);
        tracing::info!(schema_id = %doc.id, tables = doc.tables.len(), "schema loaded");
        self.remember_last_opened(Some(doc.id));
        Ok(())
    }

    /// Reopen the schema recorded by the previous session. Returns whether
    /// one was loaded.
    pub async fn restore_last_opened(&self) -> Result<bool, ApiError> {
        let state = match LocalState::load(&self.inner.config.state_path) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable local state");
                return Ok(false);
            }
        };
        match state.last_opened_schema_id {
            Some(id) => self.load(&id).await.map(|_| true),
            None => Ok(false),
        }
    }

    fn remember_last_opened(&self, schema_id: Option<String>) {
        let state = LocalState {
            last_opened_schema_id: schema_id,
        };
        if let Err(e) = state.save(&self.inner.config.state_path) {
            tracing::warn!(error = %e, "failed to record last opened schema");
        }
    }

    pub async fn refresh_schemas(&self) -> Result<(), ApiError> {
        let docs = self.inner.backend.list().await?;
        let summaries = docs.iter().map(SchemaSummary::from).collect();
        self.store().set_available_schemas(summaries);
        Ok(())
    }

    pub fn new_schema(&self, name: Option<&str>) {
        self.inner.autosave.cancel();
        self.inner.sql_sync.cancel();
        self.store().new_schema(name);
    }

    pub async fn delete_schema(&self, schema_id: &str) -> Result<(), ApiError> {
        self.inner.backend.delete(schema_id).await?;
        tracing::info!(schema_id, "schema deleted");

        let was_current = self.store().schema_id() == Some(schema_id);
        if was_current {
            self.new_schema(None);
            self.remember_last_opened(None);
        }
        self.refresh_schemas().await
    }

    /// Stop pending timers. The model itself is left intact.
    pub fn close(&self) {
        self.inner.sql_sync.cancel();
        self.inner.autosave.cancel();
    }

    pub fn has_pending_autosave(&self) -> bool {
        self.inner.autosave.is_pending()
    }

    pub fn has_pending_sql_sync(&self) -> bool {
        self.inner.sql_sync.is_pending()
    }
}
