// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use async_trait::async_trait;

/// An editable entity record. `Edit` is the typed command vocabulary for
/// rewriting single fields of the record.
pub trait EntityRecord: Clone + PartialEq {
    type Edit;

    fn apply(&mut self, edit: Self::Edit);
}

/// The remote collaborator for one entity type. Futures stay on the
/// caller's thread; backends may hold non-Sync state.
#[async_trait(?Send)]
pub trait EntityBackend {
    type Id: Copy;
    type Summary: Clone;
    type Record: EntityRecord;

    async fn fetch_list(&self) -> Result<Vec<Self::Summary>>;

    /// The full record for one entity. Sub-resources are fetched and merged
    /// here; any partial failure fails the whole call.
    async fn fetch_detail(&self, id: Self::Id) -> Result<Self::Record>;

    /// Persists an edited record as a sequence of partial updates, aborting
    /// on the first failure.
    async fn push_record(&self, record: &Self::Record) -> Result<()>;
}

/// Proof that a fetch was started under a particular session generation.
/// `finish_open` discards results whose ticket no longer matches.
#[derive(Debug)]
pub struct FetchTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    NoSession,
}

/// Detail/edit session controller for one list view. Holds the row list,
/// the pristine `original` record and the `buffer` the user edits; the two
/// never alias, so a buffered edit cannot leak into the baseline used for
/// dirty checking.
pub struct EntityController<B: EntityBackend> {
    backend: B,
    rows: Vec<B::Summary>,
    original: Option<B::Record>,
    buffer: Option<B::Record>,
    open: bool,
    loading: bool,
    generation: u64,
}

impl<B: EntityBackend> EntityController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            rows: Vec::new(),
            original: None,
            buffer: None,
            open: false,
            loading: false,
            generation: 0,
        }
    }

    pub fn rows(&self) -> &[B::Summary] {
        &self.rows
    }

    pub fn buffer(&self) -> Option<&B::Record> {
        self.buffer.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Replaces the row list wholesale from the backend.
    pub async fn refresh_list(&mut self) -> Result<()> {
        self.rows = self.backend.fetch_list().await?;
        Ok(())
    }

    /// Starts a detail session: the pane opens in its loading state and any
    /// earlier in-flight fetch is invalidated.
    pub fn begin_open(&mut self) -> FetchTicket {
        self.generation += 1;
        self.open = true;
        self.loading = true;
        self.original = None;
        self.buffer = None;
        FetchTicket {
            generation: self.generation,
        }
    }

    /// Lands a fetch result. A result under a superseded ticket is dropped
    /// without touching any state. On success the buffer is an independent
    /// deep copy of the original; on failure both stay empty and the error
    /// is handed back for a status message.
    pub fn finish_open(&mut self, ticket: FetchTicket, result: Result<B::Record>) -> Result<()> {
        if ticket.generation != self.generation {
            return Ok(());
        }
        self.loading = false;
        match result {
            Ok(record) => {
                self.buffer = Some(record.clone());
                self.original = Some(record);
                Ok(())
            }
            Err(err) => {
                self.original = None;
                self.buffer = None;
                Err(err)
            }
        }
    }

    pub async fn open_detail(&mut self, id: B::Id) -> Result<()> {
        let ticket = self.begin_open();
        let result = self.backend.fetch_detail(id).await;
        self.finish_open(ticket, result)
    }

    /// Rewrites one field of the edit buffer. Ignored when no record is
    /// loaded.
    pub fn update(&mut self, edit: <B::Record as EntityRecord>::Edit) {
        if let Some(buffer) = &mut self.buffer {
            buffer.apply(edit);
        }
    }

    /// Structural comparison of the buffer against the original, nested
    /// records and array order included.
    pub fn is_dirty(&self) -> bool {
        match (&self.original, &self.buffer) {
            (Some(original), Some(buffer)) => original != buffer,
            _ => false,
        }
    }

    /// Persists the buffer. On success the session closes and the row list
    /// is refreshed once; on failure the session and buffer survive so the
    /// user can retry without losing edits.
    pub async fn save(&mut self) -> Result<SaveOutcome> {
        let Some(buffer) = self.buffer.clone() else {
            return Ok(SaveOutcome::NoSession);
        };
        self.loading = true;
        let pushed = self.backend.push_record(&buffer).await;
        self.loading = false;
        pushed?;
        self.close_session();
        self.refresh_list().await?;
        Ok(SaveOutcome::Saved)
    }

    /// Discards the session without persisting. The row list keeps its
    /// last fetched contents.
    pub fn cancel(&mut self) {
        self.close_session();
    }

    fn close_session(&mut self) {
        self.generation += 1;
        self.open = false;
        self.loading = false;
        self.original = None;
        self.buffer = None;
    }
}
