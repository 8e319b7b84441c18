//! Period-aware upsert policy.
//!
//! Monthly exports are authoritative for their month: a re-import replaces
//! the stored row (last write wins). Yearly reports are coarse back-fill:
//! they never overwrite what is already there (first write wins).
//!
//! Dry-run performs the same existence checks and classification without
//! writing. A ledger of the keys a live run would have written keeps later
//! groups in the same run classified the way a live run would see them.

use std::collections::HashSet;

use serde::Serialize;

use crate::file_type::FileType;
use crate::record::{DownloadRecord, RecordKey};
use crate::store::DownloadStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertPolicy {
    /// Insert, or replace an existing row wholesale.
    Replace,
    /// Insert, or leave an existing row untouched.
    KeepExisting,
}

impl UpsertPolicy {
    pub fn for_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Monthly => UpsertPolicy::Replace,
            FileType::Report => UpsertPolicy::KeepExisting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    Ignored,
}

/// Applies records to the store, or predicts what applying would do.
#[derive(Debug, Default)]
pub struct Upserter {
    dry_run: bool,
    /// Keys a live run would have written so far (dry-run only).
    planned: HashSet<RecordKey>,
    /// Dry-run with reset: the store counts as already wiped.
    assume_empty: bool,
}

impl Upserter {
    pub fn live() -> Self {
        Self::default()
    }

    pub fn dry_run(assume_empty: bool) -> Self {
        Self {
            dry_run: true,
            planned: HashSet::new(),
            assume_empty,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn apply(
        &mut self,
        store: &mut DownloadStore,
        policy: UpsertPolicy,
        record: &DownloadRecord,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        if self.dry_run {
            return self.predict(store, policy, record).await;
        }

        match policy {
            UpsertPolicy::Replace => {
                let existed = store.exists(&record.key()).await?;
                store.replace(record).await?;
                Ok(if existed {
                    UpsertOutcome::Replaced
                } else {
                    UpsertOutcome::Inserted
                })
            }
            UpsertPolicy::KeepExisting => Ok(if store.insert_if_absent(record).await? {
                UpsertOutcome::Inserted
            } else {
                UpsertOutcome::Ignored
            }),
        }
    }

    async fn predict(
        &mut self,
        store: &mut DownloadStore,
        policy: UpsertPolicy,
        record: &DownloadRecord,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        let key = record.key();
        let existed = self.planned.contains(&key) || (!self.assume_empty && store.exists(&key).await?);
        self.planned.insert(key);

        Ok(match (policy, existed) {
            (_, false) => UpsertOutcome::Inserted,
            (UpsertPolicy::Replace, true) => UpsertOutcome::Replaced,
            (UpsertPolicy::KeepExisting, true) => UpsertOutcome::Ignored,
        })
    }
}
