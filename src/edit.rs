//! Per-row edit state for action items and tasks.
//!
//! ```text
//! Viewing --begin/edit--> Editing --save--> Viewing
//!                            \----cancel--> Viewing
//! ```
//!
//! Edits are last-write-wins: saving overwrites the row with the draft,
//! whatever was written since the draft was taken.

use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::models::ItemRecord;
use crate::records::{update_item, ItemPatch, ItemTable};

#[derive(Debug, Clone, PartialEq)]
enum State {
    Viewing,
    Editing { draft: ItemRecord },
}

#[derive(Debug, Clone)]
pub struct RowEditor {
    table: ItemTable,
    record: ItemRecord,
    state: State,
}

impl RowEditor {
    /// Wrap a row in the viewing state.
    pub fn new(table: ItemTable, record: ItemRecord) -> Self {
        Self {
            table,
            record,
            state: State::Viewing,
        }
    }

    /// Wrap a row and start editing it immediately.
    pub fn begin(table: ItemTable, record: ItemRecord) -> Self {
        let mut editor = Self::new(table, record);
        editor.state = State::Editing {
            draft: editor.record.clone(),
        };
        editor
    }

    pub fn edit(&mut self) -> Result<()> {
        if self.is_editing() {
            return Err(Error::InvalidState("row is already being edited".into()));
        }
        self.state = State::Editing {
            draft: self.record.clone(),
        };
        Ok(())
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, State::Editing { .. })
    }

    /// The last saved version of the row.
    pub fn record(&self) -> &ItemRecord {
        &self.record
    }

    pub fn draft_mut(&mut self) -> Result<&mut ItemRecord> {
        match &mut self.state {
            State::Editing { draft } => Ok(draft),
            State::Viewing => Err(Error::InvalidState("row is not being edited".into())),
        }
    }

    pub fn apply(&mut self, patch: &ItemPatch) -> Result<()> {
        patch.apply(self.draft_mut()?)
    }

    /// Write the draft and return to viewing. On failure the editor stays in
    /// the editing state with the draft intact.
    pub async fn save(&mut self, pool: &SqlitePool) -> Result<&ItemRecord> {
        let draft = match &self.state {
            State::Editing { draft } => draft,
            State::Viewing => return Err(Error::InvalidState("nothing to save".into())),
        };
        if draft.action_item.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "action item description must not be empty".into(),
            ));
        }

        let saved = update_item(pool, self.table, draft).await?;
        tracing::debug!(id = %saved.id, "saved {}", self.table.label());
        self.record = saved;
        self.state = State::Viewing;
        Ok(&self.record)
    }

    /// Drop the draft and return to viewing.
    pub fn cancel(&mut self) -> Result<()> {
        if !self.is_editing() {
            return Err(Error::InvalidState("nothing to cancel".into()));
        }
        self.state = State::Viewing;
        Ok(())
    }
}

/// Load a row, apply `patch` and save it in one step.
pub async fn edit_item(
    pool: &SqlitePool,
    table: ItemTable,
    id: &str,
    patch: &ItemPatch,
) -> Result<ItemRecord> {
    let record = crate::records::get_item(pool, table, id).await?;
    let mut editor = RowEditor::begin(table, record);
    editor.apply(patch)?;
    Ok(editor.save(pool).await?.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::memory_pool;
    use crate::meetings::{create_meeting, NewMeeting};
    use crate::models::{NewItem, Priority};
    use crate::records::{create_item, get_item};

    async fn seeded() -> (SqlitePool, ItemRecord) {
        let pool = memory_pool().await;
        let m = create_meeting(
            &pool,
            &NewMeeting {
                title: "Standup".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let rec = create_item(
            &pool,
            ItemTable::ActionItems,
            &m.id,
            "u",
            &NewItem {
                action_item: "Fix login bug".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        (pool, rec)
    }

    #[tokio::test]
    async fn save_while_viewing_is_rejected() {
        let (pool, rec) = seeded().await;
        let mut editor = RowEditor::new(ItemTable::ActionItems, rec);
        assert!(matches!(editor.save(&pool).await, Err(Error::InvalidState(_))));
        assert!(matches!(editor.cancel(), Err(Error::InvalidState(_))));
        assert!(editor.draft_mut().is_err());
    }

    #[tokio::test]
    async fn cancel_discards_draft() {
        let (pool, rec) = seeded().await;
        let mut editor = RowEditor::begin(ItemTable::ActionItems, rec.clone());
        editor.draft_mut().unwrap().action_item = "Something else".into();
        editor.cancel().unwrap();

        assert!(!editor.is_editing());
        assert_eq!(editor.record().action_item, "Fix login bug");
        assert_eq!(
            get_item(&pool, ItemTable::ActionItems, &rec.id).await.unwrap().action_item,
            "Fix login bug"
        );
    }

    #[tokio::test]
    async fn save_writes_draft_and_returns_to_viewing() {
        let (pool, rec) = seeded().await;
        let mut editor = RowEditor::begin(ItemTable::ActionItems, rec.clone());
        editor.draft_mut().unwrap().priority = Priority::Critical;
        let saved = editor.save(&pool).await.unwrap().clone();

        assert_eq!(saved.priority, Priority::Critical);
        assert!(!editor.is_editing());
        assert_eq!(get_item(&pool, ItemTable::ActionItems, &rec.id).await.unwrap(), saved);

        editor.edit().unwrap();
        assert!(matches!(editor.edit(), Err(Error::InvalidState(_))));
        editor.draft_mut().unwrap().action_item = "   ".into();
        assert!(matches!(editor.save(&pool).await, Err(Error::InvalidRequest(_))));
        assert!(editor.is_editing());
    }
}
