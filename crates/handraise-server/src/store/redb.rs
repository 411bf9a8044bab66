//! Redb-backed durable store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Rooms
//! and questions survive server restarts; transport state (sessions,
//! memberships) does not and is rebuilt as clients reconnect.

use std::{collections::BTreeSet, path::Path, sync::Arc};

use handraise_proto::{Question, Room, VoteDirection};
use redb::{Database, ReadableTable, TableDefinition};

use super::{QuestionStore, StoreError};

/// Table: rooms
/// Key: room id
/// Value: CBOR-encoded Room
const ROOMS: TableDefinition<&str, &[u8]> = TableDefinition::new("rooms");

/// Table: questions
/// Key: (room id, question id) — tuple keys order by room, then id, so a
/// room's questions range-scan in creation order
/// Value: CBOR-encoded Question
const QUESTIONS: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("questions");

fn io_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Io(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Durable store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the ROOMS and QUESTIONS tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the database cannot be opened or
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        let txn = db.begin_write().map_err(io_err)?;
        {
            let _ = txn.open_table(ROOMS).map_err(io_err)?;
            let _ = txn.open_table(QUESTIONS).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Next question id for a room: one past the highest existing id, found
    /// by scanning to the end of the room's key range.
    fn next_question_id<T: ReadableTable<(&'static str, u64), &'static [u8]>>(
        table: &T,
        room_id: &str,
    ) -> Result<u64, StoreError> {
        let results = table.range((room_id, 0)..=(room_id, u64::MAX)).map_err(io_err)?;

        let mut latest: Option<u64> = None;
        for result in results {
            let (key, _) = result.map_err(io_err)?;
            latest = Some(key.value().1);
        }

        Ok(latest.map_or(0, |id| id + 1))
    }

    /// Read-modify-write a single question inside one write transaction.
    fn update_question(
        &self,
        room_id: &str,
        question_id: u64,
        mutate: impl FnOnce(&mut Question),
    ) -> Result<Question, StoreError> {
        let txn = self.db.begin_write().map_err(io_err)?;

        let question = {
            let mut table = txn.open_table(QUESTIONS).map_err(io_err)?;

            let mut question: Question = match table.get((room_id, question_id)).map_err(io_err)? {
                Some(value) => decode(value.value())?,
                None => {
                    return Err(StoreError::QuestionNotFound {
                        room_id: room_id.to_string(),
                        question_id,
                    });
                },
            };

            mutate(&mut question);

            let bytes = encode(&question)?;
            table.insert((room_id, question_id), bytes.as_slice()).map_err(io_err)?;

            question
        };

        txn.commit().map_err(io_err)?;

        Ok(question)
    }
}

impl QuestionStore for RedbStore {
    fn create_room(&self, room: &Room) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(io_err)?;

        {
            let mut table = txn.open_table(ROOMS).map_err(io_err)?;

            if table.get(room.id.as_str()).map_err(io_err)?.is_some() {
                return Err(StoreError::RoomAlreadyExists(room.id.clone()));
            }

            let bytes = encode(room)?;
            table.insert(room.id.as_str(), bytes.as_slice()).map_err(io_err)?;
        }

        txn.commit().map_err(io_err)?;

        Ok(())
    }

    fn room(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(ROOMS).map_err(io_err)?;

        match table.get(room_id).map_err(io_err)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(ROOMS).map_err(io_err)?;

        let mut rooms = Vec::new();
        for result in table.iter().map_err(io_err)? {
            let (_, value) = result.map_err(io_err)?;
            rooms.push(decode(value.value())?);
        }

        Ok(rooms)
    }

    fn delete_room(&self, room_id: &str) -> Result<bool, StoreError> {
        let txn = self.db.begin_write().map_err(io_err)?;

        let existed = {
            let mut table = txn.open_table(ROOMS).map_err(io_err)?;
            table.remove(room_id).map_err(io_err)?.is_some()
        };

        txn.commit().map_err(io_err)?;

        Ok(existed)
    }

    fn create_question(
        &self,
        room_id: &str,
        text: &str,
        author_identity: &str,
        author_name: &str,
        created_at_secs: u64,
    ) -> Result<Question, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }

        let txn = self.db.begin_write().map_err(io_err)?;

        let question = {
            let rooms = txn.open_table(ROOMS).map_err(io_err)?;
            if rooms.get(room_id).map_err(io_err)?.is_none() {
                return Err(StoreError::RoomNotFound(room_id.to_string()));
            }

            let mut table = txn.open_table(QUESTIONS).map_err(io_err)?;
            let id = Self::next_question_id(&table, room_id)?;

            let question = Question {
                id,
                room_id: room_id.to_string(),
                text: text.to_string(),
                author_name: author_name.to_string(),
                author_identity: author_identity.to_string(),
                upvotes: 0,
                voters: BTreeSet::new(),
                answered: false,
                answered_at_secs: None,
                created_at_secs,
            };

            let bytes = encode(&question)?;
            table.insert((room_id, id), bytes.as_slice()).map_err(io_err)?;

            question
        };

        txn.commit().map_err(io_err)?;

        Ok(question)
    }

    fn questions(
        &self,
        room_id: &str,
        include_answered: bool,
    ) -> Result<Vec<Question>, StoreError> {
        let txn = self.db.begin_read().map_err(io_err)?;

        let rooms = txn.open_table(ROOMS).map_err(io_err)?;
        if rooms.get(room_id).map_err(io_err)?.is_none() {
            return Err(StoreError::RoomNotFound(room_id.to_string()));
        }

        let table = txn.open_table(QUESTIONS).map_err(io_err)?;
        let results = table.range((room_id, 0)..=(room_id, u64::MAX)).map_err(io_err)?;

        let mut questions = Vec::new();
        for result in results {
            let (_, value) = result.map_err(io_err)?;
            let question: Question = decode(value.value())?;
            if include_answered || !question.answered {
                questions.push(question);
            }
        }

        Ok(questions)
    }

    fn question(&self, room_id: &str, question_id: u64) -> Result<Option<Question>, StoreError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(QUESTIONS).map_err(io_err)?;

        match table.get((room_id, question_id)).map_err(io_err)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn apply_vote(
        &self,
        room_id: &str,
        question_id: u64,
        voter: &str,
        direction: VoteDirection,
    ) -> Result<Question, StoreError> {
        self.update_question(room_id, question_id, |question| {
            match direction {
                VoteDirection::Up => question.voters.insert(voter.to_string()),
                VoteDirection::Down => question.voters.remove(voter),
            };
            question.upvotes = question.voters.len() as u32;
        })
    }

    fn toggle_answered(
        &self,
        room_id: &str,
        question_id: u64,
        now_secs: u64,
    ) -> Result<Question, StoreError> {
        self.update_question(room_id, question_id, |question| {
            question.answered = !question.answered;
            question.answered_at_secs = question.answered.then_some(now_secs);
        })
    }

    fn delete_questions(&self, room_id: &str) -> Result<usize, StoreError> {
        let txn = self.db.begin_write().map_err(io_err)?;

        let deleted = {
            let mut table = txn.open_table(QUESTIONS).map_err(io_err)?;

            let keys: Vec<u64> = {
                let results = table.range((room_id, 0)..=(room_id, u64::MAX)).map_err(io_err)?;
                let mut keys = Vec::new();
                for result in results {
                    let (key, _) = result.map_err(io_err)?;
                    keys.push(key.value().1);
                }
                keys
            };

            for id in &keys {
                table.remove((room_id, *id)).map_err(io_err)?;
            }

            keys.len()
        };

        txn.commit().map_err(io_err)?;

        Ok(deleted)
    }
}
