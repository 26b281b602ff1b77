//!
//! The state manager behind the daemon: owns the projection, folds newly
//! appended records into it whenever the offset snapshot moves, and
//! commits commands issued by UIs to this replica's own log.

use chrono::NaiveDate;

use crate::crypto::CommandCipher;
use crate::domain::command::Command;
use crate::domain::state::{render, RenderedState, State};
use crate::error::{ParseError, ReplayError};
use crate::store::{LockFile, Store};
use crate::types::OffsetMap;

pub struct StateManager {
    store: Store,
    lock: LockFile,
    cipher: CommandCipher,
    app_id: String,
    state: State,
    offsets: OffsetMap,
}

impl StateManager {
    pub fn new(store: Store, lock: LockFile, cipher: CommandCipher, app_id: String) -> Self {
        Self {
            store,
            lock,
            cipher,
            app_id,
            state: State::default(),
            offsets: OffsetMap::new(),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Fold everything appended since the last refresh into the
    /// projection. Change notifications carry no trusted payload, so the
    /// offset snapshot is the only change detector. Returns whether the
    /// projection moved.
    pub fn refresh(&mut self) -> Result<bool, ReplayError> {
        let _guard = self.lock.shared()?;
        let current = self.store.offsets()?;
        if current == self.offsets {
            return Ok(false);
        }

        for record in self.store.replay(&self.offsets)? {
            let record = record?;
            let plaintext = self
                .cipher
                .decrypt(&record.line, &record.app_id, record.offset)
                .map_err(|_| ReplayError::Auth {
                    app_id: record.app_id.clone(),
                    offset: record.offset,
                })?;
            let command = Command::parse(&plaintext)?;
            self.state.apply(&command);
        }

        tracing::debug!(records_until = ?current, "projection advanced");
        self.offsets = current;
        Ok(true)
    }

    /// Commit UI-issued commands to this replica's log. Each record's
    /// authenticated data binds the offset it lands at, which is why the
    /// exclusive lock spans the whole batch.
    pub fn push_commands(&mut self, commands: &[String]) -> Result<(), ReplayError> {
        let _guard = self.lock.exclusive()?;
        let mut appender = self.store.append(&self.app_id)?;
        for encoded in commands {
            // reject garbage before it is committed forever
            Command::parse(encoded)?;
            let offset = appender.offset()?;
            let record = self.cipher.encrypt(encoded, &self.app_id, offset)?;
            appender.write_record(&record)?;
        }
        Ok(())
    }

    /// Render the projection for a UI.
    pub fn render(&self, active_tag: &str, today: NaiveDate) -> Result<RenderedState, ParseError> {
        render(&self.state, active_tag, today)
    }
}
