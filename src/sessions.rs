use crate::storage::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use subtrends_core::CoreError;
use tracing::{debug, info};

/// Oldest entries are dropped beyond this many groups.
pub const MAX_HISTORY: usize = 50;

/// How many entries `history` prints.
pub const HISTORY_DISPLAY_LIMIT: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub history: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            history: Vec::new(),
            created_at: now,
            last_used: now,
        }
    }
}

/// Summarized groups per tenant, persisted as one JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionStore {
    sessions: BTreeMap<String, Session>,
}

impl SessionStore {
    /// A missing file yields an empty store.
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let store: SessionStore = read_json(path).await?;
        debug!("Loaded {} sessions from {:?}", store.sessions.len(), path);
        Ok(store)
    }

    pub async fn save(&self, path: &Path) -> Result<(), CoreError> {
        write_json_atomic(path, self).await?;
        info!("Saved {} sessions to {:?}", self.sessions.len(), path);
        Ok(())
    }

    pub fn history(&self, tenant: &str) -> &[String] {
        self.sessions
            .get(tenant)
            .map(|session| session.history.as_slice())
            .unwrap_or(&[])
    }

    /// Appends `group` unless it is already present (case-insensitive).
    /// Returns whether the history changed.
    pub fn record(&mut self, tenant: &str, group: &str, now: DateTime<Utc>) -> bool {
        let group = group.trim();
        let session = self
            .sessions
            .entry(tenant.to_string())
            .or_insert_with(|| Session::new(now));
        session.last_used = now;

        if group.is_empty()
            || session
                .history
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(group))
        {
            return false;
        }

        session.history.push(group.to_string());
        if session.history.len() > MAX_HISTORY {
            let excess = session.history.len() - MAX_HISTORY;
            session.history.drain(..excess);
        }
        true
    }

    /// Empties the tenant's history, returning how many entries were removed.
    pub fn clear(&mut self, tenant: &str, now: DateTime<Utc>) -> usize {
        match self.sessions.get_mut(tenant) {
            Some(session) => {
                session.last_used = now;
                std::mem::take(&mut session.history).len()
            }
            None => 0,
        }
    }
}

pub fn render_history(history: &[String]) -> String {
    if history.is_empty() {
        return "Your history is empty. Run `subtrends news <group>` to start.".to_string();
    }

    let start = history.len().saturating_sub(HISTORY_DISPLAY_LIMIT);
    let mut output = String::from("Recently summarized groups:\n");
    for group in &history[start..] {
        output.push_str(&format!("  • {}\n", group));
    }
    if start > 0 {
        output.push_str(&format!(
            "\nShowing last {} of {} groups.",
            HISTORY_DISPLAY_LIMIT,
            history.len()
        ));
    }
    output
}
