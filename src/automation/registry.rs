use super::session::AutomationSession;
use crate::shared::ids::CaseId;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// One live session per case.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<CaseId, AutomationSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the case's session, building a fresh one when none exists or
    /// the existing one has finished.
    pub fn open<F>(&mut self, case_id: &CaseId, build: F) -> &mut AutomationSession
    where
        F: FnOnce(CaseId) -> AutomationSession,
    {
        match self.sessions.entry(case_id.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().status().is_terminal() {
                    entry.insert(build(case_id.clone()));
                }
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(build(case_id.clone())),
        }
    }

    pub fn get(&self, case_id: &CaseId) -> Option<&AutomationSession> {
        self.sessions.get(case_id)
    }

    pub fn get_mut(&mut self, case_id: &CaseId) -> Option<&mut AutomationSession> {
        self.sessions.get_mut(case_id)
    }

    pub fn remove(&mut self, case_id: &CaseId) -> Option<AutomationSession> {
        self.sessions.remove(case_id)
    }

    pub fn case_ids(&self) -> impl Iterator<Item = &CaseId> {
        self.sessions.keys()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
