//! In-memory repository used to exercise phase logic without git.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::commit::tests::{header, text_diff};
use crate::commit::Commit;
use crate::errors::RepoError;
use crate::git::{HistoryReader, HistoryWriter};

#[derive(Default)]
pub(crate) struct FakeRepo {
    commits: HashMap<String, Commit>,
    slice: Vec<String>,
    base: String,
    head: String,
    disjoint: bool,
    fail_fetch: bool,
    dirty: bool,
    tracked: Option<String>,
    rejects: HashSet<String>,
    existing_branches: Vec<String>,
    fetched: RefCell<Vec<(String, String)>>,
    created: RefCell<Vec<(String, Option<String>)>>,
    applied: RefCell<Vec<Commit>>,
    pushed: RefCell<Vec<(String, String)>>,
}

impl FakeRepo {
    /// A reader whose merge-base is `base` and whose fetched head is `head`.
    pub(crate) fn reader(base: &str, head: &str) -> Self {
        Self {
            base: base.to_string(),
            head: head.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn with_commit(mut self, id: &str, parents: &[&str], paths: &[&str]) -> Self {
        let commit = Commit::new(
            header(id, parents, &format!("Commit {}\n\nBody of {}.", id, id)),
            paths.iter().map(|p| text_diff(p)).collect(),
        );
        self.commits.insert(id.to_string(), commit);
        self
    }

    pub(crate) fn with_slice(mut self, ids: &[&str]) -> Self {
        self.slice = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub(crate) fn with_tracked(mut self, source_id: &str) -> Self {
        self.tracked = Some(source_id.to_string());
        self
    }

    pub(crate) fn with_existing_branch(mut self, name: &str) -> Self {
        self.existing_branches.push(name.to_string());
        self
    }

    pub(crate) fn without_merge_base(mut self) -> Self {
        self.disjoint = true;
        self
    }

    pub(crate) fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub(crate) fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    /// Refuse to apply the commit with this source id.
    pub(crate) fn rejecting(mut self, id: &str) -> Self {
        self.rejects.insert(id.to_string());
        self
    }

    pub(crate) fn fetched(&self) -> Vec<(String, String)> {
        self.fetched.borrow().clone()
    }

    pub(crate) fn branches(&self) -> Vec<(String, Option<String>)> {
        self.created.borrow().clone()
    }

    pub(crate) fn applied(&self) -> Vec<Commit> {
        self.applied.borrow().clone()
    }

    pub(crate) fn applied_source_ids(&self) -> Vec<String> {
        self.applied
            .borrow()
            .iter()
            .map(|c| c.id().to_string())
            .collect()
    }

    pub(crate) fn pushed(&self) -> Vec<(String, String)> {
        self.pushed.borrow().clone()
    }
}

impl HistoryReader for FakeRepo {
    fn fetch_ref(&self, remote: &str, refspec: &str) -> Result<(), RepoError> {
        if self.fail_fetch {
            return Err(RepoError::FetchFailed {
                remote: remote.to_string(),
                refspec: refspec.to_string(),
                detail: "couldn't find remote ref".into(),
            });
        }
        self.fetched
            .borrow_mut()
            .push((remote.to_string(), refspec.to_string()));
        Ok(())
    }

    fn rev_parse(&self, rev: &str) -> Result<String, RepoError> {
        if self.commits.contains_key(rev) {
            Ok(rev.to_string())
        } else {
            Ok(self.head.clone())
        }
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String, RepoError> {
        if self.disjoint {
            return Err(RepoError::NoMergeBase {
                a: a.to_string(),
                b: b.to_string(),
            });
        }
        Ok(self.base.clone())
    }

    fn ancestor_slice(&self, _base: &str, _head: &str) -> Result<Option<Vec<String>>, RepoError> {
        if self.slice.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.slice.clone()))
        }
    }

    fn resolve_commit(&self, id: &str) -> Option<Commit> {
        self.commits.get(id).cloned()
    }

    fn last_tracked_source_id(
        &self,
        _branch: &str,
        _trailer: &str,
    ) -> Result<Option<String>, RepoError> {
        Ok(self.tracked.clone())
    }
}

impl HistoryWriter for FakeRepo {
    fn location(&self) -> String {
        "<fake>".into()
    }

    fn is_clean(&self) -> Result<bool, RepoError> {
        Ok(!self.dirty)
    }

    fn checkout_branch(&self, name: &str, start_point: Option<&str>) -> Result<(), RepoError> {
        let taken = self.existing_branches.iter().any(|b| b == name)
            || self.created.borrow().iter().any(|(b, _)| b == name);
        if taken {
            return Err(RepoError::BranchExists(name.to_string()));
        }
        self.created
            .borrow_mut()
            .push((name.to_string(), start_point.map(str::to_string)));
        Ok(())
    }

    fn apply_patch(&self, commit: &Commit) -> Result<String, RepoError> {
        if self.rejects.contains(commit.id()) {
            return Err(RepoError::ApplyFailed {
                commit: commit.id().to_string(),
                detail: "patch does not apply".into(),
            });
        }
        self.applied.borrow_mut().push(commit.clone());
        Ok(format!("new-{}", commit.id()))
    }

    fn push_branch(&self, remote: &str, branch: &str) -> Result<(), RepoError> {
        self.pushed
            .borrow_mut()
            .push((remote.to_string(), branch.to_string()));
        Ok(())
    }
}
