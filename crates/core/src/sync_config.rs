//! Role bindings for a single sync phase.
//!
//! A sync configuration says which physical repository is read from, which
//! one is written to, which branches anchor the commit range, and which
//! filter adapts commits on the way across.

use crate::filter::CommitFilter;
use crate::git::Repository;

/// Default prefix for generated branch names.
pub const DEFAULT_BRANCH_PREFIX: &str = "shipsync";

/// Source kind tag used in import branch names.
pub const GITHUB_PR_KIND: &str = "github-pr";

/// `<prefix>-import-<kind>-<id>`.
pub fn import_branch_name(prefix: &str, kind: &str, id: &str) -> String {
    format!("{}-import-{}-{}", prefix, kind, id)
}

/// `<prefix>-export-<branch>`.
pub fn export_branch_name(prefix: &str, source_branch: &str) -> String {
    format!("{}-export-{}", prefix, source_branch)
}

/// Expand a ref template such as `refs/pull/{id}/head`.
pub fn pull_ref(template: &str, id: u64) -> String {
    template.replace("{id}", &id.to_string())
}

/// Pulls an externally opened change (a pull request on the mirror) into
/// the canonical repository.
///
/// `reader` is the mirror checkout; `writer` is the canonical checkout.
pub struct ImportConfig<R = Repository, W = Repository> {
    /// Pull request number on the mirror.
    pub pull_request: u64,
    pub reader: R,
    pub writer: W,
    /// Remote on the reader to fetch the pull request from.
    pub remote: String,
    /// Ref template, `{id}` is replaced by the pull request number.
    pub pull_ref_template: String,
    /// Reader-side branch the pull request was opened against.
    pub base_branch: String,
    /// Writer-side branch the import branch diverges from.
    pub target_branch: String,
    pub branch_prefix: String,
    pub filter: Box<dyn CommitFilter>,
}

impl<R, W> ImportConfig<R, W> {
    pub fn refspec(&self) -> String {
        pull_ref(&self.pull_ref_template, self.pull_request)
    }

    pub fn branch_name(&self) -> String {
        import_branch_name(
            &self.branch_prefix,
            GITHUB_PR_KIND,
            &self.pull_request.to_string(),
        )
    }
}

/// Pushes canonical commits made since the last sync out to the mirror.
///
/// `reader` is the canonical checkout; `writer` is the mirror checkout,
/// which must also be readable to locate the last synced commit.
pub struct ExportConfig<R = Repository, W = Repository> {
    pub reader: R,
    pub writer: W,
    /// Reader-side branch whose new commits are exported.
    pub source_branch: String,
    /// Writer-side branch holding previously exported commits.
    pub target_branch: String,
    /// Trailer naming the source commit on exported commits.
    pub tracking_trailer: String,
    pub branch_prefix: String,
    pub filter: Box<dyn CommitFilter>,
}

impl<R, W> ExportConfig<R, W> {
    pub fn branch_name(&self) -> String {
        export_branch_name(&self.branch_prefix, &self.source_branch)
    }
}
