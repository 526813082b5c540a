use core_types::{Hit, Mount, PartialRecord, SearchOptions};
use index_client::{IndexError, IndexService};
use tracing::{debug, info, warn};

use crate::paths::{dirname, make_parents};

/// Separator between a mount name and the mount-relative path.
pub const MOUNT_SEPARATOR: char = ':';

/// Summary of a finished rename run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameReport {
    /// Pages fetched from the index.
    pub pages: u32,
    /// Hits scanned across all pages.
    pub hits: u64,
    /// Records submitted (or, on a dry run, that would have been).
    pub updated: usize,
    pub dry_run: bool,
}

/// Renames one mount prefix across every record of an index.
///
/// The engine scans all pages of an empty-query search in order, rewrites the
/// hits under `from`, and submits them in a single partial update. One
/// instance performs one run.
pub struct ChangeMount<'a, I: IndexService + ?Sized> {
    index: &'a I,
    from: Mount,
    to: Mount,
    dry_run: bool,
    page: u32,
    pages: u32,
}

impl<'a, I: IndexService + ?Sized> ChangeMount<'a, I> {
    pub fn new(index: &'a I, from: Mount, to: Mount) -> Self {
        Self {
            index,
            from,
            to,
            dry_run: false,
            page: 0,
            pages: 0,
        }
    }

    /// Scan and rewrite without submitting the update.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(mut self) -> Result<RenameReport, IndexError> {
        let mut report = RenameReport {
            dry_run: self.dry_run,
            ..RenameReport::default()
        };
        if self.from == self.to {
            debug!(mount = %self.from, "source and target mounts are identical; nothing to do");
            return Ok(report);
        }

        let mut records = Vec::new();
        let mut hits = self.fetch_first().await?;
        while let Some(batch) = hits {
            report.pages += 1;
            report.hits += batch.len() as u64;
            records.extend(self.process(batch));
            hits = self.fetch_next().await?;
        }
        report.updated = records.len();

        if self.dry_run {
            info!(
                from = %self.from,
                to = %self.to,
                records = report.updated,
                "dry run: skipping partial update"
            );
        } else {
            self.index.partial_update_objects(records).await?;
        }

        info!(
            from = %self.from,
            to = %self.to,
            pages = report.pages,
            hits = report.hits,
            updated = report.updated,
            "mount rename finished"
        );
        Ok(report)
    }

    /// First page; also learns the total page count.
    async fn fetch_first(&mut self) -> Result<Option<Vec<Hit>>, IndexError> {
        let options = SearchOptions::rename_scan(None);
        let Some(page) = self.index.search("", &options).await? else {
            warn!("index reported no first page; treating it as empty");
            self.pages = 0;
            return Ok(None);
        };
        self.pages = page.nb_pages;
        debug!(page = 0, pages = self.pages, hits = page.hits.len(), "fetched first page");
        Ok(Some(page.hits))
    }

    /// Next page, or `None` once the cursor reaches the page count.
    async fn fetch_next(&mut self) -> Result<Option<Vec<Hit>>, IndexError> {
        self.page += 1;
        if self.page >= self.pages {
            return Ok(None);
        }
        let options = SearchOptions::rename_scan(Some(self.page));
        let page = self.index.search("", &options).await?;
        if let Some(page) = &page {
            debug!(page = self.page, hits = page.hits.len(), "fetched page");
        }
        Ok(page.map(|p| p.hits))
    }

    fn process(&self, hits: Vec<Hit>) -> Vec<PartialRecord> {
        hits.into_iter()
            .filter_map(|hit| {
                let Some(path) = hit.path else {
                    warn!(object_id = %hit.object_id, "hit has no path; skipping");
                    return None;
                };
                let new_path = rewrite_path(&self.from, &self.to, &path)?;
                Some(renamed_record(hit.object_id, new_path))
            })
            .collect()
    }
}

/// Move `path` from mount `from` to mount `to`.
///
/// Returns `None` when `path` does not live under `from`. Paths moved onto a
/// named mount are addressed as `name:relative/path`.
pub fn rewrite_path(from: &Mount, to: &Mount, path: &str) -> Option<String> {
    let suffix = match from {
        Mount::Root => path,
        Mount::Named(_) => path.strip_prefix(from.match_prefix().as_str())?,
    };
    Some(match to.name() {
        None => suffix.to_string(),
        Some(name) => format!("{name}{MOUNT_SEPARATOR}{suffix}"),
    })
}

/// Build the write-back payload for a record now living at `path`.
pub fn renamed_record(object_id: String, path: String) -> PartialRecord {
    let dir = dirname(&format!("/{path}")).to_string();
    let parents = make_parents(&dir);
    PartialRecord {
        object_id,
        path,
        parents,
        dir,
    }
}
