//! Job list filtering, sorting and pagination for the jobs view.

use chrono::NaiveDate;

use crate::api::{Job, JobStatus};

const DEFAULT_ROWS_PER_PAGE: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CreatedAt,
    Status,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// View state of the jobs table. Defaults to newest first, ten per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    /// Only jobs created on this UTC day.
    pub created_on: Option<NaiveDate>,
    pub sort_by: SortKey,
    pub order: SortOrder,
    /// Zero-based page index.
    pub page: usize,
    pub rows_per_page: usize,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            status: None,
            created_on: None,
            sort_by: SortKey::default(),
            order: SortOrder::default(),
            page: 0,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPage<'a> {
    pub jobs: Vec<&'a Job>,
    /// Matching jobs across all pages.
    pub total: usize,
    pub page: usize,
    pub page_count: usize,
}

impl JobQuery {
    #[must_use]
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self.page = 0;
        self
    }

    #[must_use]
    pub fn on_date(mut self, day: NaiveDate) -> Self {
        self.created_on = Some(day);
        self.page = 0;
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Column-header click: select `key` and flip the order.
    pub fn toggle_sort(&mut self, key: SortKey) {
        self.sort_by = key;
        self.order = self.order.flipped();
    }

    pub fn apply<'a>(&self, jobs: &'a [Job]) -> JobPage<'a> {
        let mut matching: Vec<&Job> = jobs
            .iter()
            .filter(|j| self.status.is_none_or(|s| j.status == s))
            .filter(|j| self.created_on.is_none_or(|d| j.created_at.date_naive() == d))
            .collect();

        matching.sort_by(|a, b| {
            let ord = match self.sort_by {
                SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
            };
            match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let rows = self.rows_per_page.max(1);
        let total = matching.len();
        let page_count = total.div_ceil(rows);
        let jobs = matching.into_iter().skip(self.page.saturating_mul(rows)).take(rows).collect();

        JobPage {
            jobs,
            total,
            page: self.page,
            page_count,
        }
    }
}
