use crate::api::{GdcApi, SearchRequest};
use crate::domain::AuthToken;
use crate::error::GdcError;
use crate::filters::{FilterSet, FilterValue};
use crate::retry::{CancelToken, RetryPolicy};
use crate::table::ResultTable;

pub const DEFAULT_PAGE_SIZE: u32 = 2000;

/// File identifying and case linking fields requested by default.
pub const DEFAULT_FIELDS: [&str; 7] = [
    "file_name",
    "file_id",
    "cases.case_id",
    "cases.submitter_id",
    "cases.samples.sample_type",
    "cases.disease_type",
    "cases.project.project_id",
];

/// Accumulates filters against the GDC file catalog and runs the search.
///
/// The builder is consumed and returned by each filter call, so one value
/// owns its filters at any time.
#[derive(Clone)]
pub struct FileQuery<A: GdcApi> {
    api: A,
    token: Option<AuthToken>,
    filters: FilterSet,
    fields: Vec<String>,
    size: u32,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl<A: GdcApi> FileQuery<A> {
    pub fn new(api: A, token: Option<AuthToken>) -> Self {
        Self {
            api,
            token,
            filters: FilterSet::new(),
            fields: DEFAULT_FIELDS.iter().map(|field| field.to_string()).collect(),
            size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Merges predicates into the filter set; a repeated field replaces its
    /// earlier values.
    pub fn add_filters<I, K, V>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FilterValue>,
    {
        self.filters.extend(predicates);
        self
    }

    pub fn add_filter(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(field, value);
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// The exact body `execute` sends.
    pub fn request(&self) -> SearchRequest {
        SearchRequest {
            filters: self.filters.to_query_filters(),
            fields: self.fields.join(","),
            size: self.size,
            format: "TSV".to_string(),
        }
    }

    /// Runs the search, retrying the same request per the retry policy, and
    /// parses the TSV body.
    pub fn execute(&self) -> Result<ResultTable, GdcError> {
        let request = self.request();
        tracing::info!(filters = self.filters.len(), size = self.size, "querying GDC files");
        let response = self.retry.run(&self.cancel, |attempt| {
            tracing::debug!(attempt, "search attempt");
            self.api
                .search_files(&request, self.token.as_ref())?
                .error_for_status()
        })?;
        let text = String::from_utf8(response.body)
            .map_err(|err| GdcError::TableParse(err.to_string()))?;
        let table = ResultTable::from_tsv(&text)?;
        tracing::info!(rows = table.len(), "query finished");
        Ok(table)
    }
}
