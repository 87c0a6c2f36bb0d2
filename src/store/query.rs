use regex::Regex;
use serde_json::Value;

use crate::Resource;
use crate::Result;
use crate::StoreError;

/// A field filter: the field's JSON rendering must match `pattern`.
///
/// Dotted field names address nested values, e.g. `subscription.sender_id`.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub pattern: Regex,
}

impl FieldFilter {
    pub fn new(
        field: impl Into<String>,
        pattern: &str,
    ) -> Result<Self> {
        let field = field.into();
        let pattern = Regex::new(pattern)
            .map_err(|e| StoreError::Validation(format!("filter on {field} is not a valid expression: {e}")))?;
        Ok(Self { field, pattern })
    }

    fn matches(
        &self,
        value: &Value,
    ) -> bool {
        let pointer = format!("/{}", self.field.replace('.', "/"));
        match value.pointer(&pointer) {
            None => false,
            Some(Value::String(s)) => self.pattern.is_match(s),
            Some(other) => self.pattern.is_match(&other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub skip: usize,
    /// Unbounded when None
    pub limit: Option<usize>,
    pub filters: Vec<FieldFilter>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(
        self,
        skip: usize,
    ) -> Self {
        Self { skip, ..self }
    }

    pub fn limit(
        self,
        limit: usize,
    ) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }

    pub fn filter(
        mut self,
        field: impl Into<String>,
        pattern: &str,
    ) -> Result<Self> {
        self.filters.push(FieldFilter::new(field, pattern)?);
        Ok(self)
    }

    /// Builds a query from request parameters. `skip`/`paging.offset` and
    /// `limit`/`paging.limit` paginate; every other key is a field filter.
    pub fn from_params<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut query = Self::new();
        for (key, value) in params {
            match key {
                "skip" | "paging.offset" => query.skip = parse_count(key, value)?,
                "limit" | "paging.limit" => query.limit = Some(parse_count(key, value)?),
                field => query.filters.push(FieldFilter::new(field, value)?),
            }
        }
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == Some(0) {
            return Err(StoreError::Validation("limit must be greater than zero".into()).into());
        }
        Ok(())
    }

    pub(crate) fn matches(
        &self,
        resource: &Resource,
    ) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        let value = resource.to_value();
        self.filters.iter().all(|f| f.matches(&value))
    }
}

fn parse_count(
    key: &str,
    value: &str,
) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| StoreError::Validation(format!("{key} must be a non-negative integer, got {value:?}")).into())
}

/// One page of a listing plus totals over the whole filtered set
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Resource>,
    /// Matching resources before pagination
    pub total: usize,
    /// 1-based page number
    pub page: usize,
    pub pages: usize,
    /// Items on this page
    pub size: usize,
}

impl Page {
    pub(crate) fn slice(
        matching: Vec<&Resource>,
        query: &ListQuery,
    ) -> Self {
        let total = matching.len();
        let limit = query.limit.unwrap_or(usize::MAX).max(1);
        let pages = total.div_ceil(limit);
        let page = query.skip / limit + 1;

        let items: Vec<Resource> = matching.into_iter().skip(query.skip).take(limit).cloned().collect();
        Self {
            size: items.len(),
            items,
            total,
            page,
            pages,
        }
    }
}
