//! Turns a client request into a backend request without doing any I/O

use chrono::{DateTime, Duration, Utc};
use validator::Validate;

use super::backend::{BackendRequest, SortKey, SortOrder};
use super::config::SearchConfig;
use super::error::{SearchError, SearchResult};
use super::request::{DateRange, SearchRequest, MAX_RESULT_WINDOW};
use crate::projection::ProjectionResolver;
use crate::query::{
    CompiledQuery, Operator, QueryCompiler, QueryError, QueryNode, RuleValidator, TypedValue,
    ValidatedRule,
};
use crate::schema::FieldSchema;

/// A fully resolved search, ready to send
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub request: BackendRequest,
    pub date_range: DateRange,
    pub schema_version: u64,
}

/// Validates, compiles and resolves search requests against a schema
/// snapshot
#[derive(Debug, Clone)]
pub struct SearchPlanner {
    config: SearchConfig,
}

impl SearchPlanner {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Build the backend request, or every error the request contains.
    ///
    /// Rule checking and facet/column resolution are independent and run on
    /// the rayon pool side by side.
    pub fn plan(
        &self,
        schema: &FieldSchema,
        request: &SearchRequest,
        now: DateTime<Utc>,
    ) -> SearchResult<SearchPlan> {
        request
            .validate()
            .map_err(|e| SearchError::InvalidRequest(e.to_string()))?;

        let size = request
            .limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit.max(1));
        if request.offset.saturating_add(size) > MAX_RESULT_WINDOW {
            return Err(SearchError::InvalidRequest(format!(
                "offset {} plus limit {} exceeds the result window of {}",
                request.offset, size, MAX_RESULT_WINDOW
            )));
        }

        let resolver = ProjectionResolver::new(
            schema,
            self.config.default_facet_size,
            self.config.max_facet_size,
        );

        let ((rules, compiled, mut errors), ((facets, facet_errors), (columns, column_errors))) =
            rayon::join(
                || compile_rules(schema, request),
                || {
                    (
                        resolver.resolve_facets(&request.facets),
                        resolver.resolve_columns(&request.columns),
                    )
                },
            );

        errors.extend(facet_errors);
        errors.extend(column_errors);
        let query = match compiled {
            Some(query) if errors.is_empty() => query,
            _ => return Err(SearchError::Validation(errors)),
        };

        let (date_range, date_filter) = self.date_window(schema, &rules, now);
        let sort = schema.lookup(&self.config.date_field).map(|field| SortKey {
            path: field.root_variant().path.clone(),
            order: SortOrder::Desc,
        });

        Ok(SearchPlan {
            request: BackendRequest {
                query,
                date_filter,
                facets,
                columns,
                sort,
                from: request.offset,
                size,
            },
            date_range,
            schema_version: schema.version(),
        })
    }

    /// Effective date range plus a filter for whichever bounds the rules
    /// left open. A missing upper bound defaults to `now`; a missing lower
    /// bound to `default_days` before the upper bound.
    fn date_window(
        &self,
        schema: &FieldSchema,
        rules: &[ValidatedRule],
        now: DateTime<Utc>,
    ) -> (DateRange, Option<QueryNode>) {
        let Some(field) = schema.lookup(&self.config.date_field) else {
            return (DateRange { from: None, to: None }, None);
        };

        let bounds = rules
            .iter()
            .filter(|r| r.field_name() == field.name && !r.is_negated())
            .filter_map(|r| match r.value() {
                TypedValue::Single(value) => value.as_date().map(|dt| (r.operator(), dt)),
                _ => None,
            })
            .collect::<Vec<(Operator, DateTime<Utc>)>>();

        let lower = bounds
            .iter()
            .filter(|(op, _)| op.sets_lower_bound())
            .map(|(_, dt)| *dt)
            .max();
        let upper = bounds
            .iter()
            .filter(|(op, _)| op.sets_upper_bound())
            .map(|(_, dt)| *dt)
            .min();

        let to = upper.unwrap_or(now);
        let from = lower.unwrap_or_else(|| {
            // Bounds near the edge of the representable range clamp instead of overflowing
            Duration::try_days(self.config.default_days)
                .and_then(|window| to.checked_sub_signed(window))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });

        let filter = QueryCompiler::date_window(
            field,
            lower.is_none().then_some(from),
            upper.is_none().then_some(to),
        );

        (
            DateRange {
                from: Some(from),
                to: Some(to),
            },
            filter,
        )
    }
}

/// Validate then compile the rules. Compilation also runs over the valid
/// subset so compile-time errors are reported alongside validation errors.
fn compile_rules(
    schema: &FieldSchema,
    request: &SearchRequest,
) -> (Vec<ValidatedRule>, Option<CompiledQuery>, Vec<QueryError>) {
    let (rules, mut errors) = RuleValidator::new(schema).validate(&request.rules);
    match QueryCompiler::compile(&rules) {
        Ok(query) => (rules, Some(query), errors),
        Err(compile_errors) => {
            errors.extend(compile_errors);
            (rules, None, errors)
        }
    }
}
