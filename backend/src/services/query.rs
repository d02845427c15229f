//! Filtered SELECT composition on top of `sqlx::QueryBuilder`
//!
//! Identifiers pushed here come from static table configuration only.
//! Request values always travel as bound parameters.

use chrono::NaiveDateTime;
use shared::{contains_pattern, DateBounds, SortDirection};
use sqlx::{Postgres, QueryBuilder};

/// A SELECT statement that accumulates WHERE conditions
pub struct FilteredQuery<'args> {
    builder: QueryBuilder<'args, Postgres>,
    has_where: bool,
}

impl<'args> FilteredQuery<'args> {
    pub fn new(select: impl Into<String>) -> Self {
        Self {
            builder: QueryBuilder::new(select.into()),
            has_where: false,
        }
    }

    /// Start the next condition and hand back the builder to append it
    fn condition(&mut self) -> &mut QueryBuilder<'args, Postgres> {
        self.builder
            .push(if self.has_where { " AND " } else { " WHERE " });
        self.has_where = true;
        &mut self.builder
    }

    /// Restrict `column` to the half-open window
    pub fn date_bounds(&mut self, column: &str, bounds: &DateBounds) -> &mut Self {
        if let Some(start) = bounds.start {
            self.condition().push(column).push(" >= ").push_bind(start);
        }
        if let Some(end) = bounds.end {
            self.condition().push(column).push(" < ").push_bind(end);
        }
        self
    }

    /// Restrict to rows at or after `since`
    pub fn since(&mut self, column: &str, since: NaiveDateTime) -> &mut Self {
        self.condition().push(column).push(" >= ").push_bind(since);
        self
    }

    /// Case-insensitive substring match
    pub fn contains(&mut self, column: &str, term: Option<&str>) -> &mut Self {
        if let Some(term) = term {
            self.condition()
                .push(column)
                .push(" ILIKE ")
                .push_bind(contains_pattern(term));
        }
        self
    }

    /// Text equality, comparing the column's text rendering
    pub fn equals_text(&mut self, column: &str, value: &str) -> &mut Self {
        self.condition()
            .push(column)
            .push("::text = ")
            .push_bind(value.to_string());
        self
    }

    /// Correlated `EXISTS (<subquery> AND <column> ILIKE ...)`; the
    /// subquery must already carry its own WHERE clause
    pub fn exists_containing(&mut self, subquery: &str, column: &str, term: Option<&str>) -> &mut Self {
        if let Some(term) = term {
            self.condition()
                .push("EXISTS (")
                .push(subquery)
                .push(" AND ")
                .push(column)
                .push(" ILIKE ")
                .push_bind(contains_pattern(term))
                .push(")");
        }
        self
    }

    /// `<expression> <= value`
    pub fn at_most(&mut self, expression: &str, value: i64) -> &mut Self {
        self.condition().push(expression).push(" <= ").push_bind(value);
        self
    }

    /// Any of the columns matches the term (substring or equality)
    pub fn any_column_matches(&mut self, columns: &[&str], term: &str, fuzzy: bool) -> &mut Self {
        if columns.is_empty() {
            return self;
        }
        let pattern = if fuzzy {
            contains_pattern(term)
        } else {
            term.to_string()
        };
        let builder = self.condition();
        builder.push("(");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(*column);
            if fuzzy {
                builder.push("::text ILIKE ");
            } else {
                builder.push("::text = ");
            }
            builder.push_bind(pattern.clone());
        }
        builder.push(")");
        self
    }

    pub fn raw(&mut self, sql: &str) -> &mut Self {
        self.builder.push(sql);
        self
    }

    pub fn group_by(&mut self, expression: &str) -> &mut Self {
        self.builder.push(" GROUP BY ").push(expression);
        self
    }

    pub fn order_by(&mut self, terms: &[(String, SortDirection)]) -> &mut Self {
        for (i, (expression, direction)) in terms.iter().enumerate() {
            self.builder
                .push(if i == 0 { " ORDER BY " } else { ", " })
                .push(expression)
                .push(" ")
                .push(direction.as_sql());
        }
        self
    }

    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.builder.push(" LIMIT ").push_bind(limit);
        self
    }

    pub fn offset(&mut self, offset: i64) -> &mut Self {
        if offset > 0 {
            self.builder.push(" OFFSET ").push_bind(offset);
        }
        self
    }

    pub fn sql(&self) -> &str {
        self.builder.sql()
    }

    pub fn into_builder(self) -> QueryBuilder<'args, Postgres> {
        self.builder
    }
}
