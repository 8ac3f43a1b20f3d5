//! Language objects → SQL text.
//!
//! [`SqlUnparser`] renders a tree with one dispatch case per node kind.
//! Sub-expressions go through [`SqlUnparser::append`], which first offers the
//! node to the dialect's [`SqlDialect::translate`] hook, so a dialect can take
//! over any node and fall back to the reference rendering with
//! [`SqlUnparser::append_default`].
use chrono::{NaiveDateTime, Timelike};

use super::metadata::MetadataRef;
use super::node::{LanguageObject, Node};
use super::rewrite::{NormalizeSetQueries, Rewriter};
use super::types::*;
use super::visitor::Visitor;

/// Written in place of a missing node.
pub const UNDEFINED: &str = "<undefined>";

/// Function names rendered as infix operators by default.
pub const DEFAULT_INFIX_FUNCTIONS: &[&str] = &["%", "+", "-", "*", "/", "||", "&", "|", "^", "#"];

/// Rendering policy for a SQL dialect.
pub trait SqlDialect {
    /// `FROM t AS x` rather than `FROM t x`.
    fn use_as_in_group_alias(&self) -> bool {
        true
    }

    /// Parenthesize a join nested as the left operand of another join.
    fn use_parens_for_joins(&self) -> bool {
        false
    }

    /// Render the limit right after `SELECT` instead of at the end.
    fn use_select_limit(&self) -> bool {
        false
    }

    /// Parenthesize plain queries that are operands of a set operation.
    fn use_parens_for_set_queries(&self) -> bool {
        false
    }

    /// Text written before the leading keyword of a command.
    fn source_comment(&self, node: Node<'_>) -> String {
        let _ = node;
        String::new()
    }

    /// Full replacement for a column's rendered name. `group` is the
    /// qualifier, absent for unqualified contexts.
    fn replace_element_name(&self, group: Option<&str>, element: &str) -> Option<String> {
        let _ = (group, element);
        None
    }

    fn is_infix_function(&self, name: &str) -> bool {
        DEFAULT_INFIX_FUNCTIONS.contains(&name)
    }

    /// Escape `value` for use between two `quote` characters.
    fn escape_string(&self, value: &str, quote: char) -> String {
        let doubled: String = [quote, quote].iter().collect();
        value.replace(quote, &doubled)
    }

    /// Render `node` in place of the reference rendering. Returns false to
    /// decline.
    fn translate(&self, node: Node<'_>, out: &mut SqlUnparser<'_, Self>) -> bool
    where
        Self: Sized,
    {
        let _ = (node, out);
        false
    }
}

/// The reference dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDialect;

impl SqlDialect for DefaultDialect {}

/// Single-use renderer. Owns its output until [`SqlUnparser::into_string`].
pub struct SqlUnparser<'d, D: SqlDialect> {
    buffer: String,
    dialect: &'d D,
    /// Depth inside subqueries and set operations; comments only at zero.
    nesting: usize,
}

impl<'d, D: SqlDialect> SqlUnparser<'d, D> {
    pub fn new(dialect: &'d D) -> Self {
        Self {
            buffer: String::new(),
            dialect,
            nesting: 0,
        }
    }

    pub fn dialect(&self) -> &'d D {
        self.dialect
    }

    pub fn push_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub fn push(&mut self, c: char) {
        self.buffer.push(c);
    }

    /// Render `node`, giving the dialect the first chance at it.
    pub fn append<N: LanguageObject + ?Sized>(&mut self, node: &N) {
        let dialect = self.dialect;
        if !dialect.translate(node.as_node(), self) {
            node.accept(self);
        }
    }

    /// Render `node` with the reference rendering, bypassing the dialect hook
    /// for this node only.
    pub fn append_default<N: LanguageObject + ?Sized>(&mut self, node: &N) {
        node.accept(self);
    }

    pub fn append_optional<N: LanguageObject + ?Sized>(&mut self, node: Option<&N>) {
        match node {
            Some(node) => self.append(node),
            None => self.buffer.push_str(UNDEFINED),
        }
    }

    /// Render `nodes` separated by `, `.
    pub fn append_list<N: LanguageObject>(&mut self, nodes: &[N]) {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                self.buffer.push_str(", ");
            }
            self.append(node);
        }
    }

    pub fn into_string(self) -> String {
        self.buffer
    }

    /// Name of a table as the source knows it.
    pub fn table_name(&self, table: &NamedTable) -> String {
        table
            .metadata
            .as_ref()
            .and_then(MetadataRef::source_name)
            .unwrap_or_else(|| table.name.clone())
    }

    /// Qualifier for columns of `table`: its correlation name if aliased.
    pub fn group_name(&self, table: &NamedTable) -> String {
        match &table.correlation_name {
            Some(alias) => alias.clone(),
            None => self.table_name(table),
        }
    }

    pub fn element_name(&self, column: &ColumnReference, qualify: bool) -> String {
        let group = match (&column.table, qualify) {
            (Some(table), true) => Some(self.group_name(table)),
            _ => None,
        };
        let element = column
            .metadata
            .as_ref()
            .and_then(MetadataRef::source_name)
            .unwrap_or_else(|| column.name.clone());
        if let Some(replaced) = self.dialect.replace_element_name(group.as_deref(), &element) {
            return replaced;
        }
        match group {
            Some(group) => format!("{}.{}", group, element),
            None => element,
        }
    }

    fn append_quoted(&mut self, value: &str) {
        let escaped = self.dialect.escape_string(value, '\'');
        self.buffer.push('\'');
        self.buffer.push_str(&escaped);
        self.buffer.push('\'');
    }

    fn append_value(&mut self, value: &Value) {
        match value {
            Value::Boolean(b) => self.push_str(&format!("{{b '{}'}}", b)),
            Value::Date(_) => self.push_str(&format!("{{d '{}'}}", value)),
            Value::Time(_) => self.push_str(&format!("{{t '{}'}}", value)),
            Value::Timestamp(ts) => self.push_str(&format!("{{ts '{}'}}", timestamp_text(ts))),
            Value::Varbinary(_) => self.push_str(&format!("X'{}'", value)),
            v if v.is_numeric() => self.push_str(&v.to_string()),
            v => self.append_quoted(&v.to_string()),
        }
    }

    /// A literal argument written as its raw value, anything else rendered.
    fn append_raw_argument(&mut self, arg: Option<&Expression>) {
        match arg {
            Some(Expression::Literal(literal)) => match literal.value() {
                Some(value) => self.push_str(&value.to_string()),
                None => self.append(literal),
            },
            other => self.append_optional(other),
        }
    }

    fn append_alias(&mut self, alias: &str) {
        self.buffer.push(' ');
        if self.dialect.use_as_in_group_alias() {
            self.buffer.push_str("AS ");
        }
        self.buffer.push_str(alias);
    }

    fn append_nested_condition(&mut self, parent: BooleanOperator, condition: &Condition) {
        match condition {
            Condition::AndOr(nested) if nested.operator != parent => {
                self.push('(');
                self.append(condition);
                self.push(')');
            }
            _ => self.append(condition),
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.nesting += 1;
        f(self);
        self.nesting -= 1;
    }

    fn append_subquery(&mut self, query: &QueryExpression) {
        self.push('(');
        self.nested(|this| this.append(query));
        self.push(')');
    }

    /// `all` is the parent's effective ALL flag, which differs from the
    /// stored one when the parent is itself a parenthesized right operand.
    fn append_set_operand(
        &mut self,
        all: bool,
        operation: SetOperation,
        operand: &QueryExpression,
        right: bool,
    ) {
        match operand {
            QueryExpression::SetQuery(child)
                if right && (child.all != all || child.operation != operation) =>
            {
                self.push('(');
                let dialect = self.dialect;
                if !dialect.translate(child.as_node(), self) {
                    self.append_set_query(child, false);
                }
                self.push(')');
            }
            QueryExpression::Select(_) if self.dialect.use_parens_for_set_queries() => {
                self.append_subquery(operand);
            }
            _ => self.append(operand),
        }
    }

    fn append_trailing_clauses(&mut self, order_by: Option<&OrderBy>, limit: Option<&Limit>) {
        if let Some(order_by) = order_by {
            self.push(' ');
            self.append(order_by);
        }
        if let Some(limit) = limit {
            self.push(' ');
            self.append(limit);
        }
    }

    fn append_set_query(&mut self, node: &SetQuery, all: bool) {
        if let Some(with) = &node.with {
            self.append(with);
        }
        if self.nesting == 0 {
            self.append_comment(leftmost_select(node).as_node());
        }
        self.nested(|this| {
            this.append_set_operand(all, node.operation, &node.left, false);
            this.push(' ');
            this.push_str(node.operation.keyword());
            if all {
                this.push_str(" ALL");
            }
            this.push(' ');
            this.append_set_operand(all, node.operation, &node.right, true);
        });
        self.append_trailing_clauses(node.order_by.as_ref(), node.limit.as_ref());
    }

    /// Written only for the outermost command.
    fn append_comment(&mut self, node: Node<'_>) {
        if self.nesting > 0 {
            return;
        }
        let comment = self.dialect.source_comment(node);
        self.push_str(&comment);
    }
}

/// The select whose keyword leads a set operation's text.
fn leftmost_select(mut query: &SetQuery) -> &Select {
    loop {
        match &query.left {
            QueryExpression::Select(select) => return select,
            QueryExpression::SetQuery(left) => query = left,
        }
    }
}

const RANKING_FUNCTIONS: &[&str] = &["ROW_NUMBER", "RANK", "DENSE_RANK", "PERCENT_RANK", "CUME_DIST"];

fn is_ranking_function(name: &str) -> bool {
    RANKING_FUNCTIONS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(name))
}

fn timestamp_text(ts: &NaiveDateTime) -> String {
    let nanos = ts.nanosecond() % 1_000_000_000;
    let fraction = format!("{:09}", nanos);
    let fraction = fraction.trim_end_matches('0');
    format!(
        "{}.{}",
        ts.format("%Y-%m-%d %H:%M:%S"),
        if fraction.is_empty() { "0" } else { fraction }
    )
}

impl<'ast, 'd, D: SqlDialect> Visitor<'ast> for SqlUnparser<'d, D> {
    fn visit_column_reference(&mut self, node: &'ast ColumnReference) {
        let name = self.element_name(node, true);
        self.push_str(&name);
    }

    fn visit_literal(&mut self, node: &'ast Literal) {
        match node {
            Literal::Bind { .. } => self.push('?'),
            Literal::Null(_) => self.push_str("NULL"),
            Literal::Value(value) => self.append_value(value),
        }
    }

    fn visit_parameter(&mut self, _: &'ast Parameter) {
        self.push('?');
    }

    fn visit_function(&mut self, node: &'ast Function) {
        let name = node.name.as_str();
        let upper = name.to_uppercase();
        if upper == "CAST" || upper == "CONVERT" {
            self.push_str(name);
            self.push('(');
            self.append_optional(node.args.first());
            self.push_str(if upper == "CONVERT" { ", " } else { " AS " });
            self.append_raw_argument(node.args.get(1));
            self.push(')');
        } else if self.dialect.is_infix_function(name) {
            self.push('(');
            for (i, arg) in node.args.iter().enumerate() {
                if i > 0 {
                    self.push(' ');
                    self.push_str(name);
                    self.push(' ');
                }
                self.append(arg);
            }
            self.push(')');
        } else if upper == "TIMESTAMPADD" || upper == "TIMESTAMPDIFF" {
            self.push_str(name);
            self.push('(');
            self.append_raw_argument(node.args.first());
            if node.args.len() > 1 {
                self.push_str(", ");
                self.append_list(&node.args[1..]);
            }
            self.push(')');
        } else {
            self.push_str(name);
            self.push('(');
            self.append_list(&node.args);
            self.push(')');
        }
    }

    fn visit_aggregate_function(&mut self, node: &'ast AggregateFunction) {
        self.push_str(&node.name);
        self.push('(');
        if node.distinct {
            self.push_str("DISTINCT ");
        }
        match &node.expression {
            Some(expression) => self.append(expression.as_ref()),
            // ranking functions such as ROW_NUMBER take no argument at all
            None if is_ranking_function(&node.name) => {}
            None => self.push('*'),
        }
        self.push(')');
        if let Some(condition) = &node.condition {
            self.push_str(" FILTER (WHERE ");
            self.append(condition.as_ref());
            self.push(')');
        }
    }

    fn visit_window_function(&mut self, node: &'ast WindowFunction) {
        self.append(&node.function);
        self.push_str(" OVER ");
        self.append(&node.window);
    }

    fn visit_window_specification(&mut self, node: &'ast WindowSpecification) {
        self.push('(');
        if !node.partition.is_empty() {
            self.push_str("PARTITION BY ");
            self.append_list(&node.partition);
        }
        if let Some(order_by) = &node.order_by {
            if !node.partition.is_empty() {
                self.push(' ');
            }
            self.append(order_by);
        }
        self.push(')');
    }

    fn visit_scalar_subquery(&mut self, node: &'ast ScalarSubquery) {
        self.append_subquery(&node.subquery);
    }

    fn visit_searched_case(&mut self, node: &'ast SearchedCase) {
        self.push_str("CASE");
        for case in &node.cases {
            self.push(' ');
            self.append(case);
        }
        if let Some(else_expression) = &node.else_expression {
            self.push_str(" ELSE ");
            self.append(else_expression.as_ref());
        }
        self.push_str(" END");
    }

    fn visit_searched_when_clause(&mut self, node: &'ast SearchedWhenClause) {
        self.push_str("WHEN ");
        self.append(&node.condition);
        self.push_str(" THEN ");
        self.append(&node.result);
    }

    fn visit_comparison(&mut self, node: &'ast Comparison) {
        self.append(&node.left);
        self.push(' ');
        self.push_str(node.operator.symbol());
        self.push(' ');
        self.append(&node.right);
    }

    fn visit_and_or(&mut self, node: &'ast AndOr) {
        self.append_nested_condition(node.operator, &node.left);
        self.push(' ');
        self.push_str(node.operator.keyword());
        self.push(' ');
        self.append_nested_condition(node.operator, &node.right);
    }

    fn visit_not(&mut self, node: &'ast Not) {
        self.push_str("NOT (");
        self.append(node.criteria.as_ref());
        self.push(')');
    }

    fn visit_is_null(&mut self, node: &'ast IsNull) {
        self.append(&node.expression);
        self.push_str(if node.negated {
            " IS NOT NULL"
        } else {
            " IS NULL"
        });
    }

    fn visit_like(&mut self, node: &'ast Like) {
        self.append(&node.left);
        self.push(' ');
        if node.negated {
            self.push_str("NOT ");
        }
        self.push_str(node.mode.keyword());
        self.push(' ');
        self.append(&node.right);
        if let Some(escape) = node.escape {
            self.push_str(" ESCAPE ");
            self.append_quoted(&escape.to_string());
        }
    }

    fn visit_in(&mut self, node: &'ast In) {
        self.append(&node.left);
        self.push_str(if node.negated { " NOT IN (" } else { " IN (" });
        self.append_list(&node.right);
        self.push(')');
    }

    fn visit_subquery_in(&mut self, node: &'ast SubqueryIn) {
        self.append(&node.left);
        self.push_str(if node.negated { " NOT IN " } else { " IN " });
        self.append_subquery(&node.subquery);
    }

    fn visit_exists(&mut self, node: &'ast Exists) {
        self.push_str("EXISTS ");
        self.append_subquery(&node.subquery);
    }

    fn visit_subquery_comparison(&mut self, node: &'ast SubqueryComparison) {
        self.append(&node.left);
        self.push(' ');
        self.push_str(node.operator.symbol());
        self.push(' ');
        self.push_str(node.quantifier.keyword());
        self.push(' ');
        self.append_subquery(&node.subquery);
    }

    fn visit_named_table(&mut self, node: &'ast NamedTable) {
        let name = self.table_name(node);
        self.push_str(&name);
        if let Some(alias) = &node.correlation_name {
            self.append_alias(alias);
        }
    }

    fn visit_derived_table(&mut self, node: &'ast DerivedTable) {
        self.append_subquery(&node.query);
        self.append_alias(&node.correlation_name);
    }

    fn visit_join(&mut self, node: &'ast Join) {
        let parens_for_joins = self.dialect.use_parens_for_joins();
        match &node.left {
            TableReference::Join(_) if parens_for_joins => {
                self.push('(');
                self.append(&node.left);
                self.push(')');
            }
            left => self.append(left),
        }
        self.push(' ');
        self.push_str(node.join_type.keyword());
        self.push_str(" JOIN ");
        match &node.right {
            TableReference::Join(_) if parens_for_joins || node.join_type == JoinType::Cross => {
                self.push('(');
                self.append(&node.right);
                self.push(')');
            }
            right => self.append(right),
        }
        if let Some(condition) = &node.condition {
            self.push_str(" ON ");
            self.append(condition);
        }
    }

    fn visit_derived_column(&mut self, node: &'ast DerivedColumn) {
        self.append(&node.expression);
        if let Some(alias) = &node.alias {
            self.push_str(" AS ");
            self.push_str(alias);
        }
    }

    fn visit_group_by(&mut self, node: &'ast GroupBy) {
        self.push_str("GROUP BY ");
        if node.rollup {
            self.push_str("ROLLUP(");
            self.append_list(&node.elements);
            self.push(')');
        } else {
            self.append_list(&node.elements);
        }
    }

    fn visit_order_by(&mut self, node: &'ast OrderBy) {
        self.push_str("ORDER BY ");
        self.append_list(&node.sort_specifications);
    }

    fn visit_sort_specification(&mut self, node: &'ast SortSpecification) {
        self.append(&node.expression);
        if node.ordering == Ordering::Desc {
            self.push_str(" DESC");
        }
        match node.null_ordering {
            Some(NullOrdering::First) => self.push_str(" NULLS FIRST"),
            Some(NullOrdering::Last) => self.push_str(" NULLS LAST"),
            None => {}
        }
    }

    fn visit_limit(&mut self, node: &'ast Limit) {
        self.push_str("LIMIT ");
        if node.row_offset > 0 {
            self.push_str(&format!("{}, ", node.row_offset));
        }
        self.push_str(&node.row_limit.to_string());
    }

    fn visit_with(&mut self, node: &'ast With) {
        self.push_str("WITH ");
        if node.items.iter().any(|item| item.recursive) {
            self.push_str("RECURSIVE ");
        }
        self.append_list(&node.items);
        self.push(' ');
    }

    fn visit_with_item(&mut self, node: &'ast WithItem) {
        let name = self.group_name(&node.table);
        self.push_str(&name);
        if !node.columns.is_empty() {
            self.push_str(" (");
            for (i, column) in node.columns.iter().enumerate() {
                if i > 0 {
                    self.push_str(", ");
                }
                let name = self.element_name(column, false);
                self.push_str(&name);
            }
            self.push(')');
        }
        self.push_str(" AS ");
        match &node.subquery {
            Some(subquery) => self.append_subquery(subquery),
            None => self.push_str(UNDEFINED),
        }
    }

    fn visit_select(&mut self, node: &'ast Select) {
        if let Some(with) = &node.with {
            self.append(with);
        }
        self.append_comment(node.as_node());
        self.push_str("SELECT ");
        if node.distinct {
            self.push_str("DISTINCT ");
        }
        let select_limit = self.dialect.use_select_limit();
        if let (true, Some(limit)) = (select_limit, &node.limit) {
            self.append(limit);
            self.push(' ');
        }
        self.append_list(&node.derived_columns);
        if !node.from.is_empty() {
            self.push_str(" FROM ");
            self.append_list(&node.from);
        }
        if let Some(filter) = &node.filter {
            self.push_str(" WHERE ");
            self.append(filter);
        }
        if let Some(group_by) = &node.group_by {
            self.push(' ');
            self.append(group_by);
        }
        if let Some(having) = &node.having {
            self.push_str(" HAVING ");
            self.append(having);
        }
        let limit = if select_limit { None } else { node.limit.as_ref() };
        self.append_trailing_clauses(node.order_by.as_ref(), limit);
    }

    fn visit_set_query(&mut self, node: &'ast SetQuery) {
        self.append_set_query(node, node.all);
    }

    fn visit_insert(&mut self, node: &'ast Insert) {
        self.append_comment(node.as_node());
        self.push_str("INSERT INTO ");
        self.append(&node.table);
        if !node.columns.is_empty() {
            self.push_str(" (");
            for (i, column) in node.columns.iter().enumerate() {
                if i > 0 {
                    self.push_str(", ");
                }
                let name = self.element_name(column, false);
                self.push_str(&name);
            }
            self.push(')');
        }
        self.push(' ');
        self.nested(|this| this.append(&node.value_source));
    }

    fn visit_expression_value_source(&mut self, node: &'ast ExpressionValueSource) {
        self.push_str("VALUES (");
        self.append_list(&node.values);
        self.push(')');
    }

    fn visit_iterator_value_source(&mut self, node: &'ast IteratorValueSource) {
        let markers = vec!["?"; node.column_count];
        self.push_str("VALUES (");
        self.push_str(&markers.join(", "));
        self.push(')');
    }

    fn visit_update(&mut self, node: &'ast Update) {
        self.append_comment(node.as_node());
        self.push_str("UPDATE ");
        self.append(&node.table);
        self.push_str(" SET ");
        self.append_list(&node.changes);
        if let Some(filter) = &node.filter {
            self.push_str(" WHERE ");
            self.append(filter);
        }
    }

    fn visit_set_clause(&mut self, node: &'ast SetClause) {
        let name = self.element_name(&node.symbol, false);
        self.push_str(&name);
        self.push_str(" = ");
        self.append(&node.value);
    }

    fn visit_delete(&mut self, node: &'ast Delete) {
        self.append_comment(node.as_node());
        self.push_str("DELETE FROM ");
        self.append(&node.table);
        if let Some(filter) = &node.filter {
            self.push_str(" WHERE ");
            self.append(filter);
        }
    }

    fn visit_batched_updates(&mut self, node: &'ast BatchedUpdates) {
        self.push_str("BEGIN ");
        for command in &node.commands {
            self.append(command);
            self.push_str("; ");
        }
        self.push_str("END");
    }

    fn visit_call(&mut self, node: &'ast Call) {
        self.append_comment(node.as_node());
        self.push_str("EXEC ");
        let name = node
            .metadata
            .as_ref()
            .and_then(MetadataRef::source_name)
            .unwrap_or_else(|| node.name.clone());
        self.push_str(&name);
        self.push('(');
        let inputs = node
            .arguments
            .iter()
            .filter(|arg| matches!(arg.direction, Direction::In | Direction::InOut));
        for (i, argument) in inputs.enumerate() {
            if i > 0 {
                self.push_str(", ");
            }
            self.append(argument);
        }
        self.push(')');
    }

    fn visit_argument(&mut self, node: &'ast Argument) {
        self.append_optional(node.expression.as_ref());
    }
}

/// Render `node` with the reference dialect.
pub fn render<N: LanguageObject + ?Sized>(node: &N) -> String {
    render_with(&DefaultDialect, node)
}

pub fn render_with<D: SqlDialect, N: LanguageObject + ?Sized>(dialect: &D, node: &N) -> String {
    let mut unparser = SqlUnparser::new(dialect);
    unparser.append(node);
    unparser.into_string()
}

/// Render, then normalize nested set queries in place. Parentheses are
/// decided from the tree as it was, so the text equals [`render`].
pub fn render_normalized(command: &mut Command) -> String {
    render_normalized_with(&DefaultDialect, command)
}

pub fn render_normalized_with<D: SqlDialect>(dialect: &D, command: &mut Command) -> String {
    let rendered = render_with(dialect, command);
    NormalizeSetQueries.apply(command);
    rendered
}
