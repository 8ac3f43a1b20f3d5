//! LDAP search requests.
//!
//! A single-table select becomes an [`LdapSearch`]: the table names the
//! search base, the select list the attributes, the WHERE clause an RFC 4515
//! filter and the LIMIT the size limit. The filter is assembled bottom-up on
//! a fragment stack while the inherited traversal walks the predicate tree.

use anyhow::Result;
use serde::Serialize;

use super::Translator;
use crate::ast::hierarchy::{walk_and_or, walk_not, HierarchyVisitor};
use crate::ast::metadata::MetadataRef;
use crate::ast::node::LanguageObject;
use crate::ast::types::*;
use crate::error::LanguageError;

const NAME: &str = "ldap";

/// Filter used when the select has no WHERE clause.
pub const MATCH_ALL: &str = "(objectClass=*)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LdapSearch {
    pub base: String,
    /// Empty means all attributes.
    pub attributes: Vec<String>,
    pub filter: String,
    pub size_limit: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LdapTranslator;

impl LdapTranslator {
    pub fn search(&self, command: &Command) -> Result<LdapSearch, LanguageError> {
        let select = match command {
            Command::Query(QueryExpression::Select(select)) => select,
            Command::Query(QueryExpression::SetQuery(_)) => {
                return Err(unsupported("set operations"))
            }
            other => return Err(unsupported(other.kind().name())),
        };
        if select.with.is_some() {
            return Err(unsupported("WITH"));
        }
        if select.group_by.is_some() || select.having.is_some() {
            return Err(unsupported("grouping"));
        }
        if select.order_by.is_some() {
            return Err(unsupported("ordering"));
        }

        let table = match select.from.as_slice() {
            [TableReference::Named(table)] => table,
            [TableReference::Derived(_)] => return Err(unsupported("subqueries")),
            [] => return Err(unsupported("a select without FROM")),
            _ => return Err(unsupported("joins")),
        };
        let base = table
            .metadata
            .as_ref()
            .and_then(MetadataRef::source_name)
            .unwrap_or_else(|| table.name.clone());

        let mut attributes = Vec::new();
        for column in &select.derived_columns {
            match &column.expression {
                Expression::Column(c) if c.name == "*" => {}
                Expression::Column(c) => attributes.push(attribute_name(c)),
                other => return Err(unsupported_operand(other)),
            }
        }

        let filter = match &select.filter {
            Some(condition) => FilterBuilder::default().build(condition)?,
            None => MATCH_ALL.to_string(),
        };

        let size_limit = match &select.limit {
            Some(limit) if limit.row_offset > 0 => return Err(unsupported("offsets")),
            Some(limit) => Some(limit.row_limit),
            None => None,
        };

        tracing::debug!(base = %base, filter = %filter, "built LDAP search");
        Ok(LdapSearch {
            base,
            attributes,
            filter,
            size_limit,
        })
    }
}

impl Translator for LdapTranslator {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "LDAP search request (JSON)"
    }

    fn translate(&mut self, command: &mut Command) -> Result<String> {
        let search = self.search(command)?;
        Ok(serde_json::to_string(&search)?)
    }
}

fn unsupported(construct: &str) -> LanguageError {
    LanguageError::unsupported(NAME, construct)
}

fn unsupported_operand(expr: &Expression) -> LanguageError {
    unsupported(match expr {
        Expression::Function(_) | Expression::Aggregate(_) | Expression::Window(_) => "functions",
        Expression::ScalarSubquery(_) => "subqueries",
        Expression::SearchedCase(_) => "CASE expressions",
        Expression::Parameter(_) | Expression::Literal(Literal::Bind { .. }) => "bind parameters",
        Expression::Literal(Literal::Null(_)) => "NULL comparisons",
        Expression::Condition(_) => "nested predicates",
        Expression::Column(_) => "column to column comparisons",
        Expression::Literal(Literal::Value(_)) => "constant predicates",
    })
}

/// Builds filter fragments; each visited predicate leaves exactly one
/// fragment on the stack.
#[derive(Default)]
struct FilterBuilder {
    stack: Vec<String>,
    error: Option<LanguageError>,
}

impl FilterBuilder {
    fn build(mut self, condition: &Condition) -> Result<String, LanguageError> {
        condition.accept(&mut self);
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.pop()),
        }
    }

    /// Push a fragment, or record the first failure and push a placeholder
    /// so parents still find one fragment per child.
    fn push(&mut self, fragment: Result<String, LanguageError>) {
        match fragment {
            Ok(fragment) => self.stack.push(fragment),
            Err(error) => {
                self.error.get_or_insert(error);
                self.stack.push(String::new());
            }
        }
    }

    fn pop(&mut self) -> String {
        self.stack.pop().unwrap_or_default()
    }
}

impl<'ast> HierarchyVisitor<'ast> for FilterBuilder {
    fn visit_comparison(&mut self, node: &'ast Comparison) {
        self.push(comparison(node));
    }

    fn visit_and_or(&mut self, node: &'ast AndOr) {
        walk_and_or(self, node);
        let right = self.pop();
        let left = self.pop();
        let op = match node.operator {
            BooleanOperator::And => '&',
            BooleanOperator::Or => '|',
        };
        let filter = format!("({}{}{})", op, flatten(op, &left), flatten(op, &right));
        self.stack.push(filter);
    }

    fn visit_not(&mut self, node: &'ast Not) {
        walk_not(self, node);
        let inner = self.pop();
        self.stack.push(format!("(!{})", inner));
    }

    fn visit_is_null(&mut self, node: &'ast IsNull) {
        let fragment = attribute(&node.expression).map(|attr| {
            if node.negated {
                format!("({}=*)", attr)
            } else {
                format!("(!({}=*))", attr)
            }
        });
        self.push(fragment);
    }

    fn visit_like(&mut self, node: &'ast Like) {
        self.push(like(node));
    }

    fn visit_in(&mut self, node: &'ast In) {
        self.push(in_list(node));
    }

    fn visit_exists(&mut self, _: &'ast Exists) {
        self.push(Err(unsupported("subqueries")));
    }

    fn visit_subquery_in(&mut self, _: &'ast SubqueryIn) {
        self.push(Err(unsupported("subqueries")));
    }

    fn visit_subquery_comparison(&mut self, _: &'ast SubqueryComparison) {
        self.push(Err(unsupported("subqueries")));
    }
}

/// The members of a same-operator child, so `(&(&a b) c)` becomes `(&a b c)`.
fn flatten(op: char, fragment: &str) -> &str {
    let mut chars = fragment.chars();
    if chars.next() == Some('(') && chars.next() == Some(op) && fragment.ends_with(')') {
        &fragment[2..fragment.len() - 1]
    } else {
        fragment
    }
}

fn comparison(node: &Comparison) -> Result<String, LanguageError> {
    // keep the attribute on the left
    let (column, operator, value) = match (&node.left, &node.right) {
        (Expression::Column(_), _) => (&node.left, node.operator, &node.right),
        (_, Expression::Column(_)) => (&node.right, mirror(node.operator), &node.left),
        _ => (&node.left, node.operator, &node.right),
    };
    let attr = attribute(column)?;
    let value = assertion_value(value)?;
    Ok(match operator {
        ComparisonOperator::Eq => format!("({}={})", attr, value),
        ComparisonOperator::Ne => format!("(!({}={}))", attr, value),
        ComparisonOperator::Ge => format!("({}>={})", attr, value),
        ComparisonOperator::Le => format!("({}<={})", attr, value),
        ComparisonOperator::Lt => format!("(!({}>={}))", attr, value),
        ComparisonOperator::Gt => format!("(!({}<={}))", attr, value),
    })
}

fn mirror(operator: ComparisonOperator) -> ComparisonOperator {
    match operator {
        ComparisonOperator::Lt => ComparisonOperator::Gt,
        ComparisonOperator::Le => ComparisonOperator::Ge,
        ComparisonOperator::Gt => ComparisonOperator::Lt,
        ComparisonOperator::Ge => ComparisonOperator::Le,
        other => other,
    }
}

fn like(node: &Like) -> Result<String, LanguageError> {
    if node.mode != MatchMode::Like {
        return Err(unsupported(node.mode.keyword()));
    }
    let attr = attribute(&node.left)?;
    let pattern = match &node.right {
        Expression::Literal(Literal::Value(Value::String(pattern))) => pattern,
        other => return Err(unsupported_operand(other)),
    };

    let mut value = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            c if Some(c) == node.escape => {
                if let Some(literal) = chars.next() {
                    escape_into(&mut value, literal);
                }
            }
            '%' => value.push('*'),
            '_' => return Err(unsupported("single-character wildcards")),
            c => escape_into(&mut value, c),
        }
    }

    let filter = format!("({}={})", attr, value);
    Ok(if node.negated {
        format!("(!{})", filter)
    } else {
        filter
    })
}

fn in_list(node: &In) -> Result<String, LanguageError> {
    let attr = attribute(&node.left)?;
    let mut terms = Vec::with_capacity(node.right.len());
    for value in &node.right {
        terms.push(format!("({}={})", attr, assertion_value(value)?));
    }
    let filter = match terms.len() {
        1 => terms.remove(0),
        _ => format!("(|{})", terms.concat()),
    };
    Ok(if node.negated {
        format!("(!{})", filter)
    } else {
        filter
    })
}

fn attribute(expr: &Expression) -> Result<String, LanguageError> {
    match expr {
        Expression::Column(column) => Ok(attribute_name(column)),
        other => Err(unsupported_operand(other)),
    }
}

fn attribute_name(column: &ColumnReference) -> String {
    column
        .metadata
        .as_ref()
        .and_then(MetadataRef::source_name)
        .unwrap_or_else(|| column.name.clone())
}

fn assertion_value(expr: &Expression) -> Result<String, LanguageError> {
    match expr {
        Expression::Literal(Literal::Value(Value::Boolean(b))) => {
            Ok(if *b { "TRUE" } else { "FALSE" }.to_string())
        }
        Expression::Literal(Literal::Value(value)) => {
            let mut escaped = String::new();
            for c in value.to_string().chars() {
                escape_into(&mut escaped, c);
            }
            Ok(escaped)
        }
        other => Err(unsupported_operand(other)),
    }
}

/// RFC 4515 value escaping.
fn escape_into(out: &mut String, c: char) {
    match c {
        '*' => out.push_str("\\2a"),
        '(' => out.push_str("\\28"),
        ')' => out.push_str("\\29"),
        '\\' => out.push_str("\\5c"),
        '\0' => out.push_str("\\00"),
        c => out.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::frontend::parse_single;
    use crate::ast::metadata::{Catalog, CatalogRecord};

    fn search(sql: &str) -> Result<LdapSearch, LanguageError> {
        LdapTranslator.search(&parse_single(sql).unwrap())
    }

    fn filter(predicate: &str) -> String {
        search(&format!("SELECT cn FROM people WHERE {}", predicate))
            .unwrap()
            .filter
    }

    #[test]
    fn test_simple_search() {
        let search = search("SELECT cn, mail FROM people WHERE cn = 'Ann' LIMIT 10").unwrap();
        assert_eq!(
            search,
            LdapSearch {
                base: "people".into(),
                attributes: vec!["cn".into(), "mail".into()],
                filter: "(cn=Ann)".into(),
                size_limit: Some(10),
            }
        );
    }

    #[test]
    fn test_no_filter_matches_all() {
        let search = search("SELECT * FROM people").unwrap();
        assert!(search.attributes.is_empty());
        assert_eq!(search.filter, MATCH_ALL);
        assert_eq!(search.size_limit, None);
    }

    #[test]
    fn test_boolean_chains_flatten() {
        assert_eq!(
            filter("a = 1 AND b = 2 AND c = 3"),
            "(&(a=1)(b=2)(c=3))"
        );
        assert_eq!(
            filter("(a = 1 OR b = 2) AND c = 3"),
            "(&(|(a=1)(b=2))(c=3))"
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(filter("a <> 1"), "(!(a=1))");
        assert_eq!(filter("a >= 1"), "(a>=1)");
        assert_eq!(filter("a <= 1"), "(a<=1)");
        assert_eq!(filter("a < 5"), "(!(a>=5))");
        assert_eq!(filter("a > 5"), "(!(a<=5))");
        assert_eq!(filter("5 < a"), "(!(a<=5))");
    }

    #[test]
    fn test_not_and_null_checks() {
        assert_eq!(filter("NOT (a = 1)"), "(!(a=1))");
        assert_eq!(filter("mail IS NULL"), "(!(mail=*))");
        assert_eq!(filter("mail IS NOT NULL"), "(mail=*)");
    }

    #[test]
    fn test_like_and_in() {
        assert_eq!(filter("cn LIKE 'An%'"), "(cn=An*)");
        assert_eq!(filter("cn NOT LIKE '%x%'"), "(!(cn=*x*))");
        assert_eq!(filter("uid IN ('a', 'b')"), "(|(uid=a)(uid=b))");
        assert_eq!(filter("uid IN ('a')"), "(uid=a)");
    }

    #[test]
    fn test_values_are_escaped() {
        assert_eq!(filter("cn = 'a*(b)'"), "(cn=a\\2a\\28b\\29)");
        assert_eq!(filter("cn LIKE '%(x)'"), "(cn=*\\28x\\29)");
    }

    #[test]
    fn test_unsupported_constructs() {
        let cases = [
            ("SELECT a.cn FROM a JOIN b ON a.x = b.x", "joins"),
            ("SELECT cn FROM people WHERE EXISTS (SELECT 1 FROM t)", "subqueries"),
            ("SELECT cn FROM people WHERE LOWER(cn) = 'x'", "functions"),
            ("SELECT cn FROM people ORDER BY cn", "ordering"),
            ("SELECT cn FROM people LIMIT 5 OFFSET 5", "offsets"),
            ("SELECT UPPER(cn) FROM people", "functions"),
            ("SELECT cn FROM people WHERE cn LIKE 'a_'", "single-character wildcards"),
        ];
        for (sql, construct) in cases {
            assert_eq!(
                search(sql).unwrap_err(),
                LanguageError::unsupported("ldap", construct),
                "for {}",
                sql
            );
        }
    }

    #[test]
    fn test_first_error_wins_inside_boolean_tree() {
        let err = search("SELECT cn FROM people WHERE a = 1 OR UPPER(b) = 'X'").unwrap_err();
        assert_eq!(err, LanguageError::unsupported("ldap", "functions"));
    }

    #[test]
    fn test_base_uses_bound_source_name() {
        let mut catalog = Catalog::new();
        catalog.add_table(
            CatalogRecord::new("people").with_name_in_source("ou=people,dc=example,dc=com"),
        );
        let mut command = parse_single("SELECT cn FROM people").unwrap();
        catalog.bind(&mut command);
        let search = LdapTranslator.search(&command).unwrap();
        assert_eq!(search.base, "ou=people,dc=example,dc=com");
    }

    #[test]
    fn test_translate_renders_json() {
        let mut command = parse_single("SELECT cn FROM people WHERE cn = 'Ann'").unwrap();
        let json = LdapTranslator.translate(&mut command).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["filter"], "(cn=Ann)");
        assert_eq!(value["base"], "people");
    }
}
