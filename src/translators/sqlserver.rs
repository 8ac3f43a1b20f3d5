//! SQL Server flavored SQL.
//!
//! Row limits render as `SELECT TOP n`. Function names are adapted before
//! rendering by [`FunctionModifiers`], so the dialect itself only changes
//! how limits and booleans are written.

use anyhow::Result;

use super::Translator;
use crate::ast::collector::collect_objects;
use crate::ast::node::Node;
use crate::ast::rewrite::{FunctionModifiers, RewritePass};
use crate::ast::types::*;
use crate::ast::unparser::{render_normalized_with, SqlDialect, SqlUnparser};
use crate::error::LanguageError;

const NAME: &str = "sqlserver";

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn use_select_limit(&self) -> bool {
        true
    }

    fn is_infix_function(&self, name: &str) -> bool {
        matches!(name, "%" | "+" | "-" | "*" | "/" | "&" | "|" | "^")
    }

    fn translate(&self, node: Node<'_>, out: &mut SqlUnparser<'_, Self>) -> bool {
        match node {
            Node::Limit(limit) if limit.row_offset == 0 => {
                out.push_str("TOP ");
                out.push_str(&limit.row_limit.to_string());
                true
            }
            // no boolean literal type; BIT columns compare against 1 and 0
            Node::Literal(Literal::Value(Value::Boolean(b))) => {
                out.push(if *b { '1' } else { '0' });
                true
            }
            _ => false,
        }
    }
}

/// The standard SQL Server function adaptations.
pub fn sqlserver_functions() -> FunctionModifiers {
    let mut modifiers = FunctionModifiers::new();
    modifiers.rename("lcase", "LOWER");
    modifiers.rename("ucase", "UPPER");
    modifiers.rename("char_length", "LEN");
    modifiers.rename("length", "LEN");
    modifiers.rename("now", "GETDATE");
    modifiers.rename("||", "+");
    modifiers.register("locate", |function| {
        function.name = "CHARINDEX".to_string();
        // a start position of 1 is CHARINDEX's default
        if function.args.len() == 3 && is_literal_one(&function.args[2]) {
            function.args.truncate(2);
        }
    });
    modifiers
}

fn is_literal_one(arg: &Expression) -> bool {
    matches!(
        arg,
        Expression::Literal(Literal::Value(Value::Integer(1) | Value::Long(1)))
    )
}

/// Renames functions, then renders with [`SqlServerDialect`].
#[derive(Debug)]
pub struct SqlServerTranslator {
    modifiers: FunctionModifiers,
}

impl Default for SqlServerTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlServerTranslator {
    pub fn new() -> Self {
        Self {
            modifiers: sqlserver_functions(),
        }
    }

    /// `TOP` cannot express an offset, nor a limit on a set operation.
    fn check_limits(command: &Command) -> Result<(), LanguageError> {
        if collect_objects::<Limit>(command)
            .iter()
            .any(|limit| limit.row_offset > 0)
        {
            return Err(LanguageError::unsupported(NAME, "LIMIT with an offset"));
        }
        if collect_objects::<SetQuery>(command)
            .iter()
            .any(|query| query.limit.is_some())
        {
            return Err(LanguageError::unsupported(NAME, "LIMIT on a set operation"));
        }
        Ok(())
    }
}

impl Translator for SqlServerTranslator {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Microsoft SQL Server"
    }

    fn translate(&mut self, command: &mut Command) -> Result<String> {
        Self::check_limits(command)?;
        self.modifiers.run(command)?;
        Ok(render_normalized_with(&SqlServerDialect, command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::frontend::parse_single;

    fn translate(sql: &str) -> Result<String> {
        let mut command = parse_single(sql).unwrap();
        SqlServerTranslator::new().translate(&mut command)
    }

    #[test]
    fn test_limit_renders_as_top() {
        assert_eq!(
            translate("SELECT a FROM t ORDER BY a LIMIT 10").unwrap(),
            "SELECT TOP 10 a FROM t ORDER BY a"
        );
    }

    #[test]
    fn test_offset_is_unsupported() {
        let err = translate("SELECT a FROM t LIMIT 10 OFFSET 5").unwrap_err();
        let err = err.downcast::<LanguageError>().unwrap();
        assert_eq!(
            err,
            LanguageError::unsupported("sqlserver", "LIMIT with an offset")
        );
    }

    #[test]
    fn test_function_renames() {
        assert_eq!(
            translate("SELECT LCASE(a), CHAR_LENGTH(b) FROM t").unwrap(),
            "SELECT LOWER(a), LEN(b) FROM t"
        );
    }

    #[test]
    fn test_locate_drops_default_start() {
        assert_eq!(
            translate("SELECT LOCATE('x', a, 1), LOCATE('x', a, 3) FROM t").unwrap(),
            "SELECT CHARINDEX('x', a), CHARINDEX('x', a, 3) FROM t"
        );
    }

    #[test]
    fn test_concatenation_uses_plus() {
        assert_eq!(
            translate("SELECT fname || ' ' || lname FROM people").unwrap(),
            "SELECT ((fname + ' ') + lname) FROM people"
        );
    }

    #[test]
    fn test_boolean_literals() {
        assert_eq!(
            translate("SELECT a FROM t WHERE active = TRUE").unwrap(),
            "SELECT a FROM t WHERE active = 1"
        );
    }

    #[test]
    fn test_nested_limit_in_subquery() {
        assert_eq!(
            translate("SELECT a FROM (SELECT a FROM t LIMIT 3) AS s").unwrap(),
            "SELECT a FROM (SELECT TOP 3 a FROM t) AS s"
        );
    }
}
