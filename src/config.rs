use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ast::metadata::{Catalog, CatalogRecord};
use crate::ast::node::{Node, NodeKind};
use crate::ast::rewrite::FunctionModifiers;
use crate::ast::unparser::{SqlDialect, DEFAULT_INFIX_FUNCTIONS};

/// A text dialect described in TOML rather than code.
///
/// ```toml
/// use_select_limit = true
/// source_comment = "/* fedsql */ "
///
/// [function_renames]
/// lcase = "LOWER"
///
/// [tables]
/// orders = "ORD_TBL"
///
/// [columns]
/// "orders.id" = "ORD_ID"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectConfig {
    pub use_as_in_group_alias: bool,
    pub use_parens_for_joins: bool,
    pub use_select_limit: bool,
    pub use_parens_for_set_queries: bool,
    pub infix_functions: Vec<String>,
    /// Written before the leading keyword of every top-level command.
    pub source_comment: Option<String>,
    /// Function name (case-insensitive) to the source's name for it.
    pub function_renames: BTreeMap<String, String>,
    /// Logical table name to the name the source knows it by.
    pub tables: BTreeMap<String, String>,
    /// `table.column` to the column's name in the source.
    pub columns: BTreeMap<String, String>,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            use_as_in_group_alias: true,
            use_parens_for_joins: false,
            use_select_limit: false,
            use_parens_for_set_queries: false,
            infix_functions: DEFAULT_INFIX_FUNCTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            source_comment: None,
            function_renames: BTreeMap::new(),
            tables: BTreeMap::new(),
            columns: BTreeMap::new(),
        }
    }
}

impl DialectConfig {
    pub fn get_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fedsql")
            .join("dialect.toml")
    }

    /// Load from `path`, or from the user config directory when no path is
    /// given. A missing default file yields the defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::get_config_path();
                if !path.exists() {
                    tracing::debug!(path = %path.display(), "no dialect config, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read dialect config {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("invalid dialect config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded dialect config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Metadata records for the configured source names.
    pub fn catalog(&self) -> Catalog {
        let mut catalog = Catalog::new();
        for (name, source) in &self.tables {
            catalog.add_table(CatalogRecord::new(name.as_str()).with_name_in_source(source.as_str()));
        }
        for (key, source) in &self.columns {
            match key.rsplit_once('.') {
                Some((table, column)) => {
                    catalog.add_column(
                        table,
                        CatalogRecord::new(column).with_name_in_source(source.as_str()),
                    );
                }
                None => tracing::warn!(column = %key, "column mapping needs a table.column key"),
            }
        }
        catalog
    }

    pub fn function_modifiers(&self) -> FunctionModifiers {
        let mut modifiers = FunctionModifiers::new();
        for (from, to) in &self.function_renames {
            modifiers.rename(from, to);
        }
        modifiers
    }
}

impl SqlDialect for DialectConfig {
    fn use_as_in_group_alias(&self) -> bool {
        self.use_as_in_group_alias
    }

    fn use_parens_for_joins(&self) -> bool {
        self.use_parens_for_joins
    }

    fn use_select_limit(&self) -> bool {
        self.use_select_limit
    }

    fn use_parens_for_set_queries(&self) -> bool {
        self.use_parens_for_set_queries
    }

    fn source_comment(&self, node: Node<'_>) -> String {
        match (&self.source_comment, node.kind()) {
            (
                Some(comment),
                NodeKind::Select
                | NodeKind::Insert
                | NodeKind::Update
                | NodeKind::Delete
                | NodeKind::Call,
            ) => comment.clone(),
            _ => String::new(),
        }
    }

    fn is_infix_function(&self, name: &str) -> bool {
        self.infix_functions.iter().any(|f| f == name)
    }
}
