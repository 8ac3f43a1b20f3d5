//! Source translators.
//!
//! A translator turns a command into whatever its source executes: SQL text
//! in the source's dialect, or a native request for non-SQL sources. Text
//! dialects supply a [`SqlDialect`](crate::ast::unparser::SqlDialect) to the
//! reference unparser; other sources walk the tree themselves.
//!
//! Translators are looked up by name in a [`TranslatorRegistry`].
pub mod ldap;
pub mod sqlserver;

use anyhow::{anyhow, Result};

use crate::ast::metadata::Catalog;
use crate::ast::rewrite::{FunctionModifiers, RewritePass};
use crate::ast::types::Command;
use crate::ast::unparser::{render_normalized, render_normalized_with};
use crate::config::DialectConfig;

pub use ldap::{LdapSearch, LdapTranslator};
pub use sqlserver::{SqlServerDialect, SqlServerTranslator};

/// Trait that all source translators implement.
pub trait Translator: Send + Sync {
    /// Unique translator identifier.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Produce the source request for `command`. The command may be
    /// rewritten in place first.
    fn translate(&mut self, command: &mut Command) -> Result<String>;
}

/// The reference SQL rendering, unchanged.
#[derive(Debug, Default)]
pub struct AnsiTranslator;

impl Translator for AnsiTranslator {
    fn name(&self) -> &str {
        "ansi"
    }

    fn description(&self) -> &str {
        "Reference SQL"
    }

    fn translate(&mut self, command: &mut Command) -> Result<String> {
        Ok(render_normalized(command))
    }
}

/// A text dialect read from a [`DialectConfig`]: binds the configured source
/// names, applies the configured function renames, then renders.
#[derive(Debug)]
pub struct ConfiguredTranslator {
    name: String,
    config: DialectConfig,
    catalog: Catalog,
    modifiers: FunctionModifiers,
}

impl ConfiguredTranslator {
    pub fn new(name: impl Into<String>, config: DialectConfig) -> Self {
        Self {
            name: name.into(),
            catalog: config.catalog(),
            modifiers: config.function_modifiers(),
            config,
        }
    }

    pub fn config(&self) -> &DialectConfig {
        &self.config
    }
}

impl Translator for ConfiguredTranslator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "SQL dialect loaded from configuration"
    }

    fn translate(&mut self, command: &mut Command) -> Result<String> {
        self.catalog.bind(command);
        self.modifiers.run(command)?;
        Ok(render_normalized_with(&self.config, command))
    }
}

/// Central registry of translators, keyed by name.
pub struct TranslatorRegistry {
    translators: Vec<Box<dyn Translator>>,
}

impl Default for TranslatorRegistry {
    /// The built-in translators: `ansi`, `sqlserver` and `ldap`.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(AnsiTranslator));
        registry.register(Box::new(SqlServerTranslator::new()));
        registry.register(Box::new(LdapTranslator));
        registry
    }
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            translators: Vec::new(),
        }
    }

    /// Register a translator, replacing any with the same name.
    pub fn register(&mut self, translator: Box<dyn Translator>) {
        if let Some(pos) = self.position(translator.name()) {
            tracing::debug!(translator = translator.name(), "replacing translator");
            self.translators[pos] = translator;
        } else {
            tracing::debug!(translator = translator.name(), "registered translator");
            self.translators.push(translator);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Translator> {
        self.position(name).map(|pos| self.translators[pos].as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.translators.iter().map(|t| t.name()).collect()
    }

    /// List `(name, description)` pairs in registration order.
    pub fn describe(&self) -> Vec<(&str, &str)> {
        self.translators
            .iter()
            .map(|t| (t.name(), t.description()))
            .collect()
    }

    pub fn translate(&mut self, name: &str, command: &mut Command) -> Result<String> {
        let pos = self.position(name).ok_or_else(|| {
            anyhow!(
                "unknown translator {:?} (available: {})",
                name,
                self.names().join(", ")
            )
        })?;
        tracing::debug!(translator = name, "translating command");
        self.translators[pos].translate(command)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.translators
            .iter()
            .position(|t| t.name().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::frontend::parse_single;

    #[test]
    fn test_builtin_names() {
        let registry = TranslatorRegistry::new();
        assert_eq!(registry.names(), vec!["ansi", "sqlserver", "ldap"]);
        assert!(registry.get("SQLServer").is_some());
        assert!(registry.get("oracle").is_none());
    }

    #[test]
    fn test_empty_registry() {
        let registry = TranslatorRegistry::empty();
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_unknown_translator_lists_available() {
        let mut registry = TranslatorRegistry::new();
        let mut command = parse_single("SELECT a FROM t").unwrap();
        let err = registry.translate("oracle", &mut command).unwrap_err();
        assert!(err.to_string().contains("ansi, sqlserver, ldap"));
    }

    #[test]
    fn test_ansi_translation() {
        let mut registry = TranslatorRegistry::new();
        let mut command = parse_single("SELECT a FROM t WHERE b = 'x' LIMIT 5").unwrap();
        let sql = registry.translate("ansi", &mut command).unwrap();
        assert_eq!(sql, "SELECT a FROM t WHERE b = 'x' LIMIT 5");
    }

    #[test]
    fn test_ansi_translation_keeps_except_grouping() {
        let mut registry = TranslatorRegistry::new();
        let mut command = parse_single(
            "SELECT x FROM a EXCEPT (SELECT x FROM b EXCEPT ALL SELECT x FROM c)",
        )
        .unwrap();
        let sql = registry.translate("ansi", &mut command).unwrap();
        assert_eq!(
            sql,
            "SELECT x FROM a EXCEPT (SELECT x FROM b EXCEPT SELECT x FROM c)"
        );
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = TranslatorRegistry::new();
        let config = DialectConfig {
            use_as_in_group_alias: false,
            ..Default::default()
        };
        registry.register(Box::new(ConfiguredTranslator::new("ansi", config)));
        assert_eq!(registry.names().len(), 3);

        let mut command = parse_single("SELECT o.id FROM orders o").unwrap();
        let sql = registry.translate("ansi", &mut command).unwrap();
        assert_eq!(sql, "SELECT o.id FROM orders o");
    }

    #[test]
    fn test_configured_translator_binds_and_renames() {
        let mut config = DialectConfig::default();
        config.tables.insert("orders".into(), "ORD".into());
        config
            .function_renames
            .insert("ucase".into(), "UPPER".into());
        let mut translator = ConfiguredTranslator::new("configured", config);

        let mut command = parse_single("SELECT UCASE(orders.name) FROM orders").unwrap();
        let sql = translator.translate(&mut command).unwrap();
        assert_eq!(sql, "SELECT UPPER(ORD.name) FROM ORD");
    }
}
