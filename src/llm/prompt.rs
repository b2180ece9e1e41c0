//! Prompt construction for generation requests.
//!
//! Builds the system prompt with the schema context injected, cached by
//! schema content hash so repeated requests against an unchanged database
//! reuse the rendered text.

use crate::db::SchemaContext;
use crate::llm::types::Message;
use std::sync::Arc;

/// System prompt template for the SQL generation request.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are an expert SQL analyst for a SQLite database. Translate the user's question into a single SQLite SELECT statement using the schema below.

{schema}

INSTRUCTIONS:
- Use ONLY tables and columns that exist in the schema; never invent names
- Infer relationships from column names (e.g., customer_id references customers.id) and JOIN accordingly
- Use aliases for computed columns (e.g., COUNT(*) AS total_count)
- Use ROUND(expr, 2) for decimal results
- For date filters use strftime() or BETWEEN with string comparison
- For "top N" questions use ORDER BY ... DESC LIMIT N
- Prefer LEFT JOIN when looking for records that have no matches
- When totals span a junction table, multiply price by quantity at the line-item level
- Generate exactly one SELECT statement; never any other kind of statement

OUTPUT FORMAT:
Return the SQL wrapped in a ```sql code block. If the question cannot be
answered from this schema, reply in plain text with no code block explaining
why."#;

/// Builds the system prompt with the schema context injected.
pub fn build_system_prompt(schema: &SchemaContext) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{schema}", &schema.format_for_llm())
}

/// Builds the message list for one generation request.
pub fn build_messages(system_prompt: &str, question: &str) -> Vec<Message> {
    vec![Message::system(system_prompt), Message::user(question)]
}

/// Cache for the rendered system prompt.
///
/// Keyed by the schema content hash; a schema change between requests
/// invalidates it automatically.
#[derive(Debug, Default)]
pub struct PromptCache {
    schema_hash: u64,
    system_prompt: Option<Arc<str>>,
}

impl PromptCache {
    /// Creates a new empty prompt cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached system prompt, rebuilding if the schema changed.
    pub fn get_or_build(&mut self, schema: &SchemaContext) -> Arc<str> {
        let hash = schema.content_hash();
        if self.schema_hash != hash || self.system_prompt.is_none() {
            self.schema_hash = hash;
            self.system_prompt = Some(Arc::from(build_system_prompt(schema)));
        }
        Arc::clone(self.system_prompt.as_ref().expect("just populated"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnDescriptor, TableInfo};

    fn sample_schema() -> SchemaContext {
        SchemaContext {
            tables: vec![TableInfo::new(
                "customers",
                vec![
                    ColumnDescriptor::new("id", "INTEGER").primary_key().not_null(),
                    ColumnDescriptor::new("name", "TEXT").not_null(),
                ],
            )],
        }
    }

    #[test]
    fn test_system_prompt_contains_schema() {
        let prompt = build_system_prompt(&sample_schema());
        assert!(prompt.contains("Table: customers"));
        assert!(prompt.contains("id: INTEGER (PK, NOT NULL)"));
        assert!(prompt.contains("SQLite"));
    }

    #[test]
    fn test_system_prompt_contains_instructions() {
        let prompt = build_system_prompt(&sample_schema());
        assert!(prompt.contains("INSTRUCTIONS:"));
        assert!(prompt.contains("OUTPUT FORMAT:"));
        assert!(prompt.contains("```sql"));
    }

    #[test]
    fn test_build_messages_shape() {
        let prompt = build_system_prompt(&sample_schema());
        let messages = build_messages(&prompt, "How many customers are there?");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, crate::llm::Role::System);
        assert_eq!(messages[1].role, crate::llm::Role::User);
        assert_eq!(messages[1].content, "How many customers are there?");
    }

    #[test]
    fn test_prompt_cache_reuses_until_schema_changes() {
        let mut cache = PromptCache::new();
        let schema = sample_schema();

        let first = cache.get_or_build(&schema);
        let second = cache.get_or_build(&schema);
        assert!(Arc::ptr_eq(&first, &second));

        let mut changed = sample_schema();
        changed.tables[0]
            .columns
            .push(ColumnDescriptor::new("region", "TEXT"));
        let third = cache.get_or_build(&changed);
        assert!(!Arc::ptr_eq(&first, &third));
        assert!(third.contains("region"));
    }
}
