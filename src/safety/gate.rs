//! The ordered validation gate.
//!
//! Deterministic, database-free checks over a candidate SQL string. The
//! denylist scan is the authority; the sqlparser walk at the end only warns
//! about unknown table references and never rejects (the engine surfaces its
//! own error for those).

use regex::Regex;
use sqlparser::ast::{Query, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;
use tracing::warn;

use super::{AcceptedStatement, RejectCode, Verdict};

/// Keywords refused anywhere in a candidate, comments included.
const DENYLIST: [&str; 12] = [
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE", "ATTACH", "DETACH",
    "PRAGMA", "VACUUM", "REPLACE",
];

/// Validates candidate SQL strings against a fixed set of gates.
///
/// Pure: the same input always yields the same verdict. Construction compiles
/// the denylist pattern once.
#[derive(Debug)]
pub struct QueryValidator {
    denylist: Regex,
    known_tables: Vec<String>,
}

impl QueryValidator {
    /// Creates a validator that knows the current catalog's table names.
    pub fn new(known_tables: Vec<String>) -> Self {
        let pattern = format!(r"(?i)\b(?:{})\b", DENYLIST.join("|"));
        Self {
            // The pattern is assembled from fixed keywords; it always compiles.
            denylist: Regex::new(&pattern).expect("static denylist pattern"),
            known_tables,
        }
    }

    /// Runs the ordered gate, short-circuiting at the first failure.
    ///
    /// Order: emptiness, statement stacking, denylist, statement kind, then
    /// the non-rejecting table-reference check. The denylist runs before the
    /// statement-kind check so that `DROP TABLE x` reports the keyword rather
    /// than the generic "not a SELECT".
    pub fn validate(&self, sql: &str) -> Verdict {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Verdict::rejected(RejectCode::EmptyStatement, "statement is blank");
        }

        // Statement stacking: a terminator followed by anything further.
        if let Some(pos) = trimmed.find(';') {
            if !trimmed[pos + 1..].trim().is_empty() {
                return Verdict::rejected(
                    RejectCode::MultiStatement,
                    "statement terminator followed by further content",
                );
            }
        }

        // Whole-string scan, comments included: a denylisted keyword hidden
        // in a comment is still suspicious.
        if let Some(found) = self.denylist.find(sql) {
            let keyword = found.as_str().to_uppercase();
            return Verdict::rejected(
                RejectCode::DangerousKeyword(keyword.clone()),
                format!("statement contains forbidden keyword {keyword}"),
            );
        }

        let leading = leading_token(trimmed);
        if !leading.eq_ignore_ascii_case("SELECT") && !leading.eq_ignore_ascii_case("WITH") {
            let shown = if leading.is_empty() { "(empty)" } else { leading };
            return Verdict::rejected(
                RejectCode::NotASelect,
                format!("statement begins with '{shown}', expected SELECT or WITH"),
            );
        }

        self.warn_unknown_table_references(trimmed);

        let normalized = trimmed
            .strip_suffix(';')
            .map(str::trim_end)
            .unwrap_or(trimmed)
            .to_string();
        Verdict::Accepted(AcceptedStatement::new(normalized))
    }

    /// Best-effort FROM/JOIN reference check. Unresolvable identifiers are
    /// logged and passed through; parse failures skip the check entirely.
    fn warn_unknown_table_references(&self, sql: &str) {
        let Ok(statements) = Parser::parse_sql(&SQLiteDialect {}, sql) else {
            return;
        };

        let mut referenced = HashSet::new();
        let mut cte_names = HashSet::new();
        for statement in &statements {
            if let Statement::Query(query) = statement {
                collect_query_tables(query, &mut referenced, &mut cte_names);
            }
        }

        for name in referenced {
            let resolvable = cte_names.contains(&name)
                || self
                    .known_tables
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(&name));
            if !resolvable {
                warn!(table = %name, "referenced table not found in catalog; the engine will report the error");
            }
        }
    }
}

/// Returns the first token after leading whitespace and `--` / `/* */`
/// comments.
fn leading_token(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(stripped) = rest.strip_prefix("--") {
            rest = stripped
                .find('\n')
                .map(|i| &stripped[i + 1..])
                .unwrap_or("");
        } else if let Some(stripped) = rest.strip_prefix("/*") {
            rest = stripped
                .find("*/")
                .map(|i| &stripped[i + 2..])
                .unwrap_or("");
        } else {
            break;
        }
    }

    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Collects table names referenced by a query, tracking CTE aliases so they
/// are not reported as unknown.
fn collect_query_tables(query: &Query, tables: &mut HashSet<String>, ctes: &mut HashSet<String>) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            ctes.insert(cte.alias.name.value.clone());
            collect_query_tables(&cte.query, tables, ctes);
        }
    }
    collect_set_expr_tables(&query.body, tables, ctes);
}

fn collect_set_expr_tables(
    set_expr: &SetExpr,
    tables: &mut HashSet<String>,
    ctes: &mut HashSet<String>,
) {
    match set_expr {
        SetExpr::Select(select) => {
            for table_with_joins in &select.from {
                collect_joined_tables(table_with_joins, tables, ctes);
            }
        }
        SetExpr::Query(query) => collect_query_tables(query, tables, ctes),
        SetExpr::SetOperation { left, right, .. } => {
            collect_set_expr_tables(left, tables, ctes);
            collect_set_expr_tables(right, tables, ctes);
        }
        _ => {}
    }
}

fn collect_joined_tables(
    twj: &TableWithJoins,
    tables: &mut HashSet<String>,
    ctes: &mut HashSet<String>,
) {
    collect_factor_tables(&twj.relation, tables, ctes);
    for join in &twj.joins {
        collect_factor_tables(&join.relation, tables, ctes);
    }
}

fn collect_factor_tables(
    factor: &TableFactor,
    tables: &mut HashSet<String>,
    ctes: &mut HashSet<String>,
) {
    match factor {
        TableFactor::Table { name, .. } => {
            if let Some(ident) = name.0.last() {
                tables.insert(ident.value.clone());
            }
        }
        TableFactor::Derived { subquery, .. } => collect_query_tables(subquery, tables, ctes),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => collect_joined_tables(table_with_joins, tables, ctes),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> QueryValidator {
        QueryValidator::new(vec![
            "customers".to_string(),
            "orders".to_string(),
            "products".to_string(),
            "order_items".to_string(),
        ])
    }

    fn assert_rejected(sql: &str, expected: RejectCode) {
        match validator().validate(sql) {
            Verdict::Rejected { code, .. } => assert_eq!(
                code, expected,
                "SQL: '{sql}' - expected {expected:?}, got {code:?}"
            ),
            Verdict::Accepted(stmt) => {
                panic!("SQL: '{sql}' - expected rejection {expected:?}, got Accepted({stmt})")
            }
        }
    }

    fn assert_accepted(sql: &str) -> AcceptedStatement {
        match validator().validate(sql) {
            Verdict::Accepted(stmt) => stmt,
            Verdict::Rejected { code, detail } => {
                panic!("SQL: '{sql}' - expected acceptance, got {code:?}: {detail}")
            }
        }
    }

    // Gate 1: emptiness

    #[test]
    fn test_empty_string_rejected() {
        assert_rejected("", RejectCode::EmptyStatement);
    }

    #[test]
    fn test_whitespace_only_rejected() {
        assert_rejected("   \n\t  ", RejectCode::EmptyStatement);
    }

    // Gate 2: statement stacking

    #[test]
    fn test_stacked_statements_rejected() {
        assert_rejected(
            "SELECT * FROM customers; DELETE FROM customers",
            RejectCode::MultiStatement,
        );
    }

    #[test]
    fn test_stacked_selects_rejected() {
        assert_rejected(
            "SELECT 1; SELECT 2",
            RejectCode::MultiStatement,
        );
    }

    #[test]
    fn test_trailing_semicolon_allowed() {
        let stmt = assert_accepted("SELECT COUNT(*) FROM customers;");
        assert_eq!(stmt.as_str(), "SELECT COUNT(*) FROM customers");
    }

    #[test]
    fn test_trailing_semicolon_with_whitespace_allowed() {
        let stmt = assert_accepted("SELECT 1;  \n");
        assert_eq!(stmt.as_str(), "SELECT 1");
    }

    // Gate 3: denylist

    #[test]
    fn test_drop_rejected_with_keyword() {
        match validator().validate("DROP TABLE customers") {
            Verdict::Rejected {
                code: RejectCode::DangerousKeyword(kw),
                ..
            } => assert_eq!(kw, "DROP"),
            other => panic!("expected DangerousKeyword(DROP), got {other:?}"),
        }
    }

    #[test]
    fn test_every_denylisted_keyword_rejected() {
        for keyword in DENYLIST {
            let sql = format!("SELECT * FROM customers WHERE note = x {keyword} y");
            match validator().validate(&sql) {
                Verdict::Rejected {
                    code: RejectCode::DangerousKeyword(kw),
                    ..
                } => assert_eq!(kw, keyword),
                other => panic!("'{keyword}' not caught, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_denylist_is_case_insensitive() {
        assert_rejected(
            "select * from customers where 1 = (select delete from x)",
            RejectCode::DangerousKeyword("DELETE".to_string()),
        );
        assert_rejected(
            "Drop Table customers",
            RejectCode::DangerousKeyword("DROP".to_string()),
        );
    }

    #[test]
    fn test_keyword_in_line_comment_rejected() {
        assert_rejected(
            "SELECT 1 -- drop table customers",
            RejectCode::DangerousKeyword("DROP".to_string()),
        );
    }

    #[test]
    fn test_keyword_in_block_comment_rejected() {
        assert_rejected(
            "SELECT 1 /* delete from customers */",
            RejectCode::DangerousKeyword("DELETE".to_string()),
        );
    }

    #[test]
    fn test_keyword_in_subquery_rejected() {
        assert_rejected(
            "SELECT * FROM (SELECT * FROM customers) x WHERE exists (pragma y)",
            RejectCode::DangerousKeyword("PRAGMA".to_string()),
        );
    }

    #[test]
    fn test_keyword_inside_identifier_not_rejected() {
        // Token-boundary property: `drop` inside a longer identifier is fine.
        assert_accepted("SELECT dropdown_total FROM customers");
        assert_accepted("SELECT * FROM customers WHERE dropdown_id = 7");
        assert_accepted("SELECT updated_at_count FROM orders");
    }

    #[test]
    fn test_keyword_as_prefix_of_identifier_not_rejected() {
        assert_accepted("SELECT delete_requested_flag FROM customers");
    }

    // Gate 4: statement kind

    #[test]
    fn test_non_select_rejected() {
        assert_rejected("EXPLAIN SELECT * FROM customers", RejectCode::NotASelect);
        assert_rejected("SHOW TABLES", RejectCode::NotASelect);
        assert_rejected("GRANT ALL ON customers TO x", RejectCode::NotASelect);
    }

    #[test]
    fn test_comment_only_rejected_as_not_a_select() {
        assert_rejected("-- just a comment", RejectCode::NotASelect);
    }

    #[test]
    fn test_leading_comments_skipped() {
        assert_accepted("-- total customers\nSELECT COUNT(*) FROM customers");
        assert_accepted("/* header */ SELECT 1");
    }

    #[test]
    fn test_select_case_insensitive() {
        assert_accepted("select * from customers");
        assert_accepted("SeLeCt * FrOm customers");
    }

    #[test]
    fn test_with_clause_accepted() {
        assert_accepted(
            "WITH big AS (SELECT * FROM orders WHERE amount > 1000) SELECT COUNT(*) FROM big",
        );
    }

    // Ordering between gates

    #[test]
    fn test_stacking_reported_before_denylist() {
        // Scenario: SELECT followed by a stacked DELETE reports the stacking,
        // not the keyword.
        assert_rejected(
            "SELECT * FROM customers; DELETE FROM customers",
            RejectCode::MultiStatement,
        );
    }

    #[test]
    fn test_denylist_reported_before_statement_kind() {
        assert_rejected(
            "TRUNCATE TABLE customers",
            RejectCode::DangerousKeyword("TRUNCATE".to_string()),
        );
    }

    // Determinism

    #[test]
    fn test_same_input_same_verdict() {
        let v = validator();
        let a = v.validate("SELECT region, COUNT(*) FROM customers GROUP BY region");
        let b = v.validate("SELECT region, COUNT(*) FROM customers GROUP BY region");
        assert_eq!(a, b);
    }

    // Gate 5: table references never reject

    #[test]
    fn test_unknown_table_passes_through() {
        // The engine, not the validator, owns this error.
        assert_accepted("SELECT * FROM no_such_table");
    }

    #[test]
    fn test_cte_alias_not_treated_as_unknown() {
        assert_accepted("WITH t AS (SELECT id FROM customers) SELECT * FROM t");
    }

    #[test]
    fn test_unparseable_select_passes_gate_five() {
        // sqlparser chokes, the check is skipped, the verdict stands.
        assert_accepted("SELECT ?? FROM customers !!");
    }

    // Leading-token helper

    #[test]
    fn test_leading_token_extraction() {
        assert_eq!(leading_token("SELECT 1"), "SELECT");
        assert_eq!(leading_token("  with t as (select 1) select * from t"), "with");
        assert_eq!(leading_token("-- c\n/* d */ SELECT 1"), "SELECT");
        assert_eq!(leading_token("/* unterminated"), "");
    }
}
