//! Per-backend statement tables.
//!
//! Each backend carries one table of twenty entries indexed by
//! [`QueryId::index`]. Entries only hold text; binding the time parameters is
//! the adapter's job.

use tsbench_core::QueryId;

/// One catalogue entry in a backend's dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Text(&'static str),
    /// The dialect cannot express this query.
    Unsupported,
}

/// Twenty statements in catalogue order.
pub type StatementTable = [Statement; 20];

/// Look up the statement for `id`.
pub fn lookup(table: &StatementTable, id: QueryId) -> Statement {
    table[id.index()]
}

/// Count distinct positional markers produced by `marker` for `1..=2`.
#[cfg(test)]
pub(crate) fn placeholder_arity(text: &str, marker: impl Fn(usize) -> String) -> usize {
    (1..=2).filter(|n| text.contains(&marker(*n))).count()
}

/// Assert every supported entry in `table` binds exactly the parameters its
/// query needs.
#[cfg(test)]
pub(crate) fn assert_arity(table: &StatementTable, marker: impl Fn(usize) -> String) {
    for id in QueryId::all() {
        if let Statement::Text(text) = lookup(table, id) {
            assert_eq!(
                placeholder_arity(text, &marker),
                id.time_params().arity(),
                "query {} binds the wrong parameters: {}",
                id,
                text
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_arity() {
        let pg = |n: usize| format!("${}", n);
        assert_eq!(placeholder_arity("SELECT 1", pg), 0);
        assert_eq!(placeholder_arity("WHERE t < $1", pg), 1);
        assert_eq!(placeholder_arity("BETWEEN $1 AND $2", pg), 2);
    }

    #[test]
    fn test_lookup_by_id() {
        let mut table = [Statement::Unsupported; 20];
        table[0] = Statement::Text("first");
        assert_eq!(lookup(&table, QueryId::TIME_BOUNDS), Statement::Text("first"));
        assert_eq!(
            lookup(&table, QueryId::new(20).unwrap()),
            Statement::Unsupported
        );
    }
}
