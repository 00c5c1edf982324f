use crate::filter::{LikeToken, LikeWildcards};

/// Rewrites a filter `Like` pattern with SQL wildcards (`%`, `_`), escaping
/// literal `%`, `_` and `\` with a backslash.
pub(crate) fn to_sql_pattern(pattern: &str, wildcards: &LikeWildcards) -> String {
    let mut sql = String::with_capacity(pattern.len() + 4);
    for token in wildcards.tokenize(pattern) {
        match token {
            LikeToken::AnyRun => sql.push('%'),
            LikeToken::OneChar => sql.push('_'),
            LikeToken::Literal(c) => {
                if matches!(c, '%' | '_' | '\\') {
                    sql.push('\\');
                }
                sql.push(c);
            }
        }
    }
    sql
}
