use regex::{Regex, RegexBuilder};

use crate::errors::GeoFilterResult;
use crate::filter::{LikeToken, LikeWildcards};

/// Compiles a `Like` pattern into an anchored regular expression.
pub(crate) fn like_regex(
    pattern: &str,
    wildcards: &LikeWildcards,
    match_case: bool,
) -> GeoFilterResult<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut buf = [0u8; 4];
    for token in wildcards.tokenize(pattern) {
        match token {
            LikeToken::AnyRun => source.push_str(".*"),
            LikeToken::OneChar => source.push('.'),
            LikeToken::Literal(c) => source.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    source.push('$');

    let regex = RegexBuilder::new(&source)
        .case_insensitive(!match_case)
        .dot_matches_new_line(true)
        .build()?;
    Ok(regex)
}
