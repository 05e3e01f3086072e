//! Parsing of reference strings used in layer files, built on `nom`.
//!
//! Two forms exist:
//! - input references: `openssl` (catalog) or `external:/opt/sdk` (pre-built);
//! - origins of derived components: `previous.<name>` or `final.<name>`.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::{all_consuming, map, rest, value, verify},
    sequence::{preceded, separated_pair},
};
use strata_common::constants::EXTERNAL_PREFIX;
use strata_common::error::{Result, StrataError};

use crate::component::InputRef;
use crate::layer::{Origin, View};

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+')
}

/// A catalog name: alphanumerics plus `-`, `_`, `.`, `+`.
fn name(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char).parse(input)
}

fn external(input: &str) -> IResult<&str, InputRef> {
    map(
        preceded(tag(EXTERNAL_PREFIX), verify(rest, |s: &str| !s.is_empty())),
        |id: &str| InputRef::External(id.to_owned()),
    )
    .parse(input)
}

fn catalog(input: &str) -> IResult<&str, InputRef> {
    map(name, |n: &str| InputRef::Catalog(n.to_owned())).parse(input)
}

fn view(input: &str) -> IResult<&str, View> {
    alt((
        value(View::Previous, tag("previous")),
        value(View::Final, tag("final")),
    ))
    .parse(input)
}

/// Returns `true` if `candidate` is a valid catalog name.
#[must_use]
pub fn is_valid_name(candidate: &str) -> bool {
    all_consuming(name).parse(candidate).is_ok()
}

/// Parses an input reference string.
///
/// # Errors
///
/// Returns [`StrataError::Parse`] if the string is neither a catalog name nor
/// an `external:` reference with a non-empty identifier.
pub fn parse_input_ref(input: &str) -> Result<InputRef> {
    all_consuming(alt((external, catalog)))
        .parse(input)
        .map(|(_, reference)| reference)
        .map_err(|e| StrataError::parse(format!("input reference \"{input}\""), e))
}

/// Parses an origin such as `final.numpy`.
///
/// # Errors
///
/// Returns [`StrataError::Parse`] if the view is not `previous`/`final` or the
/// name is missing.
pub fn parse_origin(input: &str) -> Result<Origin> {
    all_consuming(separated_pair(view, char('.'), name))
        .parse(input)
        .map(|(_, (view, name))| Origin {
            view,
            name: name.to_owned(),
        })
        .map_err(|e| StrataError::parse(format!("origin \"{input}\""), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_reference() {
        assert_eq!(
            parse_input_ref("python3.11-numpy").expect("parse"),
            InputRef::Catalog("python3.11-numpy".into())
        );
    }

    #[test]
    fn external_reference_keeps_everything_after_prefix() {
        assert_eq!(
            parse_input_ref("external:/opt/intel/mkl 2024").expect("parse"),
            InputRef::External("/opt/intel/mkl 2024".into())
        );
    }

    #[test]
    fn empty_external_is_rejected() {
        assert!(parse_input_ref("external:").is_err());
    }

    #[test]
    fn names_with_spaces_are_rejected() {
        let err = parse_input_ref("two words").unwrap_err();
        assert!(err.to_string().contains("two words"), "got: {err}");
        assert!(!is_valid_name("two words"));
        assert!(is_valid_name("libxml2"));
    }

    #[test]
    fn origins_parse_both_views() {
        let prev = parse_origin("previous.numpy").expect("parse");
        assert_eq!(prev.view, View::Previous);
        assert_eq!(prev.name, "numpy");

        let fin = parse_origin("final.python3.11").expect("parse");
        assert_eq!(fin.view, View::Final);
        assert_eq!(fin.name, "python3.11");
    }

    #[test]
    fn origin_requires_known_view() {
        assert!(parse_origin("latest.numpy").is_err());
        assert!(parse_origin("final.").is_err());
        assert!(parse_origin("numpy").is_err());
    }
}
