//! Dalvik typing informations data structures.

use crate::errors::{DexError, DexResult};
use crate::{Dex, DexIndex, Index, PrettyPrint};
use nom::branch::alt;
use nom::bytes::complete::is_not;
use nom::character::complete::{char, one_of};
use nom::combinator::{all_consuming, recognize};
use nom::multi::{many0, many0_count};
use nom::sequence::{delimited, pair, tuple};
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The Dalvik type descriptor to be used for referencing it from other Dex data items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeIdItem {
    pub(crate) descriptor: String,
}

impl DexIndex for Index<TypeIdItem> {
    type T = TypeIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.type_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("TypeIdItem".to_string()))
    }
}

impl TypeIdItem {
    /// Returns the raw descriptor string, such as `Ljava/lang/Object;` or `[I`.
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

impl PrettyPrint for TypeIdItem {
    fn pp(&self, f: &mut fmt::Formatter, _dex: &Dex) -> DexResult<()> {
        write!(f, "{}", self.descriptor)?;
        Ok(())
    }
}

/// The Dalvik prototype descriptor to be used for referencing it from other Dex data items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtoIdItem {
    pub(crate) return_type: Index<TypeIdItem>,
    #[serde(default)]
    pub(crate) parameters: Vec<Index<TypeIdItem>>,
}

impl DexIndex for Index<ProtoIdItem> {
    type T = ProtoIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.proto_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("ProtoIdItem".to_string()))
    }
}

impl ProtoIdItem {
    /// Returns the descriptor of the return type of the prototype.
    pub fn return_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.return_type.get(dex)?.descriptor())
    }

    /// Returns the parameters descriptors of the prototype.
    pub fn parameter_descriptors<'a>(&self, dex: &'a Dex) -> DexResult<Vec<&'a str>> {
        self.parameters
            .iter()
            .map(|idx| Ok(idx.get(dex)?.descriptor()))
            .collect()
    }

    /// Number of registers needed to hold the parameters (without `this`).
    pub fn parameter_registers(&self, dex: &Dex) -> DexResult<usize> {
        Ok(self
            .parameter_descriptors(dex)?
            .into_iter()
            .map(register_count)
            .sum())
    }

    /// Returns the prototype in the `(params)ret` form.
    pub fn descriptor(&self, dex: &Dex) -> DexResult<String> {
        let mut s = String::from("(");
        for param in self.parameter_descriptors(dex)? {
            s.push_str(param);
        }
        s.push(')');
        s.push_str(self.return_descriptor(dex)?);
        Ok(s)
    }
}

impl PrettyPrint for ProtoIdItem {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()> {
        write!(f, "{}", self.descriptor(dex)?)?;
        Ok(())
    }
}

fn class_descriptor(input: &str) -> IResult<&str, &str> {
    recognize(tuple((char('L'), is_not(";"), char(';'))))(input)
}

fn field_descriptor(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        many0_count(char('[')),
        alt((class_descriptor, recognize(one_of("ZBSCIJFD")))),
    ))(input)
}

fn return_descriptor(input: &str) -> IResult<&str, &str> {
    alt((recognize(char('V')), field_descriptor))(input)
}

fn method_descriptor(input: &str) -> IResult<&str, (Vec<&str>, &str)> {
    pair(
        delimited(char('('), many0(field_descriptor), char(')')),
        return_descriptor,
    )(input)
}

fn conversion_error(from: &str, to: &str) -> DexError {
    DexError::Conversion {
        from: format!("&str ({from:?})"),
        to: to.to_string(),
    }
}

/// Splits a concatenation of parameter descriptors (`IJLjava/lang/String;[B`) into
/// individual descriptors.
pub fn parse_parameters(params: &str) -> DexResult<Vec<&str>> {
    all_consuming(many0(field_descriptor))(params)
        .map(|(_, descriptors)| descriptors)
        .map_err(|_| conversion_error(params, "parameter list"))
}

/// Parses a `(params)ret` method descriptor into parameter and return descriptors.
pub fn parse_method_descriptor(descriptor: &str) -> DexResult<(Vec<&str>, &str)> {
    all_consuming(method_descriptor)(descriptor)
        .map(|(_, parsed)| parsed)
        .map_err(|_| conversion_error(descriptor, "method descriptor"))
}

/// Number of registers taken by a value of the given descriptor.
#[must_use]
pub fn register_count(descriptor: &str) -> usize {
    match descriptor.as_bytes().first() {
        Some(b'J' | b'D') => 2,
        _ => 1,
    }
}
