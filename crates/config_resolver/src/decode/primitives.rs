//! Decoders for scalar types.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{Decode, DecodeContext};
use crate::node::ConfigNode;
use crate::validation::{IssueKind, Validated, ValidationIssue};

fn decode_parsed<T>(node: &ConfigNode, ctx: &DecodeContext<'_>, type_name: &str) -> Validated<T>
where
    T: FromStr,
    T::Err: Display,
{
    let (leaf, raw) = match ctx.leaf_value(node, type_name) {
        Ok(read) => read,
        Err(issue) => return Validated::failed(issue),
    };
    match raw.trim().parse::<T>() {
        Ok(value) => Validated::ok(value),
        Err(e) => Validated::failed(ctx.invalid_value(leaf, &raw, type_name, e)),
    }
}

macro_rules! decode_from_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Decode for $ty {
                fn type_name() -> &'static str {
                    stringify!($ty)
                }

                fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
                    decode_parsed::<$ty>(node, ctx, stringify!($ty))
                }
            }
        )*
    };
}

decode_from_str!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl Decode for String {
    fn type_name() -> &'static str {
        "String"
    }

    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        match ctx.leaf_value(node, Self::type_name()) {
            Ok((_, value)) => Validated::ok(value),
            Err(issue) => Validated::failed(issue),
        }
    }
}

impl Decode for bool {
    fn type_name() -> &'static str {
        "bool"
    }

    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        let (leaf, raw) = match ctx.leaf_value(node, Self::type_name()) {
            Ok(read) => read,
            Err(issue) => return Validated::failed(issue),
        };
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            Validated::ok(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            Validated::ok(false)
        } else {
            Validated::failed(ctx.invalid_value(
                leaf,
                &raw,
                Self::type_name(),
                "expected 'true' or 'false'",
            ))
        }
    }
}

impl Decode for char {
    fn type_name() -> &'static str {
        "char"
    }

    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        let (leaf, raw) = match ctx.leaf_value(node, Self::type_name()) {
            Ok(read) => read,
            Err(issue) => return Validated::failed(issue),
        };
        let mut chars = raw.chars();
        let Some(first) = chars.next() else {
            return Validated::failed(ctx.invalid_value(leaf, &raw, Self::type_name(), "value is empty"));
        };

        let mut result = Validated::ok(first);
        if chars.next().is_some() {
            result.push(ValidationIssue::warn(
                IssueKind::InvalidValue,
                ctx.path(),
                format!(
                    "Value '{}' at '{}' is longer than one character, using the first",
                    ctx.display_value(leaf, &raw),
                    ctx.path()
                ),
            ));
        }
        result
    }
}

impl Decode for PathBuf {
    fn type_name() -> &'static str {
        "PathBuf"
    }

    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        match ctx.leaf_value(node, Self::type_name()) {
            Ok((_, value)) => Validated::ok(PathBuf::from(value.trim())),
            Err(issue) => Validated::failed(issue),
        }
    }
}

/// Parses `250ms`, `10s`, `5m`, `2h` or a bare number of milliseconds.
pub(crate) fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let (number, unit_ms) = if let Some(n) = raw.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = raw.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = raw.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = raw.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (raw, 1)
    };

    let amount = number
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid duration '{}': {}", raw, e))?;
    amount
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration '{}' is too large", raw))
}

impl Decode for Duration {
    fn type_name() -> &'static str {
        "Duration"
    }

    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        let (leaf, raw) = match ctx.leaf_value(node, Self::type_name()) {
            Ok(read) => read,
            Err(issue) => return Validated::failed(issue),
        };
        match parse_duration(&raw) {
            Ok(duration) => Validated::ok(duration),
            Err(reason) => Validated::failed(ctx.invalid_value(leaf, &raw, Self::type_name(), reason)),
        }
    }
}
