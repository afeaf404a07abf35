//! Decoders for `Option`, sequences, maps and enums.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use super::{Decode, DecodeContext};
use crate::node::{ConfigNode, LeafNode, LeafPayload};
use crate::validation::{IssueKind, Validated, ValidationIssue};

impl<T: Decode> Decode for Option<T> {
    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        let ConfigNode::Leaf(leaf) = node else {
            return ctx.decode::<T>(Some(node)).map(Some);
        };
        if !leaf.payload().is_decorated() {
            if matches!(leaf.payload(), LeafPayload::Plain(None)) {
                return Validated::ok(None);
            }
            return ctx.decode::<T>(Some(node)).map(Some);
        }

        // Decorated leaves are read exactly once; a spent or undecryptable
        // value counts as absent.
        ctx.mark_uncacheable();
        let Some(value) = leaf.value() else {
            return Validated::ok(None);
        };
        let revealed = ConfigNode::Leaf(LeafNode::from_payload(
            LeafPayload::Plain(Some(value)),
            leaf.metadata().clone(),
        ));
        ctx.decode::<T>(Some(&revealed)).map(Some)
    }

    fn decode_missing(_ctx: &DecodeContext<'_>) -> Validated<Self> {
        Validated::ok(None)
    }
}

/// Decodes every element; any failing element fails the whole sequence.
fn decode_elements<T: Decode>(node: &ConfigNode, ctx: &DecodeContext<'_>, type_name: &str) -> Validated<Vec<T>> {
    let mut issues = Vec::new();
    let mut items = Vec::new();
    let mut failed = false;

    match node {
        ConfigNode::Array(array) => {
            for (i, item) in array.iter().enumerate() {
                match ctx.element(i).decode::<T>(Some(item)).absorb_into(&mut issues) {
                    Some(value) => items.push(value),
                    None => failed = true,
                }
            }
        }
        ConfigNode::Leaf(_) => {
            let (leaf, raw) = match ctx.leaf_value(node, type_name) {
                Ok(read) => read,
                Err(issue) => return Validated::failed(issue),
            };
            let parts = raw.split(',').map(str::trim).filter(|p| !p.is_empty());
            for (i, part) in parts.enumerate() {
                let element = ConfigNode::Leaf(LeafNode::from_payload(
                    LeafPayload::Plain(Some(part.to_string())),
                    leaf.metadata().clone(),
                ));
                match ctx.element(i).decode::<T>(Some(&element)).absorb_into(&mut issues) {
                    Some(value) => items.push(value),
                    None => failed = true,
                }
            }
        }
        ConfigNode::Map(_) => return Validated::failed(ctx.type_mismatch(node, type_name)),
    }

    if failed {
        Validated::failed_with(issues)
    } else {
        Validated::with_issues(items, issues)
    }
}

/// Decodes every map entry; any failing entry fails the whole map.
fn decode_entries<T: Decode>(
    node: &ConfigNode,
    ctx: &DecodeContext<'_>,
    type_name: &str,
) -> Validated<Vec<(String, T)>> {
    let Some(map) = node.as_map() else {
        return Validated::failed(ctx.type_mismatch(node, type_name));
    };

    let mut issues = Vec::new();
    let mut entries = Vec::with_capacity(map.len());
    let mut failed = false;
    for (key, child) in map.iter() {
        match ctx.child(key).decode::<T>(Some(child)).absorb_into(&mut issues) {
            Some(value) => entries.push((key.clone(), value)),
            None => failed = true,
        }
    }

    if failed {
        Validated::failed_with(issues)
    } else {
        Validated::with_issues(entries, issues)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        decode_elements(node, ctx, "Vec")
    }
}

impl<T: Decode + Eq + Hash> Decode for HashSet<T> {
    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        decode_elements(node, ctx, "HashSet").map(|items| items.into_iter().collect())
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        decode_elements(node, ctx, "BTreeSet").map(|items| items.into_iter().collect())
    }
}

impl<T: Decode> Decode for HashMap<String, T> {
    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        decode_entries(node, ctx, "HashMap").map(|entries| entries.into_iter().collect())
    }
}

impl<T: Decode> Decode for BTreeMap<String, T> {
    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        decode_entries(node, ctx, "BTreeMap").map(|entries| entries.into_iter().collect())
    }
}

/// Decodes a leaf by matching its value against variant names,
/// ignoring case.
///
/// ```rust
/// use config_resolver::{decode_by_name, ConfigNode, Decode, DecodeContext, Validated};
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Mode {
///     Fast,
///     Safe,
/// }
///
/// impl Decode for Mode {
///     fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
///         decode_by_name(node, ctx, "Mode", &[("fast", Mode::Fast), ("safe", Mode::Safe)])
///     }
/// }
/// ```
pub fn decode_by_name<T: Clone>(
    node: &ConfigNode,
    ctx: &DecodeContext<'_>,
    type_name: &str,
    variants: &[(&str, T)],
) -> Validated<T> {
    let (leaf, raw) = match ctx.leaf_value(node, type_name) {
        Ok(read) => read,
        Err(issue) => return Validated::failed(issue),
    };
    let wanted = raw.trim();
    if let Some((_, value)) = variants
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
    {
        return Validated::ok(value.clone());
    }

    let names: Vec<&str> = variants.iter().map(|(name, _)| *name).collect();
    Validated::failed(ValidationIssue::error(
        IssueKind::InvalidValue,
        ctx.path(),
        format!(
            "Unable to decode '{}' at '{}' as {}: expected one of {}",
            ctx.display_value(leaf, &raw),
            ctx.path(),
            type_name,
            names.join(", ")
        ),
    ))
}
