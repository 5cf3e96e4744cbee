//! Text encoding of nodes and index metadata.
//!
//! A node is one `;`-separated record:
//!
//! ```text
//! id;leaf;keys;parent;children;prev;next;refs
//! 7;1;10,20;4;null;2;9;0,3
//! 4;0;10;null;2,7;null;null;
//! ```
//!
//! - `leaf` is `1` or `0`
//! - lists are `,`-separated; an empty list is an empty field
//! - an absent page reference is `null` (`-1` is accepted when reading)
//! - a leaf stores `null` children, an internal node `null` siblings and no
//!   refs
//! - a ref is `page` or `page:offset` when the offset is non-zero
//!
//! Metadata is `nextId:N;rootId:R;height:H`. Readers ignore unknown tags
//! and tolerate a missing `height`.

use std::fmt::Write as _;
use std::str::FromStr;

use super::metadata::Metadata;
use super::node::{Node, NodeBody, Rid};
use crate::common::{Error, PageId, Result};

/// Column header stored in the schema page.
pub const SCHEMA_RECORD: &str = "id;leaf;keys;parent;children;prev;next;refs";

const NULL: &str = "null";
const NULL_LEGACY: &str = "-1";
const FIELD_COUNT: usize = 8;

/// Encode a node into its page record.
pub fn encode_node(node: &Node) -> String {
    let mut out = String::with_capacity(32 + node.len() * 12);
    let _ = write!(out, "{};{};", node.id.0, u8::from(node.is_leaf()));
    push_list(&mut out, &node.keys);
    out.push(';');
    push_id(&mut out, node.parent);
    out.push(';');

    match &node.body {
        NodeBody::Leaf { refs, prev, next } => {
            out.push_str(NULL);
            out.push(';');
            push_id(&mut out, *prev);
            out.push(';');
            push_id(&mut out, *next);
            out.push(';');
            push_list(&mut out, refs);
        }
        NodeBody::Internal { children } => {
            let ids: Vec<u32> = children.iter().map(|c| c.0).collect();
            push_list(&mut out, &ids);
            out.push_str(";null;null;");
        }
    }
    out
}

/// Decode a node record.
///
/// # Errors
/// `Error::Format` naming the node and field that failed, including a
/// mismatch between the number of keys and children or refs.
pub fn decode_node(record: &str) -> Result<Node> {
    let fields: Vec<&str> = record.split(';').collect();
    if fields.len() != FIELD_COUNT {
        return Err(Error::format(
            "node record",
            format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
        ));
    }

    let id = PageId::new(parse_num(fields[0], || "node record field `id`".to_string())?);
    let ctx = |field: &str| format!("node {id} field `{field}`");

    let is_leaf = match fields[1].trim() {
        "1" => true,
        "0" => false,
        other => {
            return Err(Error::format(
                ctx("leaf"),
                format!("expected 0 or 1, got {other:?}"),
            ))
        }
    };
    let keys: Vec<i32> = parse_list(fields[2], || ctx("keys"))?;
    let parent = parse_id(fields[3], || ctx("parent"))?;

    let body = if is_leaf {
        if !is_null(fields[4]) && !fields[4].trim().is_empty() {
            return Err(Error::format(ctx("children"), "leaf with children"));
        }
        let refs: Vec<Rid> = parse_list(fields[7], || ctx("refs"))?;
        if refs.len() != keys.len() {
            return Err(Error::format(
                ctx("refs"),
                format!("{} refs for {} keys", refs.len(), keys.len()),
            ));
        }
        NodeBody::Leaf {
            refs,
            prev: parse_id(fields[5], || ctx("prev"))?,
            next: parse_id(fields[6], || ctx("next"))?,
        }
    } else {
        let children: Vec<u32> = if is_null(fields[4]) {
            Vec::new()
        } else {
            parse_list(fields[4], || ctx("children"))?
        };
        if children.len() != keys.len() + 1 {
            return Err(Error::format(
                ctx("children"),
                format!("{} children for {} keys", children.len(), keys.len()),
            ));
        }
        NodeBody::Internal {
            children: children.into_iter().map(PageId::new).collect(),
        }
    };

    Ok(Node {
        id,
        parent,
        keys,
        body,
    })
}

/// Metadata as read back from page 0.
///
/// `height` is `None` for files written without it; the tree recomputes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataRecord {
    pub next_id: PageId,
    pub root_id: PageId,
    pub height: Option<u32>,
}

pub fn encode_metadata(meta: &Metadata) -> String {
    format!(
        "nextId:{};rootId:{};height:{}",
        meta.next_id.0, meta.root_id.0, meta.height
    )
}

/// Decode the metadata record. An empty record means a fresh file.
pub fn decode_metadata(record: &str) -> Result<Option<MetadataRecord>> {
    let record = record.trim();
    if record.is_empty() {
        return Ok(None);
    }

    let mut next_id = None;
    let mut root_id = None;
    let mut height = None;
    for entry in record.split(';').filter(|e| !e.trim().is_empty()) {
        let (tag, value) = entry
            .split_once(':')
            .ok_or_else(|| Error::format("metadata", format!("entry {entry:?} has no tag")))?;
        let ctx = || format!("metadata tag `{}`", tag.trim());
        match tag.trim() {
            "nextId" => next_id = Some(PageId::new(parse_num(value, ctx)?)),
            "rootId" => root_id = Some(PageId::new(parse_num(value, ctx)?)),
            "height" => height = Some(parse_num(value, ctx)?),
            _ => {}
        }
    }

    match (next_id, root_id) {
        (Some(next_id), Some(root_id)) => Ok(Some(MetadataRecord {
            next_id,
            root_id,
            height,
        })),
        (None, _) => Err(Error::format("metadata", "missing `nextId`")),
        (_, None) => Err(Error::format("metadata", "missing `rootId`")),
    }
}

impl FromStr for Rid {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| format!("{part:?}: {e}"))
        };
        match s.split_once(':') {
            Some((page, offset)) => Ok(Rid::with_offset(parse(page)?, parse(offset)?)),
            None => Ok(Rid::new(parse(s)?)),
        }
    }
}

fn is_null(field: &str) -> bool {
    let field = field.trim();
    field == NULL || field == NULL_LEGACY
}

fn push_id(out: &mut String, id: Option<PageId>) {
    match id {
        Some(id) => {
            let _ = write!(out, "{}", id.0);
        }
        None => out.push_str(NULL),
    }
}

fn push_list<T: std::fmt::Display>(out: &mut String, items: &[T]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{item}");
    }
}

fn parse_num<T>(field: &str, ctx: impl FnOnce() -> String) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    field
        .trim()
        .parse()
        .map_err(|e: T::Err| Error::format(ctx(), format!("{field:?}: {e}")))
}

fn parse_id(field: &str, ctx: impl FnOnce() -> String) -> Result<Option<PageId>> {
    if is_null(field) {
        return Ok(None);
    }
    parse_num(field, ctx).map(|id| Some(PageId::new(id)))
}

fn parse_list<T>(field: &str, ctx: impl Fn() -> String) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let field = field.trim();
    if field.is_empty() {
        return Ok(Vec::new());
    }
    field.split(',').map(|item| parse_num(item, &ctx)).collect()
}
