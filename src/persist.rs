//! Persistence: a node tree serializes to a JSON schema (a fill tree of
//! constructor invocations, blob reads, and back-references) plus a set of
//! named binary blobs written through a key→bytes sink. Deserialization
//! walks the fill tree, resolving `gen` paths against an explicit
//! whitelist rather than calling anything named in the document.

use crate::buffer::Buffer;
use crate::dtype::DType;
use crate::error::{CoreError, Result};
use crate::node::{
    BoolmaskedNode, IndexedMaskNode, JaggedNode, LeafNode, MaskedWhen, Node, NodeRef, TableNode,
    UnionNode,
};
use serde_json::{json, Value as Json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Anything that can store a named blob.
pub trait Sink {
    fn put(&mut self, key: &str, bytes: Vec<u8>);
}

/// Anything that can retrieve a named blob.
pub trait Source {
    fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// A plain in-memory key→bytes store, the reference `Sink`/`Source`
/// implementation used by tests and small embeddings.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl Sink for MemoryStore {
    fn put(&mut self, key: &str, bytes: Vec<u8>) {
        self.entries.insert(key.to_string(), bytes);
    }
}

impl Source for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.entries.get(key).cloned().ok_or_else(|| CoreError::Store {
            key: key.to_string(),
            reason: "no blob stored under this key".to_string(),
        })
    }
}

/// A compression rule: applies to buffers at or above `min_size`, whose
/// dtype and context string both match.
#[derive(Debug, Clone)]
pub struct CompressionRule {
    pub min_size: usize,
    pub allowed_dtypes: Vec<DType>,
    pub allowed_contexts: Vec<&'static str>,
}

impl CompressionRule {
    fn matches(&self, len: usize, dtype: DType, context: &str) -> bool {
        len >= self.min_size
            && self.allowed_dtypes.contains(&dtype)
            && self.allowed_contexts.contains(&context)
    }
}

/// Explicit, constructible persistence configuration: no hidden globals,
/// no environment/file-based configuration surface.
#[derive(Debug, Clone)]
pub struct PersistConfig {
    pub whitelist: HashSet<String>,
    pub compression_rules: Vec<CompressionRule>,
}

const FROMBUFFER: &str = "columnar_core.persist.frombuffer";
const ZSTD_DECOMPRESS: &str = "columnar_core.persist.zstd_decompress";
const NODE_LEAF: &str = "columnar_core.node.leaf";
const NODE_JAGGED: &str = "columnar_core.node.jagged";
const NODE_TABLE: &str = "columnar_core.node.table";
const NODE_INDEXED_MASK: &str = "columnar_core.node.indexed_mask";
const NODE_BOOLMASKED: &str = "columnar_core.node.boolmasked";
const NODE_UNION: &str = "columnar_core.node.union";

impl PersistConfig {
    /// The default whitelist: the primitive library's `frombuffer`, the
    /// standard decompressor's `decompress`, and the core's own node
    /// constructors.
    pub fn default() -> PersistConfig {
        let whitelist = [
            FROMBUFFER,
            ZSTD_DECOMPRESS,
            NODE_LEAF,
            NODE_JAGGED,
            NODE_TABLE,
            NODE_INDEXED_MASK,
            NODE_BOOLMASKED,
            NODE_UNION,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        PersistConfig {
            whitelist,
            compression_rules: vec![CompressionRule {
                min_size: 256,
                allowed_dtypes: vec![DType::Float64, DType::Int64],
                allowed_contexts: vec!["Leaf.buffer"],
            }],
        }
    }

    /// Used by the "reload under an empty whitelist fails" scenario.
    pub fn empty_whitelist() -> PersistConfig {
        PersistConfig {
            whitelist: HashSet::new(),
            compression_rules: vec![],
        }
    }
}

struct BuildCtx<'a> {
    sink: &'a mut dyn Sink,
    prefix: String,
    config: &'a PersistConfig,
    next_id: u64,
    seen: HashMap<usize, u64>,
}

pub fn serialize(node: &NodeRef, sink: &mut dyn Sink, prefix: &str, config: &PersistConfig) -> Result<()> {
    let mut ctx = BuildCtx {
        sink,
        prefix: prefix.to_string(),
        config,
        next_id: 0,
        seen: HashMap::new(),
    };
    let root = build(node, &mut ctx)?;
    let schema = json!({
        "version": "1",
        "prefix": prefix,
        "root": root,
    });
    let bytes = serde_json::to_vec(&schema).map_err(|e| CoreError::MalformedSchema {
        reason: e.to_string(),
    })?;
    ctx.sink.put(prefix, bytes);
    Ok(())
}

fn build(node: &NodeRef, ctx: &mut BuildCtx) -> Result<Json> {
    let ptr = Arc::as_ptr(node) as usize;
    if let Some(&id) = ctx.seen.get(&ptr) {
        return Ok(json!({ "ref": id }));
    }
    let id = ctx.next_id;
    ctx.next_id += 1;
    ctx.seen.insert(ptr, id);

    let (gen, args) = match node.as_ref() {
        Node::Leaf(l) => build_leaf(l, ctx)?,
        Node::Jagged(j) => {
            let compact = j.compact()?;
            let offsets = compact.offsets()?;
            let content = build(&compact.content, ctx)?;
            (
                NODE_JAGGED.to_string(),
                vec![json!(offsets), content],
            )
        }
        Node::Table(t) => {
            let names: Vec<Json> = t.fields.iter().map(|(n, _)| json!(n)).collect();
            let mut args = vec![json!(names)];
            for (_, child) in &t.fields {
                args.push(build(child, ctx)?);
            }
            (NODE_TABLE.to_string(), args)
        }
        Node::IndexedMask(m) => {
            let content = build(&m.content, ctx)?;
            (NODE_INDEXED_MASK.to_string(), vec![json!(m.mask), content])
        }
        Node::Boolmasked(m) => {
            let content = build(&m.content, ctx)?;
            let masked_when = matches!(m.masked_when, MaskedWhen::True);
            (NODE_BOOLMASKED.to_string(), vec![json!(m.mask), json!(masked_when), content])
        }
        Node::Union(u) => {
            let mut args = vec![json!(u.tags), json!(u.index)];
            for c in &u.contents {
                args.push(build(c, ctx)?);
            }
            (NODE_UNION.to_string(), args)
        }
        other => {
            return Err(CoreError::UnsupportedConversion {
                reason: format!("persistence does not yet cover {}", other.node_type()),
            })
        }
    };

    Ok(json!({ "id": id, "gen": gen.split('.').collect::<Vec<_>>(), "args": args }))
}

fn build_leaf(l: &LeafNode, ctx: &mut BuildCtx) -> Result<(String, Vec<Json>)> {
    let context = "Leaf.buffer";
    let bytes = buffer_to_bytes(&l.buffer);
    let rule = ctx
        .config
        .compression_rules
        .iter()
        .find(|r| r.matches(bytes.len(), l.buffer.dtype(), context));

    let key = ctx.next_id.to_string();
    ctx.next_id += 1;
    let (stored, read_node) = if let Some(_rule) = rule {
        log::debug!("compressing leaf buffer for context {}", context);
        let compressed = zstd::stream::encode_all(bytes.as_slice(), 0).map_err(|e| CoreError::Store {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        let read = json!({ "read": key, "absolute": false });
        let decompress_id = ctx.next_id;
        ctx.next_id += 1;
        (
            compressed,
            json!({ "id": decompress_id, "gen": ZSTD_DECOMPRESS.split('.').collect::<Vec<_>>(), "args": [read] }),
        )
    } else {
        log::debug!("storing leaf buffer uncompressed for context {}", context);
        (bytes, json!({ "read": key, "absolute": false }))
    };
    ctx.sink.put(&format!("{}{}", ctx.prefix, key), stored);

    Ok((
        FROMBUFFER.to_string(),
        vec![read_node, json!(l.buffer.dtype().to_string()), json!(l.buffer.len())],
    ))
}

pub fn deserialize(source: &dyn Source, prefix: &str, config: &PersistConfig) -> Result<NodeRef> {
    let schema_bytes = source.get(prefix)?;
    let schema: Json = serde_json::from_slice(&schema_bytes).map_err(|e| CoreError::MalformedSchema {
        reason: e.to_string(),
    })?;
    let root = schema.get("root").ok_or_else(|| CoreError::MalformedSchema {
        reason: "schema missing 'root'".to_string(),
    })?;
    let mut by_id: HashMap<u64, NodeRef> = HashMap::new();
    walk(root, source, prefix, config, &mut by_id)
}

fn walk(
    fill: &Json,
    source: &dyn Source,
    prefix: &str,
    config: &PersistConfig,
    by_id: &mut HashMap<u64, NodeRef>,
) -> Result<NodeRef> {
    if let Some(r) = fill.get("ref") {
        let id = r.as_u64().ok_or_else(|| CoreError::MalformedSchema {
            reason: "'ref' must be an integer".to_string(),
        })?;
        return by_id.get(&id).cloned().ok_or_else(|| CoreError::MalformedSchema {
            reason: format!("dangling back-reference to id {}", id),
        });
    }
    if fill.get("read").is_some() {
        return Err(CoreError::MalformedSchema {
            reason: "a bare 'read' node cannot stand for a node; it must appear inside a constructor's args".to_string(),
        });
    }

    let id = fill.get("id").and_then(Json::as_u64).ok_or_else(|| CoreError::MalformedSchema {
        reason: "fill-tree node missing 'id'".to_string(),
    })?;
    let gen_parts: Vec<String> = fill
        .get("gen")
        .and_then(Json::as_array)
        .ok_or_else(|| CoreError::MalformedSchema {
            reason: "fill-tree node missing 'gen'".to_string(),
        })?
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();
    let gen_path = gen_parts.join(".");
    if !config.whitelist.contains(&gen_path) {
        log::warn!("rejecting deserialization of non-whitelisted constructor {}", gen_path);
        return Err(CoreError::ForbiddenConstructor { path: gen_path });
    }
    let args = fill
        .get("args")
        .and_then(Json::as_array)
        .ok_or_else(|| CoreError::MalformedSchema {
            reason: "fill-tree node missing 'args'".to_string(),
        })?;

    let node = invoke(&gen_path, args, source, prefix, config, by_id)?;
    by_id.insert(id, node.clone());
    Ok(node)
}

fn read_blob(arg: &Json, source: &dyn Source, prefix: &str, config: &PersistConfig, by_id: &mut HashMap<u64, NodeRef>) -> Result<Vec<u8>> {
    if let Some(read_key) = arg.get("read") {
        let key = read_key.as_str().ok_or_else(|| CoreError::MalformedSchema {
            reason: "'read' must be a string key".to_string(),
        })?;
        let absolute = arg.get("absolute").and_then(Json::as_bool).unwrap_or(false);
        let full_key = if absolute { key.to_string() } else { format!("{}{}", prefix, key) };
        source.get(&full_key)
    } else if arg.get("gen").is_some() {
        // A nested decompress (or other byte-producing) constructor.
        let gen_path: String = arg
            .get("gen")
            .and_then(Json::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .map(|v| v.as_str().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(".")
            })
            .unwrap_or_default();
        if !config.whitelist.contains(&gen_path) {
            log::warn!("rejecting deserialization of non-whitelisted constructor {}", gen_path);
            return Err(CoreError::ForbiddenConstructor { path: gen_path });
        }
        let inner_args = arg.get("args").and_then(Json::as_array).ok_or_else(|| CoreError::MalformedSchema {
            reason: "decompress node missing 'args'".to_string(),
        })?;
        let raw = read_blob(arg_at(inner_args, 0)?, source, prefix, config, by_id)?;
        if gen_path == ZSTD_DECOMPRESS {
            zstd::stream::decode_all(raw.as_slice()).map_err(|e| CoreError::Store {
                key: gen_path,
                reason: e.to_string(),
            })
        } else {
            Err(CoreError::ForbiddenConstructor { path: gen_path })
        }
    } else {
        Err(CoreError::MalformedSchema {
            reason: "expected a 'read' or 'gen' node producing bytes".to_string(),
        })
    }
}

fn invoke(
    gen_path: &str,
    args: &[Json],
    source: &dyn Source,
    prefix: &str,
    config: &PersistConfig,
    by_id: &mut HashMap<u64, NodeRef>,
) -> Result<NodeRef> {
    match gen_path {
        FROMBUFFER => {
            let bytes = read_blob(arg_at(args, 0)?, source, prefix, config, by_id)?;
            let dtype_name = arg_at(args, 1)?.as_str().ok_or_else(|| CoreError::MalformedSchema {
                reason: "frombuffer dtype argument must be a string".to_string(),
            })?;
            let length = arg_at(args, 2)?.as_u64().ok_or_else(|| CoreError::MalformedSchema {
                reason: "frombuffer length argument must be an integer".to_string(),
            })? as usize;
            let buffer = bytes_to_buffer(&bytes, dtype_name, length)?;
            Ok(Node::leaf(buffer))
        }
        NODE_JAGGED => {
            let offsets: Vec<i64> = serde_json::from_value(arg_at(args, 0)?.clone()).map_err(schema_err)?;
            let content = walk(arg_at(args, 1)?, source, prefix, config, by_id)?;
            Ok(Arc::new(Node::Jagged(JaggedNode::from_offsets(offsets, content)?)))
        }
        NODE_TABLE => {
            let names: Vec<String> = serde_json::from_value(arg_at(args, 0)?.clone()).map_err(schema_err)?;
            let rest = args.get(1..).unwrap_or_default();
            if rest.len() != names.len() {
                return Err(CoreError::MalformedSchema {
                    reason: "table field-name count does not match column-argument count".to_string(),
                });
            }
            let mut fields = Vec::with_capacity(names.len());
            for (name, arg) in names.into_iter().zip(rest.iter()) {
                fields.push((name, walk(arg, source, prefix, config, by_id)?));
            }
            Ok(Arc::new(Node::Table(TableNode::new(fields)?)))
        }
        NODE_INDEXED_MASK => {
            let mask: Vec<i64> = serde_json::from_value(arg_at(args, 0)?.clone()).map_err(schema_err)?;
            let content = walk(arg_at(args, 1)?, source, prefix, config, by_id)?;
            Ok(Arc::new(Node::IndexedMask(IndexedMaskNode::new(mask, content))))
        }
        NODE_BOOLMASKED => {
            let mask: Vec<bool> = serde_json::from_value(arg_at(args, 0)?.clone()).map_err(schema_err)?;
            let masked_when = if arg_at(args, 1)?.as_bool().unwrap_or(true) {
                MaskedWhen::True
            } else {
                MaskedWhen::False
            };
            let content = walk(arg_at(args, 2)?, source, prefix, config, by_id)?;
            Ok(Arc::new(Node::Boolmasked(BoolmaskedNode::new(mask, content, masked_when)?)))
        }
        NODE_UNION => {
            let tags: Vec<u8> = serde_json::from_value(arg_at(args, 0)?.clone()).map_err(schema_err)?;
            let index: Vec<i64> = serde_json::from_value(arg_at(args, 1)?.clone()).map_err(schema_err)?;
            let rest = args.get(2..).unwrap_or_default();
            let mut contents = Vec::with_capacity(rest.len());
            for arg in rest {
                contents.push(walk(arg, source, prefix, config, by_id)?);
            }
            Ok(Arc::new(Node::Union(UnionNode::new(tags, index, contents)?)))
        }
        other => Err(CoreError::ForbiddenConstructor { path: other.to_string() }),
    }
}

fn arg_at(args: &[Json], i: usize) -> Result<&Json> {
    args.get(i).ok_or_else(|| CoreError::MalformedSchema {
        reason: format!("fill-tree node expected at least {} args", i + 1),
    })
}

fn schema_err(e: serde_json::Error) -> CoreError {
    CoreError::MalformedSchema { reason: e.to_string() }
}

fn buffer_to_bytes(buffer: &Buffer) -> Vec<u8> {
    match buffer.dtype() {
        DType::Float64 => {
            let mut out = Vec::with_capacity(buffer.len() * 8);
            for i in 0..buffer.len() {
                if let crate::value::Value::Float(v) = buffer.value_at(i) {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            out
        }
        _ => {
            let mut out = Vec::with_capacity(buffer.len() * 8);
            for i in 0..buffer.len() {
                let v = buffer.value_at(i).as_f64().unwrap_or(0.0);
                out.extend_from_slice(&(v as i64).to_le_bytes());
            }
            out
        }
    }
}

fn bytes_to_buffer(bytes: &[u8], dtype_name: &str, length: usize) -> Result<Buffer> {
    if bytes.len() < length * 8 {
        return Err(CoreError::MalformedSchema {
            reason: "buffer blob shorter than declared length".to_string(),
        });
    }
    match dtype_name {
        "float64" => {
            let values: Vec<f64> = bytes[..length * 8]
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
                .collect();
            Ok(Buffer::from_f64_vec(values))
        }
        "int64" => {
            let values: Vec<i64> = bytes[..length * 8]
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                .collect();
            Ok(Buffer::from_i64_vec(values))
        }
        other => Err(CoreError::InvalidDType {
            context: "persist.bytes_to_buffer",
            found: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;

    #[test]
    fn leaf_round_trips_through_default_whitelist() {
        let node = Node::leaf(Buffer::from_f64_vec(vec![1.1, 2.2, 3.3]));
        let mut store = MemoryStore::new();
        let config = PersistConfig::default();
        serialize(&node, &mut store, "root/", &config).unwrap();
        let restored = deserialize(&store, "root/", &config).unwrap();
        assert_eq!(restored.to_list().unwrap(), node.to_list().unwrap());
    }

    #[test]
    fn jagged_of_table_round_trips() {
        let table = Arc::new(Node::Table(
            TableNode::new(vec![
                ("x".to_string(), Node::leaf(Buffer::from_i64_vec(vec![1, 2, 3]))),
                ("y".to_string(), Node::leaf(Buffer::from_f64_vec(vec![1.5, 2.5, 3.5]))),
            ])
            .unwrap(),
        ));
        let jagged = Arc::new(Node::Jagged(JaggedNode::from_offsets(vec![0, 2, 3], table).unwrap()));
        let mut store = MemoryStore::new();
        let config = PersistConfig::default();
        serialize(&jagged, &mut store, "root/", &config).unwrap();
        let restored = deserialize(&store, "root/", &config).unwrap();
        assert_eq!(restored.to_list().unwrap(), jagged.to_list().unwrap());
    }

    #[test]
    fn reload_under_empty_whitelist_fails_with_forbidden_constructor() {
        let node = Node::leaf(Buffer::from_f64_vec(vec![1.1, 2.2]));
        let mut store = MemoryStore::new();
        serialize(&node, &mut store, "root/", &PersistConfig::default()).unwrap();
        let err = deserialize(&store, "root/", &PersistConfig::empty_whitelist()).unwrap_err();
        assert!(matches!(err, CoreError::ForbiddenConstructor { .. }));
    }
}
