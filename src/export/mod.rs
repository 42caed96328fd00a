//! Depth-bounded, cycle-safe rendering of rows and their link neighborhood as JSON.
//!
//! Two traversal regimes exist. [`LinkDepth::Unlimited`] expands every reachable row at
//! most once across the whole call, roots included; a second path to the same row prints
//! only its identifier. [`LinkDepth::Limited`] expands every path up to the given number
//! of hops and may print the same row several times.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{LinkError, Result};
use crate::storage::Group;
use crate::types::{ObjRef, TableKey};

mod json;

use json::Renderer;

/// How far links are followed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkDepth {
    /// Follow links until every reachable row has been expanded once.
    Unlimited,
    /// Follow every path for at most this many hops.
    Limited(u32),
}

impl LinkDepth {
    /// Maps the conventional integer encoding: `-1` is unlimited, `n >= 0` is `n` hops.
    pub fn from_raw(depth: i64) -> Result<Self> {
        match depth {
            -1 => Ok(LinkDepth::Unlimited),
            d if d >= 0 => u32::try_from(d)
                .map(LinkDepth::Limited)
                .map_err(|_| LinkError::InvalidArgument(format!("link depth {d} is too large"))),
            d => Err(LinkError::InvalidArgument(format!(
                "link depth must be -1 or non-negative, got {d}"
            ))),
        }
    }
}

impl Default for LinkDepth {
    fn default() -> Self {
        LinkDepth::Limited(0)
    }
}

/// Output dialect.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Plain JSON; every row carries its `_key`.
    #[default]
    Json,
    /// Extended JSON with `$numberLong`/`$numberDouble` type tags; unexpanded links print
    /// the target's primary key.
    #[serde(rename = "xjson")]
    XJson,
    /// Extended JSON where unexpanded links print as `{"$link": {"table", "key"}}`.
    #[serde(rename = "xjson_plus")]
    XJsonPlus,
}

/// Rendering of references to primary keys that have no row yet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedMode {
    /// `{"$unresolved": <primary key>}`.
    #[default]
    Placeholder,
    /// `null`.
    Null,
}

/// Options for [`render`].
#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    /// Link traversal depth.
    pub depth: LinkDepth,
    /// Output dialect.
    pub mode: OutputMode,
    /// Rendering of unresolved references.
    pub unresolved: UnresolvedMode,
    /// Column and table names to print under a different name.
    pub renames: BTreeMap<String, String>,
    /// Maximum number of root rows rendered.
    pub row_limit: Option<usize>,
    /// Maximum number of nested expansions; further links print as identifiers.
    pub expansion_limit: Option<usize>,
    /// Pretty-print the output.
    pub pretty: bool,
}

impl RenderOptions {
    /// Creates options with default settings (depth 0, plain JSON).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the traversal depth.
    pub fn depth(mut self, depth: LinkDepth) -> Self {
        self.depth = depth;
        self
    }

    /// Sets the output dialect.
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets how unresolved references are printed.
    pub fn unresolved(mut self, unresolved: UnresolvedMode) -> Self {
        self.unresolved = unresolved;
        self
    }

    /// Prints column or table `from` as `to`.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    /// Caps the number of root rows.
    pub fn row_limit(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }

    /// Caps the number of nested expansions.
    pub fn expansion_limit(mut self, limit: usize) -> Self {
        self.expansion_limit = Some(limit);
        self
    }

    /// Enables pretty printing.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// Counters collected while rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    /// Root rows rendered.
    pub roots: usize,
    /// Nested rows expanded through links.
    pub expansions: usize,
    /// How many times each row was expanded, roots included. Serialized with
    /// `table:row` keys.
    #[serde(serialize_with = "serialize_visits")]
    pub visits: BTreeMap<ObjRef, usize>,
    /// Whether a row or expansion limit cut the output short.
    pub truncated: bool,
}

fn serialize_visits<S: Serializer>(
    visits: &BTreeMap<ObjRef, usize>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(visits.iter().map(|(obj, count)| (obj.to_string(), count)))
}

/// Rendered text plus traversal statistics.
#[derive(Clone, Debug)]
pub struct Rendered {
    /// JSON text.
    pub text: String,
    /// Traversal statistics.
    pub stats: RenderStats,
}

/// Renders `roots` as a JSON array, following links according to `opts`.
pub fn render(group: &Group, roots: &[ObjRef], opts: &RenderOptions) -> Result<String> {
    Ok(render_with_stats(group, roots, opts)?.text)
}

/// Renders every row of `table` in physical order.
pub fn render_table(group: &Group, table: TableKey, opts: &RenderOptions) -> Result<String> {
    let roots: Vec<ObjRef> = group
        .table(table)?
        .row_keys()
        .iter()
        .map(|&row| ObjRef::new(table, row))
        .collect();
    render(group, &roots, opts)
}

/// Like [`render`], also returning traversal statistics.
pub fn render_with_stats(group: &Group, roots: &[ObjRef], opts: &RenderOptions) -> Result<Rendered> {
    let mut renderer = Renderer::new(group, opts);
    let value = renderer.render_roots(roots)?;
    let text = if opts.pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|e| LinkError::Serialization(e.to_string()))?;
    Ok(Rendered {
        text,
        stats: renderer.into_stats(),
    })
}
