//! Pairwise path cache persistence
//!
//! Text format, three header lines followed by one line per canonical pair:
//!
//! ```text
//! <minInteractomeConfidence>
//! <maxPathLength>
//! <maxPathCost>
//! srcId,weight,midId,weight,...,dstId
//! nopath,srcId,dstId
//! ```
//!
//! A file whose header disagrees with the current parameters is stale and ignored
//! as a whole.

use crate::bio::{ProteinId, ProteinRegistry};
use netclade_algorithms::{Edge, Graph, Path};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path as FsPath;
use thiserror::Error;
use tracing::{debug, info, warn};

const NO_PATH: &str = "nopath";

#[derive(Error, Debug)]
pub enum PathCacheError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unparseable header or path line
    #[error("Malformed path cache line {line}: {content}")]
    Malformed { line: usize, content: String },
}

pub type PathCacheResult<T> = Result<T, PathCacheError>;

/// Parameters a cache file was computed with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathCacheHeader {
    pub min_confidence: f64,
    pub max_path_length: usize,
    pub max_path_cost: f64,
}

/// Outcome of loading a cache file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLoad {
    /// Number of pairs seeded into the interactome
    Loaded(usize),
    /// Header mismatch; nothing was seeded
    Stale,
    /// No file at the given location
    Missing,
}

/// Write every memoized path of `interactome`
pub fn save_paths(
    path: impl AsRef<FsPath>,
    header: &PathCacheHeader,
    interactome: &Graph<ProteinId>,
) -> PathCacheResult<usize> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    let saved = write_paths(&mut out, header, interactome)?;
    info!("Saved {} paths to {:?}", saved, path);
    Ok(saved)
}

pub fn write_paths<W: Write>(
    out: &mut W,
    header: &PathCacheHeader,
    interactome: &Graph<ProteinId>,
) -> PathCacheResult<usize> {
    writeln!(out, "{:?}", header.min_confidence)?;
    writeln!(out, "{}", header.max_path_length)?;
    writeln!(out, "{:?}", header.max_path_cost)?;

    let mut saved = 0;
    for (lower, upper, path) in interactome.cached_paths() {
        match path.source() {
            None => write!(out, "{},{},{}", NO_PATH, lower, upper)?,
            Some(source) => {
                write!(out, "{}", source)?;
                for edge in path.edges() {
                    write!(out, ",{},{}", edge.weight, edge.target)?;
                }
            }
        }
        writeln!(out)?;
        saved += 1;
    }
    out.flush()?;
    Ok(saved)
}

/// Seed `interactome`'s path cache from a file, unless it is missing or stale
pub fn load_paths(
    path: impl AsRef<FsPath>,
    header: &PathCacheHeader,
    interactome: &Graph<ProteinId>,
    registry: &ProteinRegistry,
) -> PathCacheResult<CacheLoad> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("No path cache at {:?}", path);
        return Ok(CacheLoad::Missing);
    }
    let outcome = read_paths(BufReader::new(File::open(path)?), header, interactome, registry)?;
    match outcome {
        CacheLoad::Loaded(n) => info!("Loaded {} paths from {:?}", n, path),
        CacheLoad::Stale => warn!("Path cache {:?} is outdated; recomputing every path", path),
        CacheLoad::Missing => {}
    }
    Ok(outcome)
}

pub fn read_paths<R: BufRead>(
    reader: R,
    header: &PathCacheHeader,
    interactome: &Graph<ProteinId>,
    registry: &ProteinRegistry,
) -> PathCacheResult<CacheLoad> {
    let mut lines = reader.lines().enumerate();
    let stored = PathCacheHeader {
        min_confidence: parse_field(header_line(&mut lines)?.trim(), 1)?,
        max_path_length: parse_field(header_line(&mut lines)?.trim(), 2)?,
        max_path_cost: parse_field(header_line(&mut lines)?.trim(), 3)?,
    };
    if &stored != header {
        debug!("Cached parameters {:?} differ from {:?}", stored, header);
        return Ok(CacheLoad::Stale);
    }

    let mut loaded = 0;
    for (number, line) in lines {
        let line = line?;
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            continue;
        }

        if parts.len() == 3 && parts[0].eq_ignore_ascii_case(NO_PATH) {
            let src = registry.resolve(parts[1]);
            let dst = registry.resolve(parts[2]);
            interactome.seed_path(&src, &dst, Path::empty());
        } else {
            let edges = parse_edges(&parts, registry).ok_or_else(|| PathCacheError::Malformed {
                line: number + 1,
                content: line.clone(),
            })?;
            let cost = interactome.path_cost(&edges);
            let src = edges[0].source.clone();
            let dst = edges[edges.len() - 1].target.clone();
            interactome.seed_path(&src, &dst, Path::new(edges, cost));
        }
        loaded += 1;
    }
    Ok(CacheLoad::Loaded(loaded))
}

/// `src,w,mid,...,w,dst` into contiguous edges; None when the weights do not parse
/// or the line has a dangling weight
fn parse_edges(parts: &[&str], registry: &ProteinRegistry) -> Option<Vec<Edge<ProteinId>>> {
    if parts.len() % 2 == 0 {
        return None;
    }
    let mut previous = registry.resolve(parts[0]);
    let mut edges = Vec::with_capacity(parts.len() / 2);
    for pair in parts[1..].chunks(2) {
        let weight = pair[0].parse().ok()?;
        let target = registry.resolve(pair[1]);
        if target == previous {
            return None;
        }
        edges.push(Edge::new(previous, target.clone(), weight));
        previous = target;
    }
    Some(edges)
}

fn header_line<I>(lines: &mut I) -> PathCacheResult<String>
where
    I: Iterator<Item = (usize, io::Result<String>)>,
{
    match lines.next() {
        Some((_, line)) => Ok(line?),
        None => Err(PathCacheError::Malformed {
            line: 0,
            content: "truncated header".to_string(),
        }),
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, line: usize) -> PathCacheResult<T> {
    value.parse().map_err(|_| PathCacheError::Malformed {
        line,
        content: value.to_string(),
    })
}
