//! Degree sequence loading and the directed configuration model.

use crate::error::{GenError, GenResult};
use crate::params::DegreeRow;
use crate::rng::StageRng;
use serde::{Deserialize, Serialize};

/// Parallel in/out-degree sequences, one entry per account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegreeSequences {
    pub in_degrees: Vec<usize>,
    pub out_degrees: Vec<usize>,
}

/// Expand degree rows into sequences and tile them to `num_accounts`.
///
/// The base sequence must balance (equal lengths and sums) and
/// `num_accounts` must be an exact multiple of its length.
pub fn get_in_and_out_degrees(rows: &[DegreeRow], num_accounts: usize) -> GenResult<DegreeSequences> {
    let mut in_deg = Vec::new();
    let mut out_deg = Vec::new();
    for row in rows {
        in_deg.extend(std::iter::repeat(row.in_degree).take(row.count));
        out_deg.extend(std::iter::repeat(row.out_degree).take(row.count));
    }

    let (in_len, out_len) = (in_deg.len(), out_deg.len());
    if in_len != out_len {
        return Err(GenError::DegreeLengthMismatch { in_len, out_len });
    }

    let (in_sum, out_sum) = (in_deg.iter().sum::<usize>(), out_deg.iter().sum::<usize>());
    if in_sum != out_sum {
        return Err(GenError::DegreeMismatch { in_sum, out_sum });
    }

    if in_len == 0 || num_accounts % in_len != 0 {
        return Err(GenError::NotATileMultiple { accounts: num_accounts, length: in_len });
    }

    let repeats = num_accounts / in_len;
    Ok(DegreeSequences {
        in_degrees: in_deg.repeat(repeats),
        out_degrees: out_deg.repeat(repeats),
    })
}

/// Directed multigraph produced by the configuration model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseMultigraph {
    pub num_nodes: usize,
    /// `(origin, destination)` pairs; parallel edges allowed.
    pub edges: Vec<(usize, usize)>,
}

impl BaseMultigraph {
    pub fn in_degree(&self, node: usize) -> usize {
        self.edges.iter().filter(|(_, dst)| *dst == node).count()
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.edges.iter().filter(|(src, _)| *src == node).count()
    }

    /// In-degree plus out-degree; a self-loop counts twice.
    pub fn degree(&self, node: usize) -> usize {
        self.in_degree(node) + self.out_degree(node)
    }

    pub fn self_loops(&self) -> Vec<(usize, usize)> {
        self.edges.iter().copied().filter(|(s, d)| s == d).collect()
    }
}

/// Generate a directed random multigraph with the given degree sequences,
/// eliminating self-loops by forward swaps of destination stubs.
///
/// A self-loop at position `i` swaps its destination with the first later
/// stub that differs from the origin. When no such stub exists the
/// self-loop is kept and logged.
pub fn directed_configuration_model(
    in_deg: &[usize],
    out_deg: &[usize],
    rng: &mut StageRng,
) -> GenResult<BaseMultigraph> {
    let (in_sum, out_sum) = (in_deg.iter().sum::<usize>(), out_deg.iter().sum::<usize>());
    if in_sum != out_sum {
        return Err(GenError::DegreeMismatch { in_sum, out_sum });
    }

    let num_nodes = in_deg.len().max(out_deg.len());
    let degree_at = |seq: &[usize], n: usize| seq.get(n).copied().unwrap_or(0);

    let mut in_stubs = Vec::with_capacity(in_sum);
    let mut out_stubs = Vec::with_capacity(out_sum);
    for n in 0..num_nodes {
        in_stubs.extend(std::iter::repeat(n).take(degree_at(in_deg, n)));
        out_stubs.extend(std::iter::repeat(n).take(degree_at(out_deg, n)));
    }
    if in_stubs.is_empty() {
        return Ok(BaseMultigraph { num_nodes, edges: Vec::new() });
    }

    rng.shuffle(&mut in_stubs);
    rng.shuffle(&mut out_stubs);

    let num_edges = in_stubs.len();
    for i in 0..num_edges {
        let src = out_stubs[i];
        if src != in_stubs[i] {
            continue;
        }
        if let Some(j) = (i + 1..num_edges).find(|&j| in_stubs[j] != src) {
            in_stubs.swap(i, j);
        }
    }

    let edges: Vec<(usize, usize)> = out_stubs.into_iter().zip(in_stubs).collect();
    for (idx, (src, dst)) in edges.iter().enumerate() {
        if src == dst {
            log::warn!("graph: unresolved self loop from/to {src} at edge {idx}");
        }
    }
    Ok(BaseMultigraph { num_nodes, edges })
}
