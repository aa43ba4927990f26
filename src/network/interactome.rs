//! Interactome loading
//!
//! STRING `protein.links` tables: one `protein1 protein2 combined_score` line per
//! interaction, whitespace separated, usually behind a header line. Interactions
//! scoring below the threshold can never lie on an acceptable path and are dropped
//! at load time.

use crate::bio::{ProteinId, ProteinRegistry};
use crate::input::{is_ignorable, open_text};
use netclade_algorithms::{CostModel, Graph, GraphError, PathSearch, SearchBudget};
use std::io::{self, BufRead};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// STRING combined scores are integers in `0..=1000`
pub const MAX_INTERACTION_SCORE: u32 = 1000;

#[derive(Error, Debug)]
pub enum InteractomeError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Data line that is not `protein protein score`
    #[error("Malformed interactome line {line}: {content}")]
    Malformed { line: usize, content: String },

    /// Graph construction error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

pub type InteractomeResult<T> = Result<T, InteractomeError>;

/// Search parameters for paths over an interactome: cost is `1000 - score`
pub fn interactome_search(budget: SearchBudget) -> PathSearch {
    PathSearch {
        cost_model: CostModel::Inverted { ceiling: MAX_INTERACTION_SCORE },
        budget,
    }
}

/// Load an interactome file, keeping interactions scoring at least `threshold`
pub fn load(
    path: impl AsRef<Path>,
    threshold: f64,
    budget: SearchBudget,
    registry: &ProteinRegistry,
) -> InteractomeResult<Graph<ProteinId>> {
    let path = path.as_ref();
    info!("Loading interactome from {:?} (minimum score {})", path, threshold);
    let graph = read(open_text(path)?, threshold, budget, registry)?;
    info!(
        "Interactome has {} proteins and {} interactions",
        graph.node_count(),
        graph.edge_count() / 2
    );
    Ok(graph)
}

pub fn read<R: BufRead>(
    reader: R,
    threshold: f64,
    budget: SearchBudget,
    registry: &ProteinRegistry,
) -> InteractomeResult<Graph<ProteinId>> {
    let mut graph = Graph::new().with_search(interactome_search(budget));
    let mut skipped = 0usize;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if is_ignorable(&line) {
            continue;
        }
        let malformed = || InteractomeError::Malformed {
            line: number + 1,
            content: line.clone(),
        };

        let mut fields = line.split_whitespace();
        let (Some(p1), Some(p2), Some(score)) = (fields.next(), fields.next(), fields.next()) else {
            return Err(malformed());
        };
        let score: u32 = match score.parse() {
            Ok(score) => score,
            // Column header
            Err(_) if number == 0 => continue,
            Err(_) => return Err(malformed()),
        };

        if (score as f64) < threshold || p1 == p2 {
            skipped += 1;
            continue;
        }
        graph.add_edge(registry.resolve(p1), registry.resolve(p2), score, true)?;
    }

    debug!("{} interactions below threshold or self-referencing", skipped);
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netclade_algorithms::Pathfinder;

    const LINKS: &str = "protein1 protein2 combined_score\n\
        9606.A 9606.B 900\n\
        9606.B 9606.A 900\n\
        9606.B 9606.C 850\n\
        9606.A 9606.C 400\n\
        9606.C 9606.C 999\n";

    #[test]
    fn test_threshold_filter() {
        let registry = ProteinRegistry::new();
        let graph = read(LINKS.as_bytes(), 800.0, SearchBudget::default(), &registry).unwrap();

        assert_eq!(graph.node_count(), 3);
        // A-B and B-C, both directions
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.degree(&ProteinId::new("9606.B")), 2);
    }

    #[test]
    fn test_paths_use_inverted_scores() {
        let registry = ProteinRegistry::new();
        let budget = SearchBudget { max_path_cost: 300.0, max_path_length: 5 };
        let graph = read(LINKS.as_bytes(), 0.0, budget, &registry).unwrap();

        let path = graph.find_path(&ProteinId::new("9606.A"), &ProteinId::new("9606.C"));
        // Direct edge costs 600, over budget; A-B-C costs 100 + 150
        assert_eq!(path.len(), 2);
        assert_eq!(path.cost(), 250.0);
    }

    #[test]
    fn test_malformed_line() {
        let registry = ProteinRegistry::new();
        let err = read("9606.A 9606.B 900\n9606.A 9606.B high\n".as_bytes(), 0.0, SearchBudget::default(), &registry)
            .unwrap_err();
        assert!(matches!(err, InteractomeError::Malformed { line: 2, .. }));

        let err = read("9606.A 9606.B\n".as_bytes(), 0.0, SearchBudget::default(), &registry).unwrap_err();
        assert!(matches!(err, InteractomeError::Malformed { line: 1, .. }));
    }
}
