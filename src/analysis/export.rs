//! Render-ready clade graphs and their text exports
//!
//! For one clade the layered graphs of its group 1, group 2 and combined patients
//! (and optionally the two group differences) are reduced with
//! [`Graph::reduce_by_paths`] and written as interaction and gene tables.

use crate::bio::{Cohort, ProteinId, ProteinRegistry};
use crate::config::AnalysisConfig;
use crate::network::interactome_search;
use netclade_algorithms::{Graph, SearchBudget};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which summary graph of a clade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    Group1,
    Group2,
    Combined,
    Group1MinusGroup2,
    Group2MinusGroup1,
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphKind::Group1 => "Group1",
            GraphKind::Group2 => "Group2",
            GraphKind::Combined => "Group1AndGroup2",
            GraphKind::Group1MinusGroup2 => "Group1MinusGroup2",
            GraphKind::Group2MinusGroup1 => "Group2MinusGroup1",
        };
        f.write_str(name)
    }
}

/// `ceil(min(fraction · |V|, max_vertices))`
pub fn vertex_budget(fraction: f64, max_vertices: usize, vertex_count: usize) -> usize {
    (fraction * vertex_count as f64).min(max_vertices as f64).ceil() as usize
}

fn reduce(graph: &Graph<ProteinId, f64>, endpoints: &BTreeSet<ProteinId>, config: &AnalysisConfig) -> Graph<ProteinId, f64> {
    let budget = vertex_budget(
        config.fraction_of_vertices_to_render,
        config.max_vertices_to_render,
        graph.node_count(),
    );
    graph.reduce_by_paths(endpoints, budget)
}

/// Layered graph of a cohort, searchable by interaction confidence
fn summary_graph(cohort: &Cohort) -> Graph<ProteinId, f64> {
    cohort
        .layered_graph()
        .with_search(interactome_search(SearchBudget::default()))
}

/// Ratio weights giving both groups equal total weight: the smaller group gets
/// `larger / smaller`, the other `1`
pub fn group_weights(group1_size: usize, group2_size: usize) -> (f64, f64) {
    let (n1, n2) = (group1_size as f64, group2_size as f64);
    let w1 = if group1_size > 0 && n1 < n2 { n2 / n1 } else { 1.0 };
    let w2 = if group2_size > 0 && n2 < n1 { n1 / n2 } else { 1.0 };
    (w1, w2)
}

/// Reduced summary graphs of a clade whose patients are split into `group1`,
/// `group2` and their union `combined`. Empty graphs are omitted.
pub fn clade_graphs(
    group1: &Cohort,
    group2: &Cohort,
    combined: &Cohort,
    config: &AnalysisConfig,
) -> Vec<(GraphKind, Graph<ProteinId, f64>)> {
    let mut graphs = Vec::new();

    let layered1 = summary_graph(group1);
    let reduced1 = reduce(&layered1, &group1.unique_proteins(), config);
    if !reduced1.is_empty() {
        graphs.push((GraphKind::Group1, reduced1));
    }
    if group2.is_empty() {
        return graphs;
    }

    let layered2 = summary_graph(group2);
    let reduced2 = reduce(&layered2, &group2.unique_proteins(), config);
    if reduced2.is_empty() {
        return graphs;
    }
    graphs.push((GraphKind::Group2, reduced2));
    graphs.push((
        GraphKind::Combined,
        reduce(&summary_graph(combined), &combined.unique_proteins(), config),
    ));

    if config.calculate_graph_differences && !layered1.is_empty() {
        let (f1, f2) = group_weights(group1.len(), group2.len());
        let differences = [
            (GraphKind::Group1MinusGroup2, layered1.subtract(&layered2, f1, f2), group1),
            (GraphKind::Group2MinusGroup1, layered2.subtract(&layered1, f2, f1), group2),
        ];
        for (kind, difference, endpoints) in differences {
            let reduced = reduce(&difference, &endpoints.unique_proteins(), config);
            if !reduced.is_empty() {
                graphs.push((kind, reduced));
            }
        }
    }
    graphs
}

/// `#source target weight` table, one line per undirected edge
pub fn write_interactions<W: Write>(
    out: &mut W,
    graph: &Graph<ProteinId, f64>,
    registry: &ProteinRegistry,
) -> io::Result<()> {
    writeln!(out, "#source\ttarget\tweight (STRING score)")?;
    for edge in graph.edges().filter(|e| e.source <= e.target) {
        writeln!(
            out,
            "{}\t{}\t{}",
            registry.display_name(&edge.source),
            registry.display_name(&edge.target),
            edge.weight
        )?;
    }
    out.flush()
}

/// `#gene origin count` table. Origin tells which groups' gene sets hold the
/// protein; proteins only reached through paths are `imputed`.
pub fn write_gene_set<W: Write>(
    out: &mut W,
    graph: &Graph<ProteinId, f64>,
    group1: &BTreeSet<ProteinId>,
    group2: &BTreeSet<ProteinId>,
    registry: &ProteinRegistry,
) -> io::Result<()> {
    writeln!(out, "#gene\torigin\tcount")?;
    for protein in graph.nodes() {
        let origin = match (group1.contains(protein), group2.contains(protein)) {
            (true, true) => "both",
            (true, false) => "group1",
            (false, true) => "group2",
            (false, false) => "imputed",
        };
        writeln!(
            out,
            "{}\t{}\t{}",
            registry.display_name(protein),
            origin,
            graph.count(protein)
        )?;
    }
    out.flush()
}

/// Everything written for one exported clade
pub struct CladeExport<'a> {
    pub id: &'a str,
    pub project_name: &'a str,
    pub group1: &'a Cohort,
    pub group2: &'a Cohort,
    pub combined: &'a Cohort,
    /// Newick dendrogram of the clade, absent for a single patient
    pub newick: Option<String>,
}

impl CladeExport<'_> {
    /// Write the clade's files under `output_directory/<id>/`, returning their paths
    pub fn write(
        &self,
        output_directory: &Path,
        config: &AnalysisConfig,
        registry: &ProteinRegistry,
    ) -> io::Result<Vec<PathBuf>> {
        let directory = output_directory.join(self.id);
        fs::create_dir_all(&directory)?;
        let prefix = format!("{}{}", self.project_name, self.id);
        let (proteins1, proteins2) = (self.group1.unique_proteins(), self.group2.unique_proteins());

        let mut written = Vec::new();
        for (kind, graph) in clade_graphs(self.group1, self.group2, self.combined, config) {
            debug!("{} {} graph: {} vertices", self.id, kind, graph.node_count());

            let interactions = directory.join(format!("{}_{}_Interactions.txt", prefix, kind));
            write_interactions(&mut BufWriter::new(File::create(&interactions)?), &graph, registry)?;
            written.push(interactions);

            let genes = directory.join(format!("{}_{}_GeneSet.txt", prefix, kind));
            write_gene_set(
                &mut BufWriter::new(File::create(&genes)?),
                &graph,
                &proteins1,
                &proteins2,
                registry,
            )?;
            written.push(genes);
        }

        if let Some(newick) = &self.newick {
            let dendrogram = directory.join(format!("{}_Dendrogram.txt", prefix));
            fs::write(&dendrogram, format!("{}\n", newick))?;
            written.push(dendrogram);
        }

        info!("Exported {} files for {} to {:?}", written.len(), self.id, directory);
        Ok(written)
    }
}
