//! Run configuration
//!
//! Options are plain `key=value` pairs, read from a file and/or the command line.
//! Relative input paths resolve against `activeDirectory`.

use crate::analysis::similarity::SimilarityMetric;
use crate::input::is_ignorable;
use indexmap::IndexMap;
use netclade_algorithms::{BootstrapConfig, ResamplingScheme, SearchBudget};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line that is not `key=value`
    #[error("Invalid configuration line {line}: \"{content}\" (expected <option>=<value>, e.g. maxPathLength=4)")]
    Malformed { line: usize, content: String },

    /// Same option given twice in one file
    #[error("Option \"{0}\" appears more than once")]
    Duplicate(String),

    /// Required option absent
    #[error("Option \"{0}\" must be specified")]
    Missing(&'static str),

    /// Value that does not parse for its option
    #[error("Invalid value \"{value}\" for option \"{key}\": {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

const KNOWN_OPTIONS: &[&str] = &[
    "activeDirectory",
    "outputDirectory",
    "group1GeneSetFile",
    "group2GeneSetFile",
    "projectName",
    "proteinInteractomeFile",
    "proteinAliasesFile",
    "stringDatabaseVersion",
    "reusePreviousData",
    "calculateGraphDifferences",
    "minInteractomeConfidence",
    "maxPathCost",
    "maxPathLength",
    "fractionOfVerticesToRender",
    "maxVerticesToRender",
    "bootstrappingRounds",
    "bootstrapSeed",
    "similarityMetric",
    "resampling",
];

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralConfig {
    pub active_directory: PathBuf,
    pub output_directory: PathBuf,
    pub group1_gene_set_file: PathBuf,
    pub group2_gene_set_file: Option<PathBuf>,
    pub project_name: String,
    pub protein_interactome_file: PathBuf,
    pub protein_aliases_file: PathBuf,
    pub string_database_version: String,
}

/// Pathfinding, rendering budget and clustering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    pub reuse_previous_data: bool,
    pub calculate_graph_differences: bool,
    pub min_interactome_confidence: f64,
    pub max_path_cost: f64,
    pub max_path_length: usize,
    pub fraction_of_vertices_to_render: f64,
    pub max_vertices_to_render: usize,
    pub bootstrapping_rounds: usize,
    pub bootstrap_seed: Option<u64>,
    pub similarity_metric: SimilarityMetric,
    pub resampling: ResamplingScheme,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reuse_previous_data: true,
            calculate_graph_differences: true,
            min_interactome_confidence: 0.0,
            max_path_cost: 200.0,
            max_path_length: 5,
            fraction_of_vertices_to_render: 1.0,
            max_vertices_to_render: usize::MAX,
            bootstrapping_rounds: 1000,
            bootstrap_seed: None,
            similarity_metric: SimilarityMetric::default(),
            resampling: ResamplingScheme::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn search_budget(&self) -> SearchBudget {
        SearchBudget {
            max_path_cost: self.max_path_cost,
            max_path_length: self.max_path_length,
        }
    }

    pub fn bootstrap(&self) -> BootstrapConfig {
        BootstrapConfig {
            rounds: self.bootstrapping_rounds,
            seed: self.bootstrap_seed,
        }
    }

    /// Interactions scoring below this can never lie on an acceptable path
    pub fn interactome_threshold(&self) -> f64 {
        (1000.0 - self.max_path_cost).max(self.min_interactome_confidence)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub general: GeneralConfig,
    pub analysis: AnalysisConfig,
}

impl Configuration {
    /// Parse a configuration file. Duplicate options are rejected.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_map(parse_options(&text)?)
    }

    /// Parse `key=value` arguments; later arguments override earlier ones
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> ConfigResult<Self> {
        let mut options = IndexMap::new();
        apply_overrides(&mut options, args)?;
        Self::from_map(options)
    }

    /// Parse a configuration file, then apply `key=value` overrides on top of it
    pub fn from_file_with_overrides<S: AsRef<str>>(path: impl AsRef<Path>, overrides: &[S]) -> ConfigResult<Self> {
        let text = fs::read_to_string(path)?;
        let mut options = parse_options(&text)?;
        apply_overrides(&mut options, overrides)?;
        Self::from_map(options)
    }

    pub fn from_map(options: IndexMap<String, String>) -> ConfigResult<Self> {
        for key in options.keys() {
            if !KNOWN_OPTIONS.contains(&key.as_str()) {
                warn!("Unknown parameter {} provided", key);
            }
        }

        let general = general_config(&options)?;
        let defaults = AnalysisConfig::default();
        let analysis = AnalysisConfig {
            reuse_previous_data: parse_or(&options, "reusePreviousData", defaults.reuse_previous_data)?,
            calculate_graph_differences: parse_or(
                &options,
                "calculateGraphDifferences",
                defaults.calculate_graph_differences,
            )?,
            min_interactome_confidence: parse_or(
                &options,
                "minInteractomeConfidence",
                defaults.min_interactome_confidence,
            )?,
            max_path_cost: parse_or(&options, "maxPathCost", defaults.max_path_cost)?,
            max_path_length: parse_or(&options, "maxPathLength", defaults.max_path_length)?,
            fraction_of_vertices_to_render: parse_or(
                &options,
                "fractionOfVerticesToRender",
                defaults.fraction_of_vertices_to_render,
            )?,
            max_vertices_to_render: parse_or(&options, "maxVerticesToRender", defaults.max_vertices_to_render)?,
            bootstrapping_rounds: parse_or(&options, "bootstrappingRounds", defaults.bootstrapping_rounds)?,
            bootstrap_seed: options
                .get("bootstrapSeed")
                .map(|v| parse_value("bootstrapSeed", v))
                .transpose()?,
            similarity_metric: parse_or(&options, "similarityMetric", defaults.similarity_metric)?,
            resampling: parse_or(&options, "resampling", defaults.resampling)?,
        };

        if !analysis.max_path_cost.is_finite() || analysis.max_path_cost < 0.0 {
            return Err(invalid("maxPathCost", analysis.max_path_cost, "must be a non-negative number"));
        }
        if !(analysis.fraction_of_vertices_to_render >= 0.0) {
            return Err(invalid(
                "fractionOfVerticesToRender",
                analysis.fraction_of_vertices_to_render,
                "must be a non-negative number",
            ));
        }

        Ok(Configuration { general, analysis })
    }

    /// Path of the pairwise path cache for this project
    pub fn path_cache_file(&self) -> PathBuf {
        self.general
            .active_directory
            .join(format!("{}_Data.txt", self.general.project_name))
    }
}

fn general_config(options: &IndexMap<String, String>) -> ConfigResult<GeneralConfig> {
    let active_raw = options.get("activeDirectory").map(String::as_str).unwrap_or("");
    let active_directory = PathBuf::from(active_raw);
    let resolve = |value: &str| {
        let path = Path::new(value);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            active_directory.join(path)
        }
    };

    let output_directory = resolve(options.get("outputDirectory").map(String::as_str).unwrap_or("output"));

    let group1_gene_set_file = match options.get("group1GeneSetFile") {
        Some(v) if !v.is_empty() => resolve(v.as_str()),
        _ => return Err(ConfigError::Missing("group1GeneSetFile")),
    };
    let group2_gene_set_file = options
        .get("group2GeneSetFile")
        .filter(|v| !v.is_empty())
        .map(|v| resolve(v.as_str()));

    let project_name = match options.get("projectName") {
        Some(name) => name.clone(),
        None if !active_raw.is_empty() => active_directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| active_raw.to_string()),
        None => group1_gene_set_file
            .file_name()
            .map(|n| n.to_string_lossy())
            .and_then(|n| n.split('.').next().map(str::to_string))
            .unwrap_or_default(),
    };

    let version = options
        .get("stringDatabaseVersion")
        .cloned()
        .unwrap_or_else(|| "11.0".to_string());
    let protein_interactome_file = options
        .get("proteinInteractomeFile")
        .map(|v| resolve(v.as_str()))
        .unwrap_or_else(|| resolve(&format!("9606.protein.links.v{}.txt.gz", version)));
    let protein_aliases_file = options
        .get("proteinAliasesFile")
        .map(|v| resolve(v.as_str()))
        .unwrap_or_else(|| resolve(&format!("9606.protein.aliases.v{}.txt.gz", version)));

    Ok(GeneralConfig {
        active_directory,
        output_directory,
        group1_gene_set_file,
        group2_gene_set_file,
        project_name,
        protein_interactome_file,
        protein_aliases_file,
        string_database_version: version,
    })
}

/// Parse configuration file text into ordered options
pub fn parse_options(text: &str) -> ConfigResult<IndexMap<String, String>> {
    let mut options = IndexMap::new();
    for (number, line) in text.lines().enumerate() {
        if is_ignorable(line) {
            continue;
        }
        let (key, value) = split_option(line).ok_or_else(|| ConfigError::Malformed {
            line: number + 1,
            content: line.to_string(),
        })?;
        if options.insert(key.clone(), value).is_some() {
            return Err(ConfigError::Duplicate(key));
        }
    }
    Ok(options)
}

fn apply_overrides<S: AsRef<str>>(options: &mut IndexMap<String, String>, overrides: &[S]) -> ConfigResult<()> {
    for (i, arg) in overrides.iter().enumerate() {
        let arg = arg.as_ref();
        let (key, value) = split_option(arg).ok_or_else(|| ConfigError::Malformed {
            line: i + 1,
            content: arg.to_string(),
        })?;
        options.insert(key, value);
    }
    Ok(())
}

fn split_option(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

fn parse_value<T>(key: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(options: &IndexMap<String, String>, key: &str, default: T) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match options.get(key) {
        Some(value) => parse_value(key, value),
        None => Ok(default),
    }
}

fn invalid(key: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::from_args(&["group1GeneSetFile=cases.txt"]).unwrap();

        assert_eq!(config.general.project_name, "cases");
        assert_eq!(config.general.output_directory, PathBuf::from("output"));
        assert_eq!(config.general.group2_gene_set_file, None);
        assert_eq!(
            config.general.protein_interactome_file,
            PathBuf::from("9606.protein.links.v11.0.txt.gz")
        );
        assert_eq!(config.analysis, AnalysisConfig::default());
        assert_eq!(config.analysis.interactome_threshold(), 800.0);
    }

    #[test]
    fn test_active_directory_resolution() {
        let config = Configuration::from_args(&[
            "activeDirectory=/data/study",
            "group1GeneSetFile=cases.txt",
            "group2GeneSetFile=/elsewhere/controls.txt",
        ])
        .unwrap();

        assert_eq!(config.general.project_name, "study");
        assert_eq!(config.general.group1_gene_set_file, PathBuf::from("/data/study/cases.txt"));
        assert_eq!(
            config.general.group2_gene_set_file,
            Some(PathBuf::from("/elsewhere/controls.txt"))
        );
        assert_eq!(config.general.output_directory, PathBuf::from("/data/study/output"));
        assert_eq!(config.path_cache_file(), PathBuf::from("/data/study/study_Data.txt"));
    }

    #[test]
    fn test_parse_file_text() {
        let text = "# comment\n\n// other comment\nmaxPathLength = 4\ngroup1GeneSetFile=a.txt\n";
        let options = parse_options(text).unwrap();
        assert_eq!(options.keys().collect::<Vec<_>>(), vec!["maxPathLength", "group1GeneSetFile"]);

        let config = Configuration::from_map(options).unwrap();
        assert_eq!(config.analysis.max_path_length, 4);
    }

    #[test]
    fn test_duplicate_and_malformed() {
        assert!(matches!(
            parse_options("a=1\na=2"),
            Err(ConfigError::Duplicate(key)) if key == "a"
        ));
        assert!(matches!(
            parse_options("a=1\nnot an option"),
            Err(ConfigError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_missing_group1() {
        assert!(matches!(
            Configuration::from_args(&["maxPathCost=300"]),
            Err(ConfigError::Missing("group1GeneSetFile"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        let err = Configuration::from_args(&["group1GeneSetFile=a", "maxPathLength=lots"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "maxPathLength"));

        let err = Configuration::from_args(&["group1GeneSetFile=a", "similarityMetric=cosine"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.conf");
        fs::write(&path, "group1GeneSetFile=a.txt\nbootstrappingRounds=500\n").unwrap();

        let config =
            Configuration::from_file_with_overrides(&path, &["bootstrappingRounds=0", "resampling=bernoulli"]).unwrap();
        assert_eq!(config.analysis.bootstrapping_rounds, 0);
        assert_eq!(config.analysis.resampling, ResamplingScheme::Bernoulli);
    }
}
