//! Cartograph CLI - Self-Organizing Map Engine
//!
//! Command-line interface for training maps and locating inputs on them.

use cartograph::{
    BinaryStrategy, BitVector, Neighborhood, NeverCancel, ProgressListener, ProgressListeners, RealStrategy, Result,
    SelfOrganizingMap, SomConfig, SomError, SomTrainer, Topology, TrainingState, VectorStrategy,
};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use log::error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "cartograph")]
#[command(author = "Cartograph Contributors")]
#[command(version)]
#[command(about = "Self-Organizing Map Engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new map from an input file
    Train {
        /// Input vectors, one per line (real: numbers; binary: key indices)
        #[arg(short, long)]
        input: PathBuf,

        /// Output map file (text format)
        #[arg(short, long)]
        output: PathBuf,

        /// Kind of input vectors
        #[arg(short, long, value_enum, default_value = "real")]
        kind: VectorKind,

        /// Number of keys for binary input (default: highest key + 1)
        #[arg(long)]
        keys: Option<usize>,

        /// Grid width
        #[arg(long, default_value = "16")]
        width: usize,

        /// Grid height
        #[arg(long, default_value = "16")]
        height: usize,

        /// Use a bounded grid instead of a torus
        #[arg(long)]
        bounded: bool,

        /// Neighbourhood shape
        #[arg(short, long, value_enum, default_value = "gaussian")]
        neighborhood: Shape,

        /// Number of times the map doubles during training
        #[arg(short, long, default_value = "0")]
        grow: u32,

        /// Enable the quick best-match search
        #[arg(short, long)]
        fast: bool,

        /// Training cycles per grid node and phase
        #[arg(short, long, default_value = "16")]
        cycles: usize,

        /// Worker threads (0 = all cores)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<u64>,

        /// Also write a binary snapshot
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Print the best-match location of every input vector
    Map {
        /// Trained map file
        #[arg(short, long)]
        map: PathBuf,

        /// Input vectors in the same layout used for training
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show map statistics
    Info {
        /// Map file to inspect
        map: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VectorKind {
    Real,
    Binary,
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    Gaussian,
    MexicanHat,
    Linear,
}

impl From<Shape> for Neighborhood {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Gaussian => Neighborhood::Gaussian,
            Shape::MexicanHat => Neighborhood::MexicanHat,
            Shape::Linear => Neighborhood::Linear,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let result = match cli.command {
        Commands::Train {
            input,
            output,
            kind,
            keys,
            width,
            height,
            bounded,
            neighborhood,
            grow,
            fast,
            cycles,
            threads,
            seed,
            snapshot,
        } => {
            let config = SomConfig {
                width,
                height,
                topology: if bounded { Topology::Bounded } else { Topology::Toroidal },
                neighborhood: neighborhood.into(),
                grow_steps: grow,
                fast_best_match: fast,
                cycles_per_node: cycles,
                threads,
                seed,
                ..Default::default()
            };
            train_map(&input, &output, kind, keys, config, snapshot.as_deref())
        }

        Commands::Map { map, input } => map_inputs(&map, &input),

        Commands::Info { map } => show_info(&map),
    };

    if let Err(e) = result {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Draws an indicatif bar for each training phase.
struct BarProgress {
    style: ProgressStyle,
    bar: Option<ProgressBar>,
    min: u64,
}

impl BarProgress {
    fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) ETA: {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░  ");
        Self {
            style,
            bar: None,
            min: 0,
        }
    }
}

impl ProgressListener for BarProgress {
    fn start(&mut self, message: &str, min: u64, max: u64) {
        let bar = ProgressBar::new(max.saturating_sub(min));
        bar.set_style(self.style.clone());
        bar.set_message(message.to_string());
        self.min = min;
        self.bar = Some(bar);
    }

    fn update(&mut self, value: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(value.saturating_sub(self.min));
        }
    }

    fn stop(&mut self, message: &str) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        println!("✓ {}", message);
    }
}

fn train_map(
    input: &Path,
    output: &Path,
    kind: VectorKind,
    keys: Option<usize>,
    config: SomConfig,
    snapshot: Option<&Path>,
) -> Result<()> {
    println!("Cartograph Self-Organizing Map Engine");
    println!("   Training map from: {}", input.display());
    println!();

    match kind {
        VectorKind::Real => {
            let data = read_real_vectors(input)?;
            let dimension = data.first().map_or(0, Vec::len);
            println!("✓ Loaded {} vectors with {} parameters", format_number(data.len()), dimension);
            run_training(config, RealStrategy::new(dimension), &data, output, snapshot)
        }
        VectorKind::Binary => {
            let (data, key_count) = read_binary_vectors(input, keys)?;
            println!("✓ Loaded {} fingerprints over {} keys", format_number(data.len()), key_count);
            run_training(config, BinaryStrategy::new(key_count), &data, output, snapshot)
        }
    }
}

fn run_training<S: VectorStrategy>(
    config: SomConfig,
    strategy: S,
    data: &[S::Vector],
    output: &Path,
    snapshot: Option<&Path>,
) -> Result<()> {
    if data.is_empty() {
        return Err(SomError::EmptyInput("The input file holds no vectors".to_string()));
    }

    let start_time = Instant::now();
    let (width, height) = (config.width, config.height);
    let mut trainer = SomTrainer::new(config, strategy)?;
    println!(
        "✓ Initialized {}x{} map, {} training cycles on {} workers",
        width,
        height,
        format_number(trainer.total_cycles()),
        trainer.threads()
    );
    println!();

    let mut listeners = ProgressListeners::new();
    listeners.add(BarProgress::new());
    let state = trainer.train(data, &mut listeners, &NeverCancel)?;
    if state != TrainingState::Completed {
        return Err(SomError::Config(format!("Training ended in state {:?}", state)));
    }

    let map = trainer.into_map()?;
    map.save(output)?;
    println!("✓ Saved map to {}", output.display());
    if let Some(path) = snapshot {
        map.save_snapshot(path)?;
        println!("✓ Saved snapshot to {}", path.display());
    }

    let error = quantization_error(&map, data)?;

    println!();
    println!("Training complete in {}", HumanDuration(start_time.elapsed()));
    println!("   Grid: {}x{} ({} nodes)", map.width(), map.height(), map.width() * map.height());
    println!("   Mean quantization error: {:.6}", error);
    println!("   Output: {}", output.display());

    Ok(())
}

/// Mean dissimilarity between each input and its best match.
fn quantization_error<S: VectorStrategy>(map: &SelfOrganizingMap<S>, data: &[S::Vector]) -> Result<f64> {
    let mut total = 0.0;
    for vector in data {
        let (x, y) = map.best_match_location(vector)?;
        total += map.dissimilarity_at(vector, x, y)?;
    }
    Ok(total / data.len().max(1) as f64)
}

fn map_inputs(map_path: &Path, input: &Path) -> Result<()> {
    match load_any(map_path)? {
        AnyMap::Real(map) => {
            let data = read_real_vectors(input)?;
            print_locations(&map, &data)
        }
        AnyMap::Binary(map) => {
            let (data, _) = read_binary_vectors(input, Some(map.strategy().dimension()))?;
            print_locations(&map, &data)
        }
    }
}

fn print_locations<S: VectorStrategy>(map: &SelfOrganizingMap<S>, data: &[S::Vector]) -> Result<()> {
    println!("row\tx\ty\tdissimilarity");
    for (row, vector) in data.iter().enumerate() {
        let (x, y) = map.best_match_location(vector)?;
        let dissimilarity = map.dissimilarity_at(vector, x, y)?;
        println!("{}\t{}\t{}\t{:.6}", row, x, y, dissimilarity);
    }
    Ok(())
}

fn show_info(map_path: &Path) -> Result<()> {
    let map = load_any(map_path)?;
    let (kind, width, height, mode, dimension) = match &map {
        AnyMap::Real(m) => ("real", m.width(), m.height(), m.mode(), m.strategy().dimension()),
        AnyMap::Binary(m) => ("binary", m.width(), m.height(), m.mode(), m.strategy().dimension()),
    };

    println!("Map: {}", map_path.display());
    println!("  Vectors: {} ({} dimensions)", kind, dimension);
    println!("  Grid: {}x{} ({} nodes)", width, height, width * height);
    println!("  Topology: {:?}", mode.topology);
    println!("  Neighborhood: {:?}", mode.neighborhood);
    println!("  Grown: {}", mode.grow);
    println!("  Fast best match: {}", mode.fast_best_match);
    println!("  Creation mode: {}", mode.to_bits());
    Ok(())
}

enum AnyMap {
    Real(SelfOrganizingMap<RealStrategy>),
    Binary(SelfOrganizingMap<BinaryStrategy>),
}

/// Loads a map of either vector kind.
fn load_any(path: &Path) -> Result<AnyMap> {
    match SelfOrganizingMap::<RealStrategy>::load(path) {
        Ok(map) => Ok(AnyMap::Real(map)),
        Err(SomError::InvalidFormat(_)) => SelfOrganizingMap::<BinaryStrategy>::load(path).map(AnyMap::Binary),
        Err(e) => Err(e),
    }
}

/// Non-empty, non-comment lines with their 1-based line numbers.
fn data_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            lines.push((index + 1, trimmed.to_string()));
        }
    }
    Ok(lines)
}

fn fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ',').filter(|f| !f.is_empty())
}

fn read_real_vectors(path: &Path) -> Result<Vec<Vec<f64>>> {
    data_lines(path)?
        .into_iter()
        .map(|(number, line)| {
            fields(&line)
                .map(|field| {
                    field.parse::<f64>().map_err(|e| {
                        SomError::InvalidInput(format!("{}:{}: bad number {:?}: {}", path.display(), number, field, e))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}

fn read_binary_vectors(path: &Path, keys: Option<usize>) -> Result<(Vec<BitVector>, usize)> {
    let mut rows = Vec::new();
    for (number, line) in data_lines(path)? {
        let row = fields(&line)
            .map(|field| {
                field.parse::<usize>().map_err(|e| {
                    SomError::InvalidInput(format!("{}:{}: bad key {:?}: {}", path.display(), number, field, e))
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        rows.push(row);
    }

    let highest = rows.iter().flatten().max().map_or(0, |&k| k + 1);
    let key_count = keys.unwrap_or(highest);
    if highest > key_count {
        return Err(SomError::Config(format!(
            "Key {} out of range for {} keys",
            highest - 1,
            key_count
        )));
    }

    let vectors = rows.iter().map(|row| BitVector::from_keys(row, key_count)).collect();
    Ok((vectors, key_count))
}

/// Format large numbers with commas for readability
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_real_vectors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.txt");
        fs::write(&path, "# x y\n0.5, 1\n\n-2 3e1\n").unwrap();
        assert_eq!(read_real_vectors(&path).unwrap(), vec![vec![0.5, 1.0], vec![-2.0, 30.0]]);

        fs::write(&path, "1 2\n3 oops\n").unwrap();
        let err = read_real_vectors(&path).unwrap_err();
        assert!(matches!(err, SomError::InvalidInput(_)));
        assert!(err.to_string().contains(":2:"));
    }

    #[test]
    fn test_read_binary_vectors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "0 3\n7\n").unwrap();
        let (vectors, keys) = read_binary_vectors(&path, None).unwrap();
        assert_eq!(keys, 8);
        assert!(vectors[0].get(3));
        assert!(matches!(read_binary_vectors(&path, Some(4)), Err(SomError::Config(_))));

        fs::write(&path, "0 -1\n").unwrap();
        assert!(matches!(read_binary_vectors(&path, None), Err(SomError::InvalidInput(_))));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(12), "12");
    }
}
