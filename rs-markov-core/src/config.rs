use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration, read from a TOML file.
///
/// Every field has a default so a partial (or empty) file is valid.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChainConfig {
	/// Chain order, at least 2 (default 3)
	#[serde(default = "default_order")]
	pub order: usize,
	/// Where the model is saved and loaded (default `data/markov.json`)
	#[serde(default = "default_model_path")]
	pub model_path: PathBuf,
	/// Generation defaults
	#[serde(default)]
	pub generation: GenerationConfig,
}

/// Defaults used when the caller does not pass explicit generation arguments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationConfig {
	/// Soft word count target (default 20)
	#[serde(default = "default_target_length")]
	pub target_length: usize,
	/// Capitalize and punctuate the output (default true)
	#[serde(default = "default_coherent")]
	pub coherent: bool,
	/// Stop heuristic tuning
	#[serde(default)]
	pub ending: EndHeuristic,
}

/// Tuning of the sentence-termination heuristic.
///
/// The stop probability at each step is
/// `baseline + length_weight * ramp + ender_bonus * (1 + ramp)` (the last term
/// only when the last word is a known sentence ender), where `ramp` grows
/// quadratically from 0 at `ramp_start * target` to 1 at the target.
/// Past `hard_limit(target)` the heuristic always stops.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EndHeuristic {
	/// Stop probability at every step (default 0.02)
	#[serde(default = "default_baseline")]
	pub baseline: f64,
	/// Added when the last word is a sentence ender (default 0.25)
	#[serde(default = "default_ender_bonus")]
	pub ender_bonus: f64,
	/// Weight of the length ramp (default 0.8)
	#[serde(default = "default_length_weight")]
	pub length_weight: f64,
	/// Fraction of the target where the ramp starts (default 0.5)
	#[serde(default = "default_ramp_start")]
	pub ramp_start: f64,
	/// Hard limit as a multiple of the target (default 2.0)
	#[serde(default = "default_hard_stop_factor")]
	pub hard_stop_factor: f64,
	/// Minimum words past the target before the hard limit (default 5)
	#[serde(default = "default_hard_stop_margin")]
	pub hard_stop_margin: usize,
}

fn default_order() -> usize {
	3
}

fn default_model_path() -> PathBuf {
	PathBuf::from("data/markov.json")
}

fn default_target_length() -> usize {
	20
}

fn default_coherent() -> bool {
	true
}

fn default_baseline() -> f64 {
	0.02
}

fn default_ender_bonus() -> f64 {
	0.25
}

fn default_length_weight() -> f64 {
	0.8
}

fn default_ramp_start() -> f64 {
	0.5
}

fn default_hard_stop_factor() -> f64 {
	2.0
}

fn default_hard_stop_margin() -> usize {
	5
}

impl Default for ChainConfig {
	fn default() -> Self {
		Self {
			order: default_order(),
			model_path: default_model_path(),
			generation: GenerationConfig::default(),
		}
	}
}

impl Default for GenerationConfig {
	fn default() -> Self {
		Self {
			target_length: default_target_length(),
			coherent: default_coherent(),
			ending: EndHeuristic::default(),
		}
	}
}

impl Default for EndHeuristic {
	fn default() -> Self {
		Self {
			baseline: default_baseline(),
			ender_bonus: default_ender_bonus(),
			length_weight: default_length_weight(),
			ramp_start: default_ramp_start(),
			hard_stop_factor: default_hard_stop_factor(),
			hard_stop_margin: default_hard_stop_margin(),
		}
	}
}

impl EndHeuristic {
	/// Length at which generation always stops for a given target.
	///
	/// `max(ceil(target * hard_stop_factor), target + hard_stop_margin)`,
	/// never less than `target + 1`.
	pub fn hard_limit(&self, target_length: usize) -> usize {
		let scaled = (target_length as f64 * self.hard_stop_factor).ceil() as usize;
		scaled
			.max(target_length.saturating_add(self.hard_stop_margin))
			.max(target_length.saturating_add(1))
	}

	/// Probability of stopping after `current_length` words.
	pub(crate) fn stop_probability(&self, is_ender: bool, current_length: usize, target_length: usize) -> f64 {
		let target = target_length.max(1) as f64;
		let start = target * self.ramp_start.clamp(0.0, 1.0);
		let ramp = if (current_length as f64) <= start {
			0.0
		} else if target <= start {
			1.0
		} else {
			((current_length as f64 - start) / (target - start)).min(1.0).powi(2)
		};

		let mut p = self.baseline + self.length_weight * ramp;
		if is_ender {
			p += self.ender_bonus * (1.0 + ramp);
		}
		p.clamp(0.0, 1.0)
	}
}

impl ChainConfig {
	/// Parses a TOML configuration file.
	///
	/// # Errors
	/// `Io` if the file cannot be read, `Config` if it is not valid TOML.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let contents = fs::read_to_string(path)?;
		Ok(toml::from_str(&contents)?)
	}

	/// Loads the configuration, falling back to defaults when the file is
	/// missing or invalid.
	pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
		let path = path.as_ref();
		match Self::from_file(path) {
			Ok(config) => {
				info!("[Config] loaded {}", path.display());
				config
			}
			Err(e) => {
				warn!("[Config] using defaults, could not load {}: {}", path.display(), e);
				Self::default()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_toml_keeps_defaults() {
		let config: ChainConfig = toml::from_str("order = 4\n[generation]\ncoherent = false\n").unwrap();
		assert_eq!(config.order, 4);
		assert!(!config.generation.coherent);
		assert_eq!(config.generation.target_length, 20);
		assert_eq!(config.generation.ending, EndHeuristic::default());
		assert_eq!(config.model_path, PathBuf::from("data/markov.json"));
	}

	#[test]
	fn empty_toml_is_default() {
		let config: ChainConfig = toml::from_str("").unwrap();
		assert_eq!(config, ChainConfig::default());
	}

	#[test]
	fn missing_file_falls_back() {
		let config = ChainConfig::load_or_default("does/not/exist.toml");
		assert_eq!(config, ChainConfig::default());
	}

	#[test]
	fn hard_limit_bounds() {
		let ending = EndHeuristic::default();
		assert_eq!(ending.hard_limit(20), 40);
		assert_eq!(ending.hard_limit(1), 6);
		assert_eq!(ending.hard_limit(0), 5);
	}

	#[test]
	fn hard_limit_saturates_on_huge_targets() {
		let ending = EndHeuristic::default();
		assert_eq!(ending.hard_limit(usize::MAX), usize::MAX);
		assert_eq!(ending.hard_limit(usize::MAX - 2), usize::MAX);
	}

	#[test]
	fn stop_probability_grows_with_length() {
		let ending = EndHeuristic::default();
		let early = ending.stop_probability(false, 2, 20);
		let late = ending.stop_probability(false, 20, 20);
		assert!((early - ending.baseline).abs() < 1e-9);
		assert!(late > early);
		assert!(ending.stop_probability(true, 2, 20) > early);
	}
}
