use camino::Utf8PathBuf;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Current schema version written by [`crate::ConfigManager`].
pub const CONFIG_VERSION: u32 = 1;

/// Errors raised while validating a [`RunConfig`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unsupported config version {0}")]
    UnsupportedVersion(u32),

    #[error("File count must be at least 1")]
    EmptyQuota,

    #[error("Folder count must be at least 1")]
    NoFolders,

    #[error("Folder name template must not be empty")]
    EmptyFolderTemplate,

    #[error("Rename template must not be empty")]
    EmptyRenameTemplate,

    #[error("Invalid {name} range: {min}..{max}")]
    InvalidRange { name: &'static str, min: f64, max: f64 },

    #[error("Stall timeout must be a positive number of seconds, got {0}")]
    InvalidStallTimeout(f64),
}

/// Immutable parameter set for one run.
///
/// Built once (usually by [`crate::ConfigManager`]), validated with
/// [`RunConfig::validate`], then only read. Every field has a default so a
/// partial YAML file is enough to describe a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub version: u32,
    pub quota: Quota,
    pub root: Utf8PathBuf,
    pub destination: Utf8PathBuf,
    pub keywords: FilterLists,
    pub extensions: FilterLists,
    /// `None` disables the size predicate
    pub size: Option<SizeRange>,
    /// `None` disables the duration predicate
    pub duration: Option<DurationRange>,
    pub weights: WeightCaps,
    pub folders: FolderOptions,
    pub file_names: FileNameMode,
    pub trash: TrashOptions,
    pub stall_timeout_secs: f64,
    pub show_invalid: bool,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            quota: Quota::default(),
            root: Utf8PathBuf::from("."),
            destination: Utf8PathBuf::from("."),
            keywords: FilterLists::default(),
            extensions: FilterLists::default(),
            size: None,
            duration: None,
            weights: WeightCaps::default(),
            folders: FolderOptions::default(),
            file_names: FileNameMode::default(),
            trash: TrashOptions::default(),
            stall_timeout_secs: 10.0,
            show_invalid: false,
            seed: None,
        }
    }
}

impl RunConfig {
    /// Normalize swapped ranges and reject values no run could honor.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }

        self.quota = self.quota.normalized();
        if self.quota.min() == 0 {
            return Err(ConfigError::EmptyQuota);
        }

        if self.folders.create {
            if self.folders.count == 0 {
                return Err(ConfigError::NoFolders);
            }
            if self.folders.name_template.trim().is_empty() {
                return Err(ConfigError::EmptyFolderTemplate);
            }
        }

        if let FileNameMode::Rename { template } = &self.file_names {
            if template.trim().is_empty() {
                return Err(ConfigError::EmptyRenameTemplate);
            }
        }

        if let Some(size) = self.size.as_mut() {
            size.normalize();
            if size.min < 0.0 || !size.max.is_finite() {
                return Err(ConfigError::InvalidRange {
                    name: "size",
                    min: size.min,
                    max: size.max,
                });
            }
        }

        if let Some(duration) = self.duration.as_mut() {
            duration.normalize();
            if duration.min < 0.0 || !duration.max.is_finite() {
                return Err(ConfigError::InvalidRange {
                    name: "duration",
                    min: duration.min,
                    max: duration.max,
                });
            }
        }

        if !(self.stall_timeout_secs.is_finite() && self.stall_timeout_secs > 0.0) {
            return Err(ConfigError::InvalidStallTimeout(self.stall_timeout_secs));
        }

        Ok(self)
    }

    /// Number of destination folder iterations this run performs
    pub fn folder_count(&self) -> usize {
        if self.folders.create {
            self.folders.count as usize
        } else {
            1
        }
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.stall_timeout_secs)
    }
}

/// Number of files to copy into each destination folder.
///
/// Written as a bare number (`quota: 5`) or as a range (`quota: {min: 2, max: 8}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quota {
    Fixed(u32),
    /// Drawn uniformly from `min..=max` once per folder iteration
    Random { min: u32, max: u32 },
}

impl Default for Quota {
    fn default() -> Self {
        Quota::Fixed(1)
    }
}

impl Quota {
    fn normalized(self) -> Self {
        match self {
            Quota::Random { min, max } if min > max => Quota::Random { min: max, max: min },
            other => other,
        }
    }

    /// Smallest quota this setting can resolve to
    fn min(&self) -> u32 {
        match *self {
            Quota::Fixed(n) => n,
            Quota::Random { min, max } => min.min(max),
        }
    }

    /// Resolve the quota for one folder iteration.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match self.normalized() {
            Quota::Fixed(n) => n as usize,
            Quota::Random { min, max } => rng.random_range(min..=max) as usize,
        }
    }
}

/// Include (allow) and exclude (deny) lists for one filter dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterLists {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl FilterLists {
    /// Build lists from space separated strings, the way they are typed in.
    pub fn from_words(include: &str, exclude: &str) -> Self {
        Self {
            include: split_words(include),
            exclude: split_words(exclude),
        }
    }
}

fn split_words(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeUnit {
    #[serde(rename = "B")]
    Bytes,
    #[serde(rename = "KB")]
    Kilobytes,
    #[default]
    #[serde(rename = "MB")]
    Megabytes,
    #[serde(rename = "GB")]
    Gigabytes,
}

impl SizeUnit {
    pub fn bytes(self) -> f64 {
        match self {
            SizeUnit::Bytes => 1.0,
            SizeUnit::Kilobytes => 1024.0,
            SizeUnit::Megabytes => 1_048_576.0,
            SizeUnit::Gigabytes => 1_073_741_824.0,
        }
    }
}

/// Inclusive file size window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub unit: SizeUnit,
}

impl SizeRange {
    fn normalize(&mut self) {
        if self.min > self.max {
            std::mem::swap(&mut self.min, &mut self.max);
        }
    }

    /// Bounds converted to whole bytes
    pub fn bounds_bytes(&self) -> (u64, u64) {
        let unit = self.unit.bytes();
        let lo = (self.min.min(self.max) * unit).round();
        let hi = (self.min.max(self.max) * unit).round();
        (lo.max(0.0) as u64, hi.max(0.0) as u64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationUnit {
    #[default]
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
}

/// Inclusive audio duration window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub unit: DurationUnit,
}

impl DurationRange {
    fn normalize(&mut self) {
        if self.min > self.max {
            std::mem::swap(&mut self.min, &mut self.max);
        }
    }

    /// Bounds converted to seconds
    pub fn bounds_secs(&self) -> (f64, f64) {
        let factor = match self.unit {
            DurationUnit::Seconds => 1.0,
            DurationUnit::Minutes => 60.0,
        };
        (
            self.min.min(self.max) * factor,
            self.min.max(self.max) * factor,
        )
    }
}

/// Per-subtree selection caps; 0 disables a cap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightCaps {
    /// Cap per immediate child of the root
    pub top: u32,
    /// Cap per parent folder of a selected file
    pub bottom: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderOptions {
    /// Create a fresh subfolder per iteration instead of copying into `destination`
    pub create: bool,
    pub count: u32,
    pub name_template: String,
    /// Keep touched files excluded across folder iterations
    pub unique: bool,
}

impl Default for FolderOptions {
    fn default() -> Self {
        Self {
            create: false,
            count: 1,
            name_template: "Random Files".to_string(),
            unique: false,
        }
    }
}

/// How copied files are named in the destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FileNameMode {
    /// Original name, `" (n)"` suffix on collision, size-identical files skipped
    #[default]
    Keep,
    /// `"{index}.{original name}"`
    Index,
    /// `"{template} {index}{ext}"`, probing upward on collision
    Rename { template: String },
}

/// Which touched entries go to the recoverable trash
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrashOptions {
    pub empty_folders: bool,
    pub source_files: bool,
    pub invalid_files: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_default_config_is_valid() {
        let config = RunConfig::default().validate().unwrap();
        assert_eq!(config.quota, Quota::Fixed(1));
        assert_eq!(config.folder_count(), 1);
        assert_eq!(config.stall_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_swapped_ranges_are_normalized() {
        let config = RunConfig {
            quota: Quota::Random { min: 9, max: 3 },
            size: Some(SizeRange {
                min: 5.0,
                max: 1.0,
                unit: SizeUnit::Kilobytes,
            }),
            duration: Some(DurationRange {
                min: 2.0,
                max: 1.0,
                unit: DurationUnit::Minutes,
            }),
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(config.quota, Quota::Random { min: 3, max: 9 });
        assert_eq!(config.size.unwrap().bounds_bytes(), (1024, 5120));
        assert_eq!(config.duration.unwrap().bounds_secs(), (60.0, 120.0));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_quota = RunConfig {
            quota: Quota::Fixed(0),
            ..Default::default()
        };
        assert_eq!(zero_quota.validate(), Err(ConfigError::EmptyQuota));

        // A range that can draw zero would leave a folder with nothing to copy
        let zero_low_bound = RunConfig {
            quota: Quota::Random { min: 0, max: 4 },
            ..Default::default()
        };
        assert_eq!(zero_low_bound.validate(), Err(ConfigError::EmptyQuota));

        let no_folders = RunConfig {
            folders: FolderOptions {
                create: true,
                count: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(no_folders.validate(), Err(ConfigError::NoFolders));

        let blank_rename = RunConfig {
            file_names: FileNameMode::Rename {
                template: "  ".to_string(),
            },
            ..Default::default()
        };
        assert_eq!(blank_rename.validate(), Err(ConfigError::EmptyRenameTemplate));

        let bad_timeout = RunConfig {
            stall_timeout_secs: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            bad_timeout.validate(),
            Err(ConfigError::InvalidStallTimeout(_))
        ));
    }

    #[test]
    fn test_random_quota_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let quota = Quota::Random { min: 2, max: 4 };
        for _ in 0..100 {
            let n = quota.resolve(&mut rng);
            assert!((2..=4).contains(&n));
        }
        assert_eq!(Quota::Fixed(3).resolve(&mut rng), 3);
    }

    #[test]
    fn test_size_units() {
        let range = SizeRange {
            min: 1.5,
            max: 2.0,
            unit: SizeUnit::Megabytes,
        };
        assert_eq!(range.bounds_bytes(), (1_572_864, 2_097_152));
        assert_eq!(SizeUnit::Gigabytes.bytes(), 1_073_741_824.0);
    }

    #[test]
    fn test_from_words() {
        let lists = FilterLists::from_words("mp3  wav", "");
        assert_eq!(lists.include, vec!["mp3", "wav"]);
        assert!(lists.exclude.is_empty());
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = r#"
quota: { min: 2, max: 5 }
root: /music
destination: /out
extensions:
  include: [mp3, wav]
size: { min: 1, max: 20, unit: MB }
file_names: { mode: rename, template: Track }
stall_timeout_secs: 30
"#;
        let config: RunConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.quota, Quota::Random { min: 2, max: 5 });
        assert_eq!(config.extensions.include, vec!["mp3", "wav"]);
        assert_eq!(config.size.unwrap().unit, SizeUnit::Megabytes);
        assert_eq!(
            config.file_names,
            FileNameMode::Rename {
                template: "Track".to_string()
            }
        );
        assert_eq!(config.folders, FolderOptions::default());
        assert_eq!(config.version, CONFIG_VERSION);

        let fixed: RunConfig = serde_yaml_ng::from_str("quota: 4").unwrap();
        assert_eq!(fixed.quota, Quota::Fixed(4));
    }
}
