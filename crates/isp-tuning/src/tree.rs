//! Chromatix tuning tree

use crate::error::TuningError;
use crate::mode::{ModeSelector, TuningMode};
use crate::trigger::TriggerAxis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identity of one chromatix node in the tree's symbol table.
///
/// Two handles refer to the same calibration iff their symbols match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TuningHandle {
    symbol: u32,
}

impl TuningHandle {
    pub fn symbol(&self) -> u32 {
        self.symbol
    }
}

/// One operating point of a calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningRegion {
    /// Trigger value where this region starts
    pub start: f32,
    /// Trigger value where this region ends
    pub end: f32,
    /// Module parameters valid inside the region
    pub params: Vec<f32>,
}

/// Calibration data for one IQ module at one tuning mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromatixModule {
    /// Module enable bit from tuning
    pub enable: bool,
    /// Axis the regions are laid out on
    pub trigger: TriggerAxis,
    /// Regions sorted by trigger value
    #[serde(default)]
    pub regions: Vec<TuningRegion>,
}

impl ChromatixModule {
    /// Number of parameters each region carries
    pub fn param_count(&self) -> usize {
        self.regions.first().map(|r| r.params.len()).unwrap_or(0)
    }

    fn validate(&self, module: &str) -> Result<(), TuningError> {
        let invalid = |reason: &str| TuningError::InvalidChromatix {
            module: module.to_string(),
            reason: reason.to_string(),
        };

        if self.enable && self.regions.is_empty() {
            return Err(invalid("enabled module has no regions"));
        }

        let count = self.param_count();
        let mut previous_end = f32::MIN;
        for region in &self.regions {
            if region.start > region.end {
                return Err(invalid("region start after end"));
            }
            if region.start < previous_end {
                return Err(invalid("regions overlap or are unsorted"));
            }
            if region.params.len() != count {
                return Err(invalid("regions disagree on parameter count"));
            }
            previous_end = region.end;
        }
        Ok(())
    }
}

/// A chromatix node together with its identity
#[derive(Debug, Clone)]
pub struct ResolvedChromatix {
    pub handle: TuningHandle,
    pub data: Arc<ChromatixModule>,
}

#[derive(Debug, Deserialize)]
struct TreeDocument {
    modules: BTreeMap<String, Vec<EntryDocument>>,
}

#[derive(Debug, Deserialize)]
struct EntryDocument {
    #[serde(default)]
    selectors: Vec<ModeSelector>,
    data: ChromatixModule,
}

#[derive(Debug)]
struct TreeEntry {
    selectors: Vec<ModeSelector>,
    resolved: ResolvedChromatix,
}

/// Mode-keyed tuning tree for all modules
#[derive(Debug, Default)]
pub struct ChromatixTree {
    modules: BTreeMap<String, Vec<TreeEntry>>,
    next_symbol: u32,
}

impl ChromatixTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a tree from a JSON tuning binary
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TuningError::UnableToLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let tree = Self::from_json_str(&text)?;
        info!("Loaded tuning tree from {} ({} modules)", path.display(), tree.module_count());
        Ok(tree)
    }

    /// Parse a tree from a JSON document
    pub fn from_json_str(text: &str) -> Result<Self, TuningError> {
        let document: TreeDocument = serde_json::from_str(text)?;
        let mut tree = Self::new();
        for (module, entries) in document.modules {
            for entry in entries {
                tree.insert(&module, entry.selectors, entry.data)?;
            }
        }
        Ok(tree)
    }

    /// Add a chromatix entry, assigning it the next symbol id
    pub fn insert(
        &mut self,
        module: &str,
        selectors: Vec<ModeSelector>,
        data: ChromatixModule,
    ) -> Result<TuningHandle, TuningError> {
        data.validate(module)?;

        let handle = TuningHandle {
            symbol: self.next_symbol,
        };
        self.next_symbol += 1;

        debug!("Chromatix '{}' symbol {} ({} selectors)", module, handle.symbol, selectors.len());
        self.modules
            .entry(module.to_string())
            .or_default()
            .push(TreeEntry {
                selectors,
                resolved: ResolvedChromatix {
                    handle,
                    data: Arc::new(data),
                },
            });
        Ok(handle)
    }

    /// Resolve the most specific entry for a module under the given mode.
    ///
    /// An entry matches when all its selectors are present in the mode; the
    /// match with the most selectors wins, earlier entries win ties.
    pub fn lookup(&self, module: &str, mode: &TuningMode) -> Option<ResolvedChromatix> {
        let entries = self.modules.get(module)?;
        let mut best: Option<&TreeEntry> = None;
        for entry in entries.iter().filter(|e| mode.contains_all(&e.selectors)) {
            match best {
                Some(current) if current.selectors.len() >= entry.selectors.len() => {}
                _ => best = Some(entry),
            }
        }
        if best.is_none() {
            warn!("No chromatix match for '{}' under {:?}", module, mode.selectors);
        }
        best.map(|e| e.resolved.clone())
    }

    /// Number of modules with at least one entry
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

/// Read-only access to tuning data, as consumed by IQ modules
pub trait TuningManager: Send + Sync {
    /// Whether a usable chromatix tree is loaded
    fn is_valid_chromatix(&self) -> bool;

    /// The loaded tree, if any
    fn chromatix(&self) -> Option<&ChromatixTree>;
}

/// Tuning manager backed by one loaded tree
#[derive(Debug, Default)]
pub struct StaticTuningManager {
    tree: Option<ChromatixTree>,
}

impl StaticTuningManager {
    pub fn new(tree: ChromatixTree) -> Self {
        Self { tree: Some(tree) }
    }

    /// Manager without tuning data; every module falls back to its defaults
    pub fn empty() -> Self {
        Self { tree: None }
    }
}

impl TuningManager for StaticTuningManager {
    fn is_valid_chromatix(&self) -> bool {
        self.tree.as_ref().map(|t| t.module_count() > 0).unwrap_or(false)
    }

    fn chromatix(&self) -> Option<&ChromatixTree> {
        self.tree.as_ref()
    }
}
