//! Rule-set registry and the layered directory loader.
//!
//! ```text
//! <root>/
//!   HumanRace/              one folder per archetype editor ID
//!     race_master.json      optional, both sexes, loaded first
//!     female/
//!       master.json         replaces whatever race_master defined per channel
//!       10_armor.json       overlays, alphabetical, appended
//!       20_body.json
//!     male/
//!       master.json
//! ```
//!
//! File and folder names match case-insensitively. Rule sets are built on
//! first request (or all at once by [`RuleSetRegistry::load_all`]) and
//! replaced only by a reload.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, info_span, warn};

use crate::character::{CharacterModel, FormLookup};
use crate::error::MorphError;
use crate::metrics::{MorphCounters, spans};
use crate::rule::CollisionPolicy;
use crate::ruleset::{FileReport, RuleSet};
use crate::types::{ArchetypeId, RuleSetKey, Sex};

const RACE_MASTER: &str = "race_master.json";
const MASTER: &str = "master.json";

// ---------------------------------------------------------------------------
// Load Report
// ---------------------------------------------------------------------------

/// Aggregated outcome of one or more rule-set loads.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Per-file reports of scripts that decoded.
    pub files: Vec<FileReport>,
    /// Scripts that could not be read or decoded at all.
    pub failed_files: Vec<(PathBuf, MorphError)>,
    /// Sex folders without a `master.json`.
    pub missing_masters: Vec<PathBuf>,
    /// Folders that do not name a known archetype.
    pub skipped_folders: Vec<PathBuf>,
    /// Rule sets that ended up loaded.
    pub rulesets_loaded: usize,
}

impl LoadReport {
    /// Entry and file failures combined.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.failed_files.len() + self.files.iter().map(|f| f.errors.len()).sum::<usize>()
    }

    /// Whether everything loaded without errors or warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0 && self.missing_masters.is_empty() && self.skipped_folders.is_empty()
    }

    /// Fold `other` into this report.
    pub fn merge(&mut self, other: Self) {
        self.files.extend(other.files);
        self.failed_files.extend(other.failed_files);
        self.missing_masters.extend(other.missing_masters);
        self.skipped_folders.extend(other.skipped_folders);
        self.rulesets_loaded += other.rulesets_loaded;
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// At most one rule set per archetype and sex.
///
/// A key whose folder holds no loadable script is remembered as absent so
/// the disk is not probed again until the next reload.
pub struct RuleSetRegistry {
    root: PathBuf,
    forms: Arc<dyn FormLookup>,
    sets: DashMap<RuleSetKey, Option<Arc<RuleSet>>>,
    counters: Arc<MorphCounters>,
}

impl RuleSetRegistry {
    /// Registry reading rule folders under `root`.
    pub fn new(root: impl Into<PathBuf>, forms: Arc<dyn FormLookup>) -> Self {
        Self {
            root: root.into(),
            forms,
            sets: DashMap::new(),
            counters: Arc::new(MorphCounters::new()),
        }
    }

    /// Report load statistics into shared counters.
    #[must_use]
    pub fn with_counters(mut self, counters: Arc<MorphCounters>) -> Self {
        self.counters = counters;
        self
    }

    /// Root of the rule folder tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Form lookup used to resolve aliases.
    #[must_use]
    pub fn forms(&self) -> &Arc<dyn FormLookup> {
        &self.forms
    }

    /// An already loaded rule set. Never touches the disk.
    #[must_use]
    pub fn get(&self, key: &RuleSetKey) -> Option<Arc<RuleSet>> {
        self.sets.get(key).and_then(|entry| entry.value().clone())
    }

    /// The rule set for `key`, loading it on first request.
    pub fn get_or_load(&self, key: &RuleSetKey) -> Option<Arc<RuleSet>> {
        if let Some(entry) = self.sets.get(key) {
            return entry.value().clone();
        }

        // Load without holding a shard lock; the first finished load wins.
        let (set, report) = self.load_key(key);
        self.record(&report);
        self.sets
            .entry(key.clone())
            .or_insert(set.map(Arc::new))
            .value()
            .clone()
    }

    /// The rule set matching a character's archetype and sex.
    pub fn get_for<C: CharacterModel + ?Sized>(&self, character: &C) -> Option<Arc<RuleSet>> {
        let (archetype, sex) = character.archetype_and_sex()?;
        self.get_or_load(&RuleSetKey::new(archetype, sex))
    }

    /// Number of keys probed so far, absent ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether nothing has been probed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Forget every rule set.
    pub fn clear(&self) {
        self.sets.clear();
    }

    /// Scan every archetype folder under the root and (re)build its sets.
    pub fn load_all(&self) -> LoadReport {
        self.scan().0
    }

    /// Scan again, replacing entries in place.
    ///
    /// Keys the scan did not produce are dropped afterwards, so lookups
    /// running during the reload see either the old set or the new one.
    pub fn reload(&self) -> LoadReport {
        let (report, scanned) = self.scan();
        self.sets.retain(|key, _| scanned.contains(key));
        report
    }

    fn scan(&self) -> (LoadReport, HashSet<RuleSetKey>) {
        let _span = info_span!(spans::LOAD_ALL, root = %self.root.display()).entered();
        let mut report = LoadReport::default();
        let mut scanned = HashSet::new();

        let folders = match sorted_entries(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), "Cannot read rule root: {e}");
                report.failed_files.push((self.root.clone(), e));
                self.record(&report);
                return (report, scanned);
            }
        };

        for folder in folders.into_iter().filter(|p| p.is_dir()) {
            let name = file_name(&folder);
            if !self.forms.archetype_exists(&name) {
                warn!(folder = %folder.display(), "Folder does not name a known archetype, skipping");
                report.skipped_folders.push(folder);
                continue;
            }
            let archetype = ArchetypeId::new(&name);
            for sex in Sex::ALL {
                let key = RuleSetKey::new(archetype.clone(), sex);
                let (set, sub) = self.load_folder(&folder, sex);
                self.record(&sub);
                report.merge(sub);
                self.sets.insert(key.clone(), set.map(Arc::new));
                scanned.insert(key);
            }
        }

        info!(
            rulesets = report.rulesets_loaded,
            errors = report.error_count(),
            "Rule-set scan complete"
        );
        (report, scanned)
    }

    fn record(&self, report: &LoadReport) {
        MorphCounters::add(&self.counters.rulesets_loaded, report.rulesets_loaded as u64);
        MorphCounters::add(&self.counters.load_errors, report.error_count() as u64);
    }

    fn load_key(&self, key: &RuleSetKey) -> (Option<RuleSet>, LoadReport) {
        match find_ci(&self.root, key.archetype.as_str()).filter(|p| p.is_dir()) {
            Some(folder) => self.load_folder(&folder, key.sex),
            None => {
                debug!(key = %key, "No rule folder");
                (None, LoadReport::default())
            }
        }
    }

    /// Build one rule set from an archetype folder.
    fn load_folder(&self, folder: &Path, sex: Sex) -> (Option<RuleSet>, LoadReport) {
        let _span = info_span!(spans::LOAD_RULESET, folder = %folder.display(), %sex).entered();
        let mut report = LoadReport::default();
        let mut set = RuleSet::new();
        let forms = self.forms.as_ref();

        if let Some(path) = find_ci(folder, RACE_MASTER).filter(|p| p.is_file()) {
            load_file(&mut set, &path, true, CollisionPolicy::Overwrite, forms, &mut report);
        }

        if let Some(sex_folder) = find_ci(folder, sex.folder_name()).filter(|p| p.is_dir()) {
            let Some(master) = find_ci(&sex_folder, MASTER).filter(|p| p.is_file()) else {
                warn!(folder = %sex_folder.display(), "No master.json, no rule set for this sex");
                report.missing_masters.push(sex_folder);
                return (None, report);
            };
            let clear = !set.is_loaded();
            load_file(&mut set, &master, clear, CollisionPolicy::Overwrite, forms, &mut report);

            let overlays = sorted_entries(&sex_folder).unwrap_or_default();
            for path in overlays.into_iter().filter(|p| is_overlay(p)) {
                load_file(&mut set, &path, false, CollisionPolicy::Append, forms, &mut report);
            }
        }

        if set.is_loaded() {
            report.rulesets_loaded = 1;
            (Some(set), report)
        } else {
            (None, report)
        }
    }
}

fn load_file(
    set: &mut RuleSet,
    path: &Path,
    clear: bool,
    policy: CollisionPolicy,
    forms: &dyn FormLookup,
    report: &mut LoadReport,
) {
    match set.parse_script(path, clear, policy, forms) {
        Ok(file) => report.files.push(file),
        Err(e) => {
            tracing::error!(path = %path.display(), "Failed to load rule script: {e}");
            report.failed_files.push((path.to_path_buf(), e));
        }
    }
}

// ---------------------------------------------------------------------------
// Filesystem helpers
// ---------------------------------------------------------------------------

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory entries sorted by lower-cased file name.
fn sorted_entries(dir: &Path) -> crate::error::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    entries.sort_by_key(|p| file_name(p).to_lowercase());
    Ok(entries)
}

/// Entry of `dir` whose name equals `name` ignoring ASCII case.
fn find_ci(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.exists() {
        return Some(exact);
    }
    sorted_entries(dir)
        .ok()?
        .into_iter()
        .find(|p| file_name(p).eq_ignore_ascii_case(name))
}

fn is_overlay(path: &Path) -> bool {
    let name = file_name(path);
    path.is_file()
        && Path::new(&name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        && !name.eq_ignore_ascii_case(MASTER)
}
