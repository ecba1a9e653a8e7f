//! Expansion options, directory plan and progress reporting

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

/// A shared SP2 resource that gets a second directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxiliaryEntry {
    /// Existing entry whose sector is reused.
    pub source: &'static str,
    /// Name of the entry added after relocation.
    pub name: &'static str,
}

/// Which names survive in the rewritten `BATTLE` directory and which
/// auxiliary entries are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryPlan {
    pub retained: &'static [&'static str],
    pub auxiliary: &'static [AuxiliaryEntry],
}

const PSX_RETAINED: &[&str] = &[
    "\u{0}",
    "\u{1}",
    "ARUTE.SEQ;1",
    "ARUTE.SHP;1",
    "CYOKO.SEQ;1",
    "CYOKO.SHP;1",
    "EFC_FNT.TIM;1",
    "EFF1.SEQ;1",
    "EFF1.SHP;1",
    "EFF2.SEQ;1",
    "EFF2.SHP;1",
    "ENTD1.ENT;1",
    "ENTD2.ENT;1",
    "ENTD3.ENT;1",
    "ENTD4.ENT;1",
    "KANZEN.SEQ;1",
    "KANZEN.SHP;1",
    "MON.SEQ;1",
    "MON.SHP;1",
    "OTHER.SEQ;1",
    "OTHER.SHP;1",
    "OTHER.SPR;1",
    "RUKA.SEQ;1",
    "TYPE1.SEQ;1",
    "TYPE1.SHP;1",
    "TYPE2.SEQ;1",
    "TYPE2.SHP;1",
    "TYPE3.SEQ;1",
    "TYPE4.SEQ;1",
    "WEP.SPR;1",
    "WEP1.SEQ;1",
    "WEP1.SHP;1",
    "WEP2.SEQ;1",
    "WEP2.SHP;1",
    "ZODIAC.BIN;1",
];

const fn aux(source: &'static str, name: &'static str) -> AuxiliaryEntry {
    AuxiliaryEntry { source, name }
}

const PSX_AUXILIARY: &[AuxiliaryEntry] = &[
    aux("ARLI2.SP2;1", "8C.SP2;1"),
    aux("BIBU2.SP2;1", "95.SP2;1"),
    aux("BOM2.SP2;1", "87.SP2;1"),
    aux("BEHI2.SP2;1", "92.SP2;1"),
    aux("DEMON2.SP2;1", "98.SP2;1"),
    aux("DORA22.SP2;1", "94.SP2;1"),
    aux("HYOU2.SP2;1", "88.SP2;1"),
    aux("IRON5.SP2;1", "99_2.SP2;1"),
    aux("IRON4.SP2;1", "99_3.SP2;1"),
    aux("IRON2.SP2;1", "99_4.SP2;1"),
    aux("IRON3.SP2;1", "99_5.SP2;1"),
    aux("MINOTA2.SP2;1", "90.SP2;1"),
    aux("MOL2.SP2;1", "91.SP2;1"),
    aux("TORI2.SP2;1", "8D.SP2;1"),
    aux("URI2.SP2;1", "8E.SP2;1"),
];

impl DirectoryPlan {
    /// The plan for the PSX `BATTLE` directory.
    pub const PSX: DirectoryPlan = DirectoryPlan {
        retained: PSX_RETAINED,
        auxiliary: PSX_AUXILIARY,
    };

    #[must_use]
    pub fn retains(&self, filename: &str) -> bool {
        self.retained.contains(&filename)
    }
}

impl Default for DirectoryPlan {
    fn default() -> Self {
        Self::PSX
    }
}

/// Progress update emitted by the expansion pipelines.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionProgress {
    pub phase: ExpansionPhase,
    /// Current item (1-indexed)
    pub current: usize,
    pub total: usize,
}

impl ExpansionProgress {
    #[must_use]
    pub fn new(phase: ExpansionPhase, current: usize, total: usize) -> Self {
        Self { phase, current, total }
    }

    /// Progress within the phase (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Expansion pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionPhase {
    ReadingAssets,
    RewritingDirectory,
    WritingFiller,
    RelocatingAssets,
    DumpingPack,
    MergingPack,
    WritingPack,
    PatchingTables,
    Complete,
}

impl ExpansionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingAssets => "Reading assets",
            Self::RewritingDirectory => "Rewriting directory",
            Self::WritingFiller => "Writing filler sectors",
            Self::RelocatingAssets => "Relocating assets",
            Self::DumpingPack => "Dumping pack",
            Self::MergingPack => "Merging pack",
            Self::WritingPack => "Writing pack",
            Self::PatchingTables => "Patching tables",
            Self::Complete => "Complete",
        }
    }
}

impl fmt::Display for ExpansionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback receiving progress updates.
pub type ProgressCallback = Arc<dyn Fn(&ExpansionProgress) + Send + Sync>;

/// Options for [`expand_image`](super::expand_image).
///
/// # Example
///
/// ```no_run
/// use discforge::expand::ExpansionOptions;
///
/// let options = ExpansionOptions::new()
///     .with_progress(|p| println!("{}: {}/{}", p.phase, p.current, p.total));
/// ```
#[derive(Clone, Default)]
pub struct ExpansionOptions {
    /// Timestamp for new directory entries. `None` uses the local time at
    /// the start of the run.
    pub timestamp: Option<NaiveDateTime>,
    pub plan: DirectoryPlan,
    /// Parent of the scratch directory used by the PSP pack rebuild.
    /// `None` uses the system temp directory.
    pub work_dir: Option<PathBuf>,
    progress: Option<ProgressCallback>,
}

impl ExpansionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_plan(mut self, plan: DirectoryPlan) -> Self {
        self.plan = plan;
        self
    }

    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ExpansionProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// The timestamp to stamp new entries with.
    #[must_use]
    pub fn resolved_timestamp(&self) -> NaiveDateTime {
        self.timestamp.unwrap_or_else(|| Local::now().naive_local())
    }

    /// Create the scratch directory; it is removed when the guard drops.
    pub(crate) fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("discforge-");
        match self.work_dir.as_deref() {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
    }

    pub(crate) fn report(&self, phase: ExpansionPhase, current: usize, total: usize) {
        if let Some(callback) = &self.progress {
            callback(&ExpansionProgress::new(phase, current, total));
        }
    }
}

impl fmt::Debug for ExpansionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpansionOptions")
            .field("timestamp", &self.timestamp)
            .field("plan", &self.plan)
            .field("work_dir", &self.work_dir)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
