//! Runtime registry of keyed-hash variants and the process-wide selector.
//!
//! The compiled-in candidate table is filtered once, on first use, into the
//! variants this machine supports. Ids index that supported subset.
//!
//! Selection is one atomic word: a supported id, or a sentinel for
//! `fastest` / `cycle`. Readers do a single load per resolution, so no lock is
//! needed. Round-robin in `cycle` mode is exact for a single caller and only
//! approximately fair when several cores resolve at once.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::hash::{CANDIDATES, KeyedHash};

const IMPL_FASTEST: u32 = u32::MAX;
const IMPL_CYCLE: u32 = u32::MAX - 1;

/// Reserved selection keywords, checked before variant names.
const SELECTORS: &[(&str, Selection)] = &[("cycle", Selection::Cycle), ("fastest", Selection::Fastest)];

/// Which variant `resolve` hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Always the supported variant with this id.
    Fixed(usize),
    /// The cached fastest variant.
    Fastest,
    /// Round-robin over all supported variants.
    Cycle,
}

impl Selection {
    fn encode(self) -> u32 {
        match self {
            Self::Fixed(id) => id as u32,
            Self::Fastest => IMPL_FASTEST,
            Self::Cycle => IMPL_CYCLE,
        }
    }

    fn decode(raw: u32) -> Self {
        match raw {
            IMPL_FASTEST => Self::Fastest,
            IMPL_CYCLE => Self::Cycle,
            id => Self::Fixed(id as usize),
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(id) => write!(f, "fixed({id})"),
            Self::Fastest => write!(f, "fastest"),
            Self::Cycle => write!(f, "cycle"),
        }
    }
}

/// Capability-filtered set of keyed-hash variants plus the current selection.
pub struct Registry {
    candidates: &'static [&'static dyn KeyedHash],
    supported: OnceLock<Vec<&'static dyn KeyedHash>>,
    chosen: AtomicU32,
    /// Index into `candidates`, not into the supported subset.
    fastest: AtomicUsize,
    cycle_count: AtomicU32,
}

impl Registry {
    /// Build a registry over a candidate table. The first candidate is the
    /// initial "fastest" choice.
    ///
    /// # Panics
    /// Panics if `candidates` is empty.
    pub const fn new(candidates: &'static [&'static dyn KeyedHash]) -> Self {
        assert!(!candidates.is_empty(), "registry needs at least one candidate");
        Self {
            candidates,
            supported: OnceLock::new(),
            chosen: AtomicU32::new(IMPL_FASTEST),
            fastest: AtomicUsize::new(0),
            cycle_count: AtomicU32::new(0),
        }
    }

    fn supported(&self) -> &[&'static dyn KeyedHash] {
        self.supported.get_or_init(|| {
            let supported: Vec<_> = self
                .candidates
                .iter()
                .copied()
                .filter(|v| v.is_supported())
                .collect();
            log::debug!(
                "keyed hash variants: {} of {} supported ({})",
                supported.len(),
                self.candidates.len(),
                supported.iter().map(|v| v.name()).collect::<Vec<_>>().join(", ")
            );
            supported
        })
    }

    /// Number of supported variants.
    pub fn count(&self) -> usize {
        self.supported().len()
    }

    /// Supported variant with this id.
    ///
    /// # Panics
    /// Panics if `id >= count()`; validate against [`Registry::count`] first.
    pub fn get_by_id(&self, id: usize) -> &'static dyn KeyedHash {
        let supported = self.supported();
        assert!(
            id < supported.len(),
            "variant id {id} out of range (count {})",
            supported.len()
        );
        supported[id]
    }

    /// Name of the supported variant with this id. Same precondition as
    /// [`Registry::get_by_id`].
    pub fn name_of(&self, id: usize) -> &'static str {
        self.get_by_id(id).name()
    }

    /// Names of all supported variants, in id order.
    pub fn names(&self) -> Vec<&'static str> {
        self.supported().iter().map(|v| v.name()).collect()
    }

    /// Install a selection.
    ///
    /// # Panics
    /// Panics on `Selection::Fixed(id)` with `id >= count()`.
    pub fn select(&self, selection: Selection) {
        if let Selection::Fixed(id) = selection {
            let count = self.count();
            assert!(id < count, "variant id {id} out of range (count {count})");
        }
        self.chosen.swap(selection.encode(), Ordering::AcqRel);
        log::debug!("keyed hash selection set to {selection}");
    }

    /// Install a selection by keyword (`"cycle"`, `"fastest"`) or exact,
    /// case-sensitive variant name. Leaves the selection untouched on error.
    pub fn select_by_name(&self, name: &str) -> Result<()> {
        let selection = SELECTORS
            .iter()
            .find(|(keyword, _)| *keyword == name)
            .map(|&(_, selection)| selection)
            .or_else(|| {
                self.supported()
                    .iter()
                    .position(|v| v.name() == name)
                    .map(Selection::Fixed)
            })
            .ok_or_else(|| Error::UnknownVariantName {
                name: name.to_string(),
            })?;
        self.select(selection);
        Ok(())
    }

    /// Current selection.
    pub fn selection(&self) -> Selection {
        Selection::decode(self.chosen.load(Ordering::Acquire))
    }

    /// Record supported variant `id` as the fastest one.
    ///
    /// # Panics
    /// Panics if `id >= count()`.
    pub fn set_fastest(&self, id: usize) {
        let variant = self.get_by_id(id);
        let index = self
            .candidates
            .iter()
            .position(|c| c.name() == variant.name())
            .unwrap_or(0);
        self.fastest.store(index, Ordering::Release);
        log::debug!("fastest keyed hash variant is now {}", variant.name());
    }

    /// The cached fastest variant.
    pub fn fastest(&self) -> &'static dyn KeyedHash {
        self.candidates[self.fastest.load(Ordering::Acquire)]
    }

    /// Variant to use for the next keystream refill.
    pub fn resolve(&self) -> &'static dyn KeyedHash {
        match self.selection() {
            Selection::Fastest => self.fastest(),
            Selection::Cycle => {
                let supported = self.supported();
                if supported.is_empty() {
                    return self.fastest();
                }
                let n = self.cycle_count.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
                supported[n as usize % supported.len()]
            }
            Selection::Fixed(id) => self.get_by_id(id),
        }
    }

    /// `"fastest"`, `"cycle"`, or the fixed variant's name.
    pub fn current_name(&self) -> &'static str {
        match self.selection() {
            Selection::Fastest => "fastest",
            Selection::Cycle => "cycle",
            Selection::Fixed(id) => self.name_of(id),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("supported", &self.names())
            .field("selection", &self.selection())
            .field("fastest", &self.fastest().name())
            .finish()
    }
}

static REGISTRY: Registry = Registry::new(CANDIDATES);

/// The process-wide registry over the compiled-in variants.
pub fn registry() -> &'static Registry {
    &REGISTRY
}
