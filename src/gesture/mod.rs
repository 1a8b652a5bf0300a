//! Drag interpretation shared by touch and pointer input.
//!
//! A controller tracks one sequence at a time: `begin` on press, `progress` on
//! move, `end` on release. Only downward travel counts. The trigger threshold
//! is `max(floor_px, height_fraction × component height)` and is inclusive.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Which distance the release decision is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerBasis {
    #[default]
    Raw,
    Dampened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    PullToRefresh,
    DrawerDismiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Touch,
    Pointer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureProfile {
    pub floor_px: f32,
    pub height_fraction: f32,
    pub damping: f32,
    pub max_travel_px: f32,
    pub basis: TriggerBasis,
}

impl GestureProfile {
    pub fn threshold(&self, component_height: f32) -> f32 {
        self.floor_px.max(self.height_fraction * component_height.max(0.0))
    }

    /// Visual travel: scaled down and capped.
    pub fn dampen(&self, raw: f32) -> f32 {
        (raw.max(0.0) * self.damping).min(self.max_travel_px)
    }

    /// Distance compared against the threshold. The dampened basis scales but
    /// is not capped; the travel cap applies to the visual only.
    fn decision_distance(&self, raw: f32) -> f32 {
        match self.basis {
            TriggerBasis::Raw => raw,
            TriggerBasis::Dampened => raw.max(0.0) * self.damping,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    Progress { raw: f32, visual: f32 },
    Release { trigger: bool },
}

// ── Arbiter ───────────────────────────────────────────────────────────────────

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Shared slot naming the one controller allowed to track a sequence.
#[derive(Debug, Clone, Default)]
pub struct GestureArbiter {
    owner: Arc<AtomicU64>,
}

impl GestureArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_claim(&self, id: u64) -> bool {
        self.owner
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self, id: u64) {
        let _ = self
            .owner
            .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn is_busy(&self) -> bool {
        self.owner.load(Ordering::Acquire) != 0
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Track {
    source: InputSource,
    start_y: f32,
    height: f32,
    raw: f32,
}

pub struct GestureController {
    kind: GestureKind,
    profile: GestureProfile,
    arbiter: GestureArbiter,
    id: u64,
    track: Option<Track>,
}

impl GestureController {
    pub fn new(kind: GestureKind, profile: GestureProfile, arbiter: GestureArbiter) -> Self {
        Self {
            kind,
            profile,
            arbiter,
            id: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            track: None,
        }
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.track.is_some()
    }

    /// Start tracking. Refused while another sequence is live anywhere on the
    /// arbiter, or for pull-to-refresh when the list is scrolled away from its top.
    pub fn begin(&mut self, source: InputSource, y: f32, component_height: f32, at_top: bool) -> bool {
        if self.track.is_some() {
            return false;
        }
        if self.kind == GestureKind::PullToRefresh && !at_top {
            return false;
        }
        if !self.arbiter.try_claim(self.id) {
            debug!("{:?} gesture refused: another sequence is active", self.kind);
            return false;
        }
        self.track = Some(Track {
            source,
            start_y: y,
            height: component_height,
            raw: 0.0,
        });
        true
    }

    pub fn progress(&mut self, source: InputSource, y: f32) -> Option<GestureEvent> {
        let track = self.track.as_mut().filter(|t| t.source == source)?;
        track.raw = (y - track.start_y).max(0.0);
        Some(GestureEvent::Progress {
            raw: track.raw,
            visual: self.profile.dampen(track.raw),
        })
    }

    pub fn end(&mut self, source: InputSource) -> Option<GestureEvent> {
        if self.track.is_none_or(|t| t.source != source) {
            return None;
        }
        let track = self.track.take()?;
        self.arbiter.release(self.id);

        let distance = self.profile.decision_distance(track.raw);
        let threshold = self.profile.threshold(track.height);
        let trigger = distance >= threshold;
        debug!(
            "{:?} release: distance {:.1} / threshold {:.1} → {}",
            self.kind, distance, threshold, trigger
        );
        Some(GestureEvent::Release { trigger })
    }

    /// Abandon the sequence without a decision (pointer cancel, unmount).
    pub fn cancel(&mut self) {
        if self.track.take().is_some() {
            self.arbiter.release(self.id);
        }
    }
}

impl Drop for GestureController {
    fn drop(&mut self) {
        self.cancel();
    }
}
