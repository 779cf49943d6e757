//! Typed change notifications between the scope model and its views.
//!
//! Every mutation of [`ScopeModel`](crate::data::model::ScopeModel) emits a
//! [`ModelEvent`] whose [`ChangeKind`] flags (bitflags-style) say which part
//! of the model changed. A single event may carry several flags, e.g.
//! removing a signal is both a data and a metadata change.
//!
//! Subscribers pass an [`EventFilter`] to receive only the categories they
//! depend on. The filter is a simple OR mask: an event is delivered when
//! `(event.kinds & filter) != 0`.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

// ─────────────────────────────────────────────────────────────────────────────
// ChangeKind – bitflags
// ─────────────────────────────────────────────────────────────────────────────

/// Bitflags describing which categories of model state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeKind(pub u64);

impl ChangeKind {
    // ── Data ────────────────────────────────────────────────────────────
    /// The data set was replaced or signals were removed.
    pub const DATA_VALUES: Self = Self(1 << 0);

    // ── Metadata ────────────────────────────────────────────────────────
    /// The list of display items (names, kinds) changed.
    pub const DATA_ITEMS: Self = Self(1 << 1);
    /// A signal color changed.
    pub const COLOR: Self = Self(1 << 2);
    /// A signal was shown or hidden.
    pub const VISIBILITY: Self = Self(1 << 3);

    // ── Selection ───────────────────────────────────────────────────────
    /// The selected region changed.
    pub const REGION: Self = Self(1 << 4);

    // ── Per-signal transforms ───────────────────────────────────────────
    pub const TIMESHIFT: Self = Self(1 << 5);
    pub const TRANSFORM: Self = Self(1 << 6);

    // ── X-Y plots ───────────────────────────────────────────────────────
    pub const XY_PAIRINGS: Self = Self(1 << 7);
    pub const REF_GEO: Self = Self(1 << 8);

    // ── Category masks ──────────────────────────────────────────────────
    pub const DATA: Self = Self::DATA_VALUES;
    pub const METADATA: Self = Self(Self::DATA_ITEMS.0 | Self::COLOR.0 | Self::VISIBILITY.0);
    pub const TRANSFORMS: Self = Self(Self::TIMESHIFT.0 | Self::TRANSFORM.0);

    /// Wildcard: matches every change kind.
    pub const ALL: Self = Self(u64::MAX);

    /// Combine two change kinds (bitwise OR).
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check whether `self` contains all bits in `other`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check whether `self` intersects with `other` (at least one bit in common).
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Returns `true` if no bits are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ChangeKind {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ChangeKind {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for ChangeKind {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::ops::Not for ChangeKind {
    type Output = Self;
    #[inline]
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "EMPTY");
        }
        if *self == ChangeKind::ALL {
            return write!(f, "ALL");
        }

        let pairs: &[(ChangeKind, &str)] = &[
            (ChangeKind::DATA_VALUES, "DATA_VALUES"),
            (ChangeKind::DATA_ITEMS, "DATA_ITEMS"),
            (ChangeKind::COLOR, "COLOR"),
            (ChangeKind::VISIBILITY, "VISIBILITY"),
            (ChangeKind::REGION, "REGION"),
            (ChangeKind::TIMESHIFT, "TIMESHIFT"),
            (ChangeKind::TRANSFORM, "TRANSFORM"),
            (ChangeKind::XY_PAIRINGS, "XY_PAIRINGS"),
            (ChangeKind::REF_GEO, "REF_GEO"),
        ];

        let mut names = Vec::new();
        let mut known_bits: u64 = 0;
        for (kind, name) in pairs {
            known_bits |= kind.0;
            if self.contains(*kind) {
                names.push((*name).to_string());
            }
        }
        let extra = self.0 & !known_bits;
        if extra != 0 {
            names.push(format!("0x{:x}", extra));
        }
        write!(f, "{}", names.join("|"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ModelEvent
// ─────────────────────────────────────────────────────────────────────────────

/// One model change.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvent {
    pub kinds: ChangeKind,
    /// Signals the change applies to; empty for global changes such as the
    /// region.
    pub signals: Vec<String>,
    /// Seconds since the bus was created, set on emit.
    pub timestamp: f64,
}

impl ModelEvent {
    pub fn new(kinds: ChangeKind) -> Self {
        Self {
            kinds,
            signals: Vec::new(),
            timestamp: 0.0,
        }
    }

    pub fn with_signals(mut self, signals: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.signals = signals.into_iter().map(Into::into).collect();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventFilter
// ─────────────────────────────────────────────────────────────────────────────

/// An OR-mask over [`ChangeKind`]s.
#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub mask: ChangeKind,
}

impl EventFilter {
    pub const fn all() -> Self {
        Self { mask: ChangeKind::ALL }
    }

    pub const fn only(mask: ChangeKind) -> Self {
        Self { mask }
    }

    #[inline]
    pub fn matches(&self, event: &ModelEvent) -> bool {
        event.kinds.intersects(self.mask)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventBus
// ─────────────────────────────────────────────────────────────────────────────

struct Subscriber {
    filter: EventFilter,
    sender: Sender<ModelEvent>,
}

struct EventBusInner {
    subscribers: Vec<Subscriber>,
    start_instant: std::time::Instant,
}

/// Distributes model events to subscribers over `mpsc` channels.
///
/// Clones share the subscriber list.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<EventBusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EventBusInner {
                subscribers: Vec::new(),
                start_instant: std::time::Instant::now(),
            })),
        }
    }

    /// Receive every event whose kinds intersect `filter`.
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<ModelEvent> {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscribers.push(Subscriber { filter, sender: tx });
        rx
    }

    pub fn subscribe_all(&self) -> Receiver<ModelEvent> {
        self.subscribe(EventFilter::all())
    }

    /// Send `event` to matching subscribers. Subscribers whose receiver was
    /// dropped are removed once an event matches them.
    pub fn emit(&self, mut event: ModelEvent) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        event.timestamp = inner.start_instant.elapsed().as_secs_f64();
        inner.subscribers.retain(|sub| {
            if sub.filter.matches(&event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                true
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|i| i.subscribers.len()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────────────────────────
