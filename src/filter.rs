use crate::types::{Layer, Level, LogEntry};

/// Show/hide flag per layer, keyed by [`Layer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFilter {
    shown: [bool; Layer::COUNT],
}

impl Default for LayerFilter {
    fn default() -> Self {
        Self {
            shown: [true; Layer::COUNT],
        }
    }
}

impl LayerFilter {
    pub fn is_shown(&self, layer: Layer) -> bool {
        self.shown[layer as usize]
    }

    pub fn set(&mut self, layer: Layer, shown: bool) {
        self.shown[layer as usize] = shown;
    }

    pub fn toggle(&mut self, layer: Layer) -> bool {
        let slot = &mut self.shown[layer as usize];
        *slot = !*slot;
        *slot
    }

    /// Known layers in column order, followed by [`Layer::Unknown`].
    pub fn iter(&self) -> impl Iterator<Item = (Layer, bool)> + '_ {
        Layer::KNOWN
            .into_iter()
            .chain(std::iter::once(Layer::Unknown))
            .map(move |layer| (layer, self.is_shown(layer)))
    }
}

/// Show/hide flag per log level, keyed by [`Level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelFilter {
    shown: [bool; Level::COUNT],
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self {
            shown: [true; Level::COUNT],
        }
    }
}

impl LevelFilter {
    pub fn is_shown(&self, level: Level) -> bool {
        self.shown[level as usize]
    }

    pub fn set(&mut self, level: Level, shown: bool) {
        self.shown[level as usize] = shown;
    }

    pub fn toggle(&mut self, level: Level) -> bool {
        let slot = &mut self.shown[level as usize];
        *slot = !*slot;
        *slot
    }

    pub fn iter(&self) -> impl Iterator<Item = (Level, bool)> + '_ {
        Level::ALL
            .into_iter()
            .map(move |level| (level, self.is_shown(level)))
    }
}

/// Layer and level toggles deciding which entries are visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub layers: LayerFilter,
    pub levels: LevelFilter,
}

impl FilterState {
    pub fn visible(&self, entry: &LogEntry) -> bool {
        self.layers.is_shown(entry.layer) && self.levels.is_shown(entry.level)
    }

    pub fn toggle_layer(&mut self, layer: Layer) -> bool {
        self.layers.toggle(layer)
    }

    pub fn toggle_level(&mut self, level: Level) -> bool {
        self.levels.toggle(level)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Visible entries in their original order.
    pub fn apply<'a>(&'a self, entries: &'a [LogEntry]) -> impl Iterator<Item = &'a LogEntry> + 'a {
        entries.iter().filter(move |entry| self.visible(entry))
    }
}
