use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{CalibrationError, CalibrationFrameMeta, CalibrationKind, FrameIdentity, normalize_filter};

/// Ordered bias, dark and flat master lists.
///
/// Registration order is lookup order: among entries satisfying the same
/// rule, the earliest wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationLibrary {
    pub bias: Vec<CalibrationFrameMeta>,
    pub dark: Vec<CalibrationFrameMeta>,
    pub flat: Vec<CalibrationFrameMeta>,
}

impl CalibrationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `meta` to the list of its kind. Returns `false` if an equal entry
    /// is already registered.
    pub fn register(&mut self, meta: CalibrationFrameMeta) -> bool {
        let list = self.list_mut(meta.kind);
        if list.contains(&meta) {
            return false;
        }
        tracing::debug!(kind = %meta.kind, path = %meta.path.display(), "Registered calibration master");
        list.push(meta);
        true
    }

    pub fn entries(&self, kind: CalibrationKind) -> &[CalibrationFrameMeta] {
        match kind {
            CalibrationKind::Bias => &self.bias,
            CalibrationKind::Dark => &self.dark,
            CalibrationKind::Flat => &self.flat,
        }
    }

    fn list_mut(&mut self, kind: CalibrationKind) -> &mut Vec<CalibrationFrameMeta> {
        match kind {
            CalibrationKind::Bias => &mut self.bias,
            CalibrationKind::Dark => &mut self.dark,
            CalibrationKind::Flat => &mut self.flat,
        }
    }

    /// Index into [`entries`](Self::entries) of the master to use for `frame`.
    ///
    /// Bias and dark match on dimensions plus (gain, offset), relaxing through
    /// wildcard values in the order exact, offset wildcard, gain wildcard,
    /// both wildcard. Dark additionally requires equal exposure time. Flat
    /// matches on normalized filter and dimensions.
    pub fn select(&self, kind: CalibrationKind, frame: &FrameIdentity) -> Option<usize> {
        let entries = self.entries(kind);
        match kind {
            CalibrationKind::Flat => {
                let filter = normalize_filter(&frame.filter);
                entries
                    .iter()
                    .position(|m| m.filter == filter && m.dimensions() == frame.dimensions())
            }
            CalibrationKind::Bias | CalibrationKind::Dark => {
                frame.gain_offset_candidates().into_iter().find_map(|(gain, offset)| {
                    entries.iter().position(|m| {
                        m.gain == gain
                            && m.offset == offset
                            && m.dimensions() == frame.dimensions()
                            && (kind != CalibrationKind::Dark || m.exposure_time == frame.exposure_time)
                    })
                })
            }
        }
    }

    /// Master descriptor selected for `frame`, see [`select`](Self::select).
    pub fn find(&self, kind: CalibrationKind, frame: &FrameIdentity) -> Option<&CalibrationFrameMeta> {
        self.select(kind, frame).map(|index| &self.entries(kind)[index])
    }

    pub fn is_empty(&self) -> bool {
        self.bias.is_empty() && self.dark.is_empty() && self.flat.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let text = fs::read_to_string(path).map_err(|source| CalibrationError::LibraryRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yml::from_str(&text).map_err(|source| CalibrationError::LibraryFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the library as YAML, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), CalibrationError> {
        let text = serde_yml::to_string(self).map_err(|source| CalibrationError::LibraryFormat {
            path: path.to_path_buf(),
            source,
        })?;
        let write_err = |source| CalibrationError::LibraryWrite {
            path: path.to_path_buf(),
            source,
        };
        let temp = common::file_utils::temp_path_for(path);
        fs::write(&temp, text).map_err(write_err)?;
        common::file_utils::replace_file(&temp, path).map_err(write_err)
    }
}
