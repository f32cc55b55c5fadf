use std::fmt;

/// Receiver volume as a whole percentage in `0..=100`.
///
/// Every constructor clamps, so a `Volume` is always in range. The Cast
/// protocol expresses volume as a level in `0.0..=1.0`; [`Volume::level`] and
/// [`Volume::from_level`] convert between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Volume(u8);

impl Volume {
    pub const MIN: Volume = Volume(0);
    pub const MAX: Volume = Volume(100);

    /// Clamp any integer into a volume.
    pub fn new(value: i32) -> Self {
        Volume(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Cast level (`value / 100`).
    pub fn level(self) -> f32 {
        f32::from(self.0) / 100.0
    }

    /// Convert a Cast level, rounding to the nearest percent.
    pub fn from_level(level: f32) -> Self {
        if level.is_nan() {
            return Volume::MIN;
        }
        Volume::new((level * 100.0).round().clamp(0.0, 100.0) as i32)
    }

    pub fn step_up(self, step: u8) -> Self {
        Volume::new(i32::from(self.0) + i32::from(step))
    }

    pub fn step_down(self, step: u8) -> Self {
        Volume::new(i32::from(self.0) - i32::from(step))
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume(50)
    }
}

impl From<u8> for Volume {
    fn from(value: u8) -> Self {
        Volume::new(i32::from(value))
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
