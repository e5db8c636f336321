#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThreeAxes {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl ThreeAxes {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn is_within_delta(&self, other: &ThreeAxes, delta: f32) -> bool {
        libm::fabsf(self.x - other.x) <= delta
            && libm::fabsf(self.y - other.y) <= delta
            && libm::fabsf(self.z - other.z) <= delta
    }

    pub fn sub(&mut self, other: &ThreeAxes) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }

    pub fn scale(&mut self, factor: f32) {
        self.x *= factor;
        self.y *= factor;
        self.z *= factor;
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        libm::sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }
}

/// Named outputs a poll publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    FieldStrengthX,
    FieldStrengthY,
    FieldStrengthZ,
    /// Magnitude; only published when enabled in the config.
    FieldStrength,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::FieldStrengthX => "field_strength_x",
            Channel::FieldStrengthY => "field_strength_y",
            Channel::FieldStrengthZ => "field_strength_z",
            Channel::FieldStrength => "field_strength",
        }
    }
}

/// Receiver for published readings.
pub trait PublishSink {
    fn publish(&mut self, channel: Channel, value: f32);

    /// Called when the driver enters or leaves `Ready`.
    ///
    /// A fault that trips a soft reset reports `false` and then, if the reset
    /// succeeds, `true` within the same poll. An explicit `initialize` from
    /// `Ready` does the same.
    fn availability(&mut self, _available: bool) {}
}

impl<S: PublishSink + ?Sized> PublishSink for &mut S {
    fn publish(&mut self, channel: Channel, value: f32) {
        (**self).publish(channel, value)
    }

    fn availability(&mut self, available: bool) {
        (**self).availability(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_of_345_triangle() {
        assert_eq!(ThreeAxes::new(3.0, 4.0, 0.0).norm(), 5.0);
    }

    #[test]
    fn delta_comparison_is_per_axis() {
        let a = ThreeAxes::new(1.0, 2.0, 3.0);
        assert!(a.is_within_delta(&ThreeAxes::new(1.05, 1.95, 3.0), 0.1));
        assert!(!a.is_within_delta(&ThreeAxes::new(1.0, 2.0, 3.5), 0.1));
    }

    #[test]
    fn channel_names_match_output_keys() {
        assert_eq!(Channel::FieldStrengthY.name(), "field_strength_y");
        assert_eq!(Channel::FieldStrength.name(), "field_strength");
    }
}
