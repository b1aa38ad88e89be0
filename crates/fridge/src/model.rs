//! Thermal model.

use frostwatch_core::{Degrees, FridgeState};

/// Temperature of the room the fridge stands in.
pub const AMBIENT_TEMPERATURE: f64 = 25.0;

/// A fridge that changes temperature one whole degree per tick.
///
/// Door closed: cool by one degree per tick until the desired
/// temperature is reached. Door open: warm by one degree per tick until
/// ambient. A freshly plugged-in fridge starts at ambient.
#[derive(Debug, Clone)]
pub struct FridgeModel {
    state: FridgeState,
}

impl FridgeModel {
    /// Create a fridge at ambient temperature with the door closed.
    pub fn new(desired_temperature: f64) -> Self {
        Self {
            state: FridgeState::new(AMBIENT_TEMPERATURE, desired_temperature, false),
        }
    }

    /// Current state.
    pub fn state(&self) -> &FridgeState {
        &self.state
    }

    /// Open or close the door.
    pub fn set_door_open(&mut self, open: bool) {
        self.state.door_open = open;
    }

    /// Advance the model by one tick.
    pub fn tick(&mut self) {
        if self.state.door_open {
            if self.state.temperature < Degrees(AMBIENT_TEMPERATURE) {
                self.state.temperature.0 += 1.0;
            }
        } else if self.state.temperature > self.state.desired_temperature {
            self.state.temperature.0 -= 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cools_toward_desired_while_closed() {
        let mut fridge = FridgeModel::new(23.0);
        fridge.tick();
        fridge.tick();
        assert_eq!(fridge.state().temperature, Degrees(23.0));

        // Holds once reached.
        fridge.tick();
        assert_eq!(fridge.state().temperature, Degrees(23.0));
    }

    #[test]
    fn test_warms_toward_ambient_while_open() {
        let mut fridge = FridgeModel::new(4.0);
        for _ in 0..21 {
            fridge.tick();
        }
        assert_eq!(fridge.state().temperature, Degrees(4.0));

        fridge.set_door_open(true);
        fridge.tick();
        assert_eq!(fridge.state().temperature, Degrees(5.0));

        for _ in 0..30 {
            fridge.tick();
        }
        // Never above ambient.
        assert_eq!(fridge.state().temperature, Degrees(AMBIENT_TEMPERATURE));
    }
}
