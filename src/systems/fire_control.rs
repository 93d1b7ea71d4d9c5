//! Fire-control gate - decides whether a trigger may fire this tick.
//!
//! Pure predicates only. Callers reset the timers when a shot actually
//! happens.

use crate::components::ButtonState;
use crate::types::FireMode;

/// Rate gate: true once more than `1 / rate` seconds have passed.
/// A non-positive rate never blocks.
pub fn rate_ready(rate: f32, elapsed: f32) -> bool {
    if rate <= 0.0 {
        return true;
    }
    elapsed > 1.0 / rate
}

/// Whether the primary trigger fires this tick.
///
/// # Arguments
/// * `mode` - Fire mode of the weapon
/// * `trigger` - Primary button state
/// * `elapsed` - Seconds since the last primary fire
/// * `rate` - Primary shots per second
/// * `burst_remaining` - Rounds still owed by an armed burst
///
/// # Example
/// ```
/// use bevy_gunplay::components::ButtonState;
/// use bevy_gunplay::systems::fire_control::can_primary_fire;
/// use bevy_gunplay::types::FireMode;
///
/// let held = ButtonState { pressed: false, held: true };
/// assert!(can_primary_fire(FireMode::Automatic, held, 1.0, 10.0, 0));
/// assert!(!can_primary_fire(FireMode::Semi, held, 1.0, 10.0, 0));
/// ```
pub fn can_primary_fire(
    mode: FireMode,
    trigger: ButtonState,
    elapsed: f32,
    rate: f32,
    burst_remaining: u32,
) -> bool {
    let wants_fire = match mode {
        FireMode::Automatic => trigger.held || trigger.pressed,
        FireMode::Semi => trigger.pressed,
        FireMode::Burst { .. } => trigger.pressed || burst_remaining > 0,
    };
    wants_fire && rate_ready(rate, elapsed)
}

/// Whether the secondary trigger fires this tick. Always edge triggered.
pub fn can_secondary_fire(trigger: ButtonState, elapsed: f32, rate: f32) -> bool {
    trigger.pressed && rate_ready(rate, elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESSED: ButtonState = ButtonState {
        pressed: true,
        held: true,
    };
    const HELD: ButtonState = ButtonState {
        pressed: false,
        held: true,
    };
    const RELEASED: ButtonState = ButtonState {
        pressed: false,
        held: false,
    };

    #[test]
    fn test_rate_gate_is_strict() {
        assert!(!rate_ready(10.0, 0.1));
        assert!(rate_ready(10.0, 0.1001));
        assert!(rate_ready(0.0, 0.0));
        assert!(rate_ready(-1.0, 0.0));
    }

    #[test]
    fn test_automatic_fires_while_held() {
        assert!(can_primary_fire(FireMode::Automatic, HELD, 0.2, 10.0, 0));
        assert!(can_primary_fire(FireMode::Automatic, PRESSED, 0.2, 10.0, 0));
        assert!(!can_primary_fire(FireMode::Automatic, RELEASED, 0.2, 10.0, 0));
        assert!(!can_primary_fire(FireMode::Automatic, HELD, 0.05, 10.0, 0));
    }

    #[test]
    fn test_semi_needs_press_edge() {
        assert!(can_primary_fire(FireMode::Semi, PRESSED, 1.0, 5.0, 0));
        assert!(!can_primary_fire(FireMode::Semi, HELD, 1.0, 5.0, 0));
        assert!(!can_primary_fire(FireMode::Semi, PRESSED, 0.1, 5.0, 0));
    }

    #[test]
    fn test_burst_continues_without_trigger() {
        let burst = FireMode::Burst { shots: 3 };
        assert!(can_primary_fire(burst, PRESSED, 1.0, 10.0, 0));
        assert!(can_primary_fire(burst, RELEASED, 1.0, 10.0, 2));
        assert!(!can_primary_fire(burst, HELD, 1.0, 10.0, 0));
        assert!(!can_primary_fire(burst, RELEASED, 0.05, 10.0, 2));
    }

    #[test]
    fn test_secondary_is_edge_triggered() {
        assert!(can_secondary_fire(PRESSED, 0.0, 0.0));
        assert!(!can_secondary_fire(HELD, 10.0, 0.0));
        assert!(!can_secondary_fire(PRESSED, 0.1, 2.0));
    }
}
