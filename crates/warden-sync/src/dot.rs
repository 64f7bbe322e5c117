//! Damage-over-time scaling inside PvP zones.

use tracing::trace;
use warden_zone::ZoneStore;

use crate::{DotAccumulator, DotEntity, Host, LevelId};

/// Rescales pending damage-over-time for entities standing in PvP zones.
///
/// Runs once per level tick after the host has accumulated its own damage-over-time.
/// Zones whose multipliers are both 1.0 are skipped, as are accumulators with nothing
/// pending.
#[derive(Copy, Clone, Debug, Default)]
pub struct DotModifier;

impl DotModifier {
    /// Returns the number of accumulators scaled.
    pub fn apply(store: &ZoneStore, host: Host<'_>, level: LevelId) -> usize {
        let mut scaled = 0;
        host.entities.for_each_entity(level, &mut |entity: &mut dyn DotEntity| {
            let (x, y) = entity.position();
            let Some(scale) = store
                .pvp_zone_at_world(x, y)
                .and_then(|(_, rules)| rules.dot_scale())
            else {
                return;
            };
            entity.for_each_accumulator(&mut |accumulator: &mut dyn DotAccumulator| {
                scaled += usize::from(scale_pending(accumulator, scale));
            });
        });
        if scaled > 0 {
            trace!(level = %level, scaled, "scaled damage over time");
        }
        scaled
    }
}

fn scale_pending(accumulator: &mut dyn DotAccumulator, scale: f32) -> bool {
    let pending = accumulator.pending();
    if pending <= 0.0 {
        return false;
    }
    accumulator.set_pending(pending * scale);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pending(f32);

    impl DotAccumulator for Pending {
        fn pending(&self) -> f32 {
            self.0
        }

        fn set_pending(&mut self, value: f32) {
            self.0 = value;
        }
    }

    #[test]
    fn test_scale_pending() {
        let mut acc = Pending(4.0);
        assert!(scale_pending(&mut acc, 0.25));
        assert_eq!(acc.0, 1.0);

        let mut idle = Pending(0.0);
        assert!(!scale_pending(&mut idle, 0.25));
        assert_eq!(idle.0, 0.0);
    }
}
