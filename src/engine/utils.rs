use crate::types::RuntimeEvent;

/// Independent sub-seed so each subsystem gets its own random stream.
pub(super) fn derive_seed(seed: u32, salt: u32) -> u32 {
    let mut t = seed ^ salt.wrapping_mul(0x9e37_79b9);
    t = (t ^ (t >> 16)).wrapping_mul(0x85eb_ca6b);
    t = (t ^ (t >> 13)).wrapping_mul(0xc2b2_ae35);
    t ^ (t >> 16)
}

pub(super) fn forward_events<T>(
    target: &mut Vec<RuntimeEvent>,
    events: Vec<T>,
    wrap: fn(T) -> RuntimeEvent,
) {
    target.extend(events.into_iter().map(wrap));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BossEvent, BossPhase};

    #[test]
    fn derived_seeds_differ_per_salt() {
        assert_ne!(derive_seed(7, 1), derive_seed(7, 2));
        assert_eq!(derive_seed(7, 1), derive_seed(7, 1));
    }

    #[test]
    fn forwarded_events_keep_order() {
        let mut out = Vec::new();
        forward_events(
            &mut out,
            vec![
                BossEvent::PhaseChanged {
                    phase: BossPhase::Navigate,
                },
                BossEvent::BossDefeated,
            ],
            RuntimeEvent::Boss,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], RuntimeEvent::Boss(BossEvent::BossDefeated));
    }
}
