//! Mute/solo resolution.
//!
//! Solo wins over mute: as soon as any track is soloed, only soloed tracks are
//! audible, whatever their mute flag says.

/// Mute/solo flags of one track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixFlags {
    pub muted: bool,
    pub solo: bool,
}

pub fn any_solo(all: &[MixFlags]) -> bool {
    all.iter().any(|f| f.solo)
}

/// Audible gain (0 or 1) for `track` given the flags of the whole set.
pub fn effective_gain(track: MixFlags, all: &[MixFlags]) -> f32 {
    let audible = if any_solo(all) { track.solo } else { !track.muted };
    if audible { 1.0 } else { 0.0 }
}

/// Effective gain of every track, in order.
pub fn resolve_all(all: &[MixFlags]) -> Vec<f32> {
    all.iter().map(|f| effective_gain(*f, all)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MixFlags; 4] = [
        MixFlags { muted: false, solo: false },
        MixFlags { muted: true, solo: false },
        MixFlags { muted: false, solo: true },
        MixFlags { muted: true, solo: true },
    ];

    #[test]
    fn without_solo_gain_follows_mute() {
        let set = [ALL[0], ALL[1]];
        assert_eq!(resolve_all(&set), vec![1.0, 0.0]);
    }

    #[test]
    fn any_solo_silences_every_non_solo_track_regardless_of_mute() {
        for a in ALL {
            for b in ALL {
                let set = [a, b];
                if !any_solo(&set) {
                    continue;
                }
                for t in set {
                    let expected = if t.solo { 1.0 } else { 0.0 };
                    assert_eq!(effective_gain(t, &set), expected, "{t:?} in {set:?}");
                }
            }
        }
    }

    #[test]
    fn solo_overrides_mute_on_the_same_track() {
        let set = [ALL[3], ALL[0]];
        assert_eq!(resolve_all(&set), vec![1.0, 0.0]);
    }

    #[test]
    fn empty_set_resolves_to_nothing() {
        assert!(resolve_all(&[]).is_empty());
    }
}
