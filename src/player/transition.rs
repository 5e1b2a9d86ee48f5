//! Which track comes next.
//!
//! Pure functions of the playlist length, the current index and the two
//! modes, so `has_next`/`has_previous` can never disagree with what
//! `next`/`previous` actually do.

use rand::Rng;

use super::types::{RepeatMode, ShuffleMode};

pub fn next_index<R: Rng + ?Sized>(
    len: usize,
    current: Option<usize>,
    shuffle: ShuffleMode,
    repeat: RepeatMode,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let current = current.filter(|&i| i < len).unwrap_or(0);

    if repeat == RepeatMode::Track {
        return Some(current);
    }

    if shuffle.is_on() {
        if len == 1 {
            return Some(current);
        }
        // Draw from the other len - 1 slots and skip over the current one.
        let pick = rng.gen_range(0..len - 1);
        return Some(if pick >= current { pick + 1 } else { pick });
    }

    match current + 1 {
        n if n < len => Some(n),
        _ if repeat == RepeatMode::Queue => Some(0),
        _ => None,
    }
}

/// Whether `next_index` would produce an index, without consuming randomness.
pub fn has_next(
    len: usize,
    current: Option<usize>,
    shuffle: ShuffleMode,
    repeat: RepeatMode,
) -> bool {
    if len == 0 {
        return false;
    }
    if repeat != RepeatMode::Off || shuffle.is_on() {
        return true;
    }
    let current = current.filter(|&i| i < len).unwrap_or(0);
    current + 1 < len
}

/// Linear step back. Disabled while shuffling.
pub fn previous_index(len: usize, current: Option<usize>, shuffle: ShuffleMode) -> Option<usize> {
    if shuffle.is_on() {
        return None;
    }
    current.filter(|&i| i < len)?.checked_sub(1)
}

pub fn has_previous(len: usize, current: Option<usize>, shuffle: ShuffleMode) -> bool {
    previous_index(len, current, shuffle).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn linear_walk_stops_at_the_end() {
        let mut r = rng();
        assert_eq!(next_index(3, Some(0), ShuffleMode::Off, RepeatMode::Off, &mut r), Some(1));
        assert_eq!(next_index(3, Some(2), ShuffleMode::Off, RepeatMode::Off, &mut r), None);
        assert!(!has_next(3, Some(2), ShuffleMode::Off, RepeatMode::Off));
        assert!(has_next(3, Some(1), ShuffleMode::Off, RepeatMode::Off));
    }

    #[test]
    fn repeat_queue_wraps() {
        let mut r = rng();
        assert_eq!(next_index(3, Some(2), ShuffleMode::Off, RepeatMode::Queue, &mut r), Some(0));
        assert!(has_next(3, Some(2), ShuffleMode::Off, RepeatMode::Queue));
    }

    #[test]
    fn repeat_track_beats_shuffle() {
        let mut r = rng();
        for _ in 0..20 {
            assert_eq!(
                next_index(5, Some(3), ShuffleMode::Queue, RepeatMode::Track, &mut r),
                Some(3)
            );
        }
    }

    #[test]
    fn shuffle_never_repeats_current_and_covers_the_rest() {
        let mut r = rng();
        let mut seen = [false; 4];
        for _ in 0..200 {
            let i = next_index(4, Some(2), ShuffleMode::Queue, RepeatMode::Off, &mut r).unwrap();
            assert_ne!(i, 2);
            seen[i] = true;
        }
        assert_eq!(seen, [true, true, false, true]);
    }

    #[test]
    fn shuffle_with_one_track_replays_it() {
        let mut r = rng();
        assert_eq!(next_index(1, Some(0), ShuffleMode::Queue, RepeatMode::Off, &mut r), Some(0));
        assert!(has_next(1, Some(0), ShuffleMode::Queue, RepeatMode::Off));
    }

    #[test]
    fn empty_playlist_has_nothing() {
        let mut r = rng();
        assert_eq!(next_index(0, None, ShuffleMode::Queue, RepeatMode::Queue, &mut r), None);
        assert!(!has_next(0, None, ShuffleMode::Off, RepeatMode::Queue));
        assert!(!has_previous(0, None, ShuffleMode::Off));
    }

    #[test]
    fn previous_is_linear_and_disabled_under_shuffle() {
        assert_eq!(previous_index(3, Some(2), ShuffleMode::Off), Some(1));
        assert_eq!(previous_index(3, Some(0), ShuffleMode::Off), None);
        assert_eq!(previous_index(3, Some(2), ShuffleMode::Queue), None);
        assert!(!has_previous(3, Some(2), ShuffleMode::Queue));
        assert!(has_previous(3, Some(1), ShuffleMode::Off));
    }

    #[test]
    fn out_of_range_current_counts_as_the_first_track() {
        let mut r = rng();
        assert_eq!(next_index(3, Some(9), ShuffleMode::Off, RepeatMode::Off, &mut r), Some(1));
        assert_eq!(previous_index(3, Some(9), ShuffleMode::Off), None);
    }
}
