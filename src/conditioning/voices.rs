//! Frame rendering: polyphonic voice allocation and pedal curves.

use crate::midi::{ControlPoint, NoteSpan};
use ndarray::{ArrayViewMut2, ArrayViewMut3};
use tracing::warn;

/// Writes note spans into a `[time, voice, feature]` view.
///
/// A note keeps the slot it was given for as long as it sounds. New notes
/// take the lowest free slot; a note that finds every slot busy on its first
/// frame is dropped. Notes too short to cover any frame never appear.
///
/// Returns the number of dropped notes.
pub(super) fn render_voices(
    notes: &[NoteSpan],
    frame_rate: f64,
    mut roll: ArrayViewMut3<'_, f32>,
) -> usize {
    let (n_frames, n_voices, _) = roll.dim();

    let mut order: Vec<usize> = (0..notes.len()).collect();
    order.sort_by(|a, b| notes[*a].start.total_cmp(&notes[*b].start));

    let mut slots: Vec<Option<usize>> = vec![None; n_voices];
    let mut next = 0;
    let mut dropped = 0;

    for frame in 0..n_frames {
        let time = frame as f64 / frame_rate;

        for slot in slots.iter_mut() {
            if slot.is_some_and(|i| !notes[i].is_active_at(time)) {
                *slot = None;
            }
        }

        while next < order.len() && notes[order[next]].start <= time {
            let index = order[next];
            next += 1;
            if !notes[index].is_active_at(time) {
                continue;
            }
            match slots.iter().position(Option::is_none) {
                Some(free) => slots[free] = Some(index),
                None => dropped += 1,
            }
        }

        for (voice, slot) in slots.iter().enumerate() {
            if let Some(index) = slot {
                roll[[frame, voice, 0]] = notes[*index].pitch as f32;
                roll[[frame, voice, 1]] = notes[*index].velocity as f32;
            }
        }
    }

    if dropped > 0 {
        warn!(
            dropped,
            voices = n_voices,
            "polyphony exhausted, notes dropped from conditioning"
        );
    }
    dropped
}

/// Writes held controller values, normalized to [0, 1], into `[time, pedal]`.
///
/// Column `k` follows `controllers[k]`; each value holds from its change
/// until the next change of the same controller.
pub(super) fn render_pedals(
    controls: &[ControlPoint],
    controllers: &[u8],
    frame_rate: f64,
    mut pedals: ArrayViewMut2<'_, f32>,
) {
    let (n_frames, _) = pedals.dim();

    for (column, controller) in controllers.iter().enumerate() {
        let changes: Vec<&ControlPoint> = controls
            .iter()
            .filter(|c| c.controller == *controller)
            .collect();

        let mut current = 0.0f32;
        let mut next = 0;
        for frame in 0..n_frames {
            let time = frame as f64 / frame_rate;
            while next < changes.len() && changes[next].time <= time {
                current = changes[next].value as f32 / 127.0;
                next += 1;
            }
            pedals[[frame, column]] = current;
        }
    }
}
