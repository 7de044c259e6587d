//! Up- and down-mixing of connections into a node input.

use dasp_graph::Buffer;

use crate::config::ChannelInterpretation;

const SQRT_HALF: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Sum `source` into `out`, converting between their channel counts.
///
/// Speaker rules cover mono, stereo, quad and 5.1 layouts; every other
/// combination, and every discrete input, copies matching channels and drops
/// or leaves silent the rest.
pub(crate) fn mix_into(out: &mut [Buffer], source: &[Buffer], interpretation: ChannelInterpretation) {
    if interpretation == ChannelInterpretation::Speakers && speaker_mix(out, source) {
        return;
    }
    for (o, s) in out.iter_mut().zip(source) {
        add(o, s, 1.0);
    }
}

/// Down-mix a connection to a single channel, as parameters receive it.
pub(crate) fn mix_to_mono(out: &mut Buffer, source: &[Buffer]) {
    mix_into(std::slice::from_mut(out), source, ChannelInterpretation::Speakers);
}

#[inline]
fn add(out: &mut Buffer, source: &Buffer, gain: f32) {
    for (o, s) in out.iter_mut().zip(source.iter()) {
        *o += s * gain;
    }
}

fn speaker_mix(out: &mut [Buffer], source: &[Buffer]) -> bool {
    match (source.len(), out.len()) {
        (n, m) if n == m => {
            for (o, s) in out.iter_mut().zip(source) {
                add(o, s, 1.0);
            }
        }
        // Up-mix
        (1, 2) | (1, 4) => {
            add(&mut out[0], &source[0], 1.0);
            add(&mut out[1], &source[0], 1.0);
        }
        (1, 6) => add(&mut out[2], &source[0], 1.0),
        (2, 4) | (2, 6) => {
            add(&mut out[0], &source[0], 1.0);
            add(&mut out[1], &source[1], 1.0);
        }
        (4, 6) => {
            add(&mut out[0], &source[0], 1.0);
            add(&mut out[1], &source[1], 1.0);
            add(&mut out[4], &source[2], 1.0);
            add(&mut out[5], &source[3], 1.0);
        }
        // Down-mix
        (2, 1) => {
            add(&mut out[0], &source[0], 0.5);
            add(&mut out[0], &source[1], 0.5);
        }
        (4, 1) => {
            for s in source {
                add(&mut out[0], s, 0.25);
            }
        }
        (4, 2) => {
            add(&mut out[0], &source[0], 0.5);
            add(&mut out[0], &source[2], 0.5);
            add(&mut out[1], &source[1], 0.5);
            add(&mut out[1], &source[3], 0.5);
        }
        (6, 1) => {
            add(&mut out[0], &source[0], SQRT_HALF);
            add(&mut out[0], &source[1], SQRT_HALF);
            add(&mut out[0], &source[2], 1.0);
            add(&mut out[0], &source[4], 0.5);
            add(&mut out[0], &source[5], 0.5);
        }
        (6, 2) => {
            add(&mut out[0], &source[0], 1.0);
            add(&mut out[0], &source[2], SQRT_HALF);
            add(&mut out[0], &source[4], SQRT_HALF);
            add(&mut out[1], &source[1], 1.0);
            add(&mut out[1], &source[2], SQRT_HALF);
            add(&mut out[1], &source[5], SQRT_HALF);
        }
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(value: f32) -> Buffer {
        let mut buffer = Buffer::SILENT;
        buffer.iter_mut().for_each(|s| *s = value);
        buffer
    }

    #[test]
    fn mono_up_mixes_to_both_stereo_channels() {
        let mut out = vec![Buffer::SILENT; 2];
        mix_into(&mut out, &[filled(0.5)], ChannelInterpretation::Speakers);
        assert_eq!(out[0][0], 0.5);
        assert_eq!(out[1][63], 0.5);
    }

    #[test]
    fn stereo_down_mixes_to_average() {
        let mut out = vec![Buffer::SILENT; 1];
        mix_into(&mut out, &[filled(1.0), filled(0.0)], ChannelInterpretation::Speakers);
        assert_eq!(out[0][10], 0.5);
    }

    #[test]
    fn discrete_drops_extra_channels() {
        let mut out = vec![Buffer::SILENT; 1];
        mix_into(&mut out, &[filled(1.0), filled(3.0)], ChannelInterpretation::Discrete);
        assert_eq!(out[0][0], 1.0);

        let mut out = vec![Buffer::SILENT; 2];
        mix_into(&mut out, &[filled(1.0)], ChannelInterpretation::Discrete);
        assert_eq!(out[1][0], 0.0);
    }

    #[test]
    fn connections_are_summed() {
        let mut out = vec![Buffer::SILENT; 1];
        mix_into(&mut out, &[filled(0.25)], ChannelInterpretation::Speakers);
        mix_into(&mut out, &[filled(0.5)], ChannelInterpretation::Speakers);
        assert_eq!(out[0][5], 0.75);
    }
}
