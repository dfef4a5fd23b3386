/// Frame-skip policy: of every `stride` frames read, only the last is processed.
///
/// The counter starts at 1 for the first frame, so frames `k, 2k, ...` are admitted
/// and a run of `N` frames admits exactly `N / k`.
#[derive(Clone, Debug)]
pub struct FrameSampler {
    stride: u64,
    seen: u64,
}

impl FrameSampler {
    pub fn new(stride: u32) -> Self {
        Self {
            stride: u64::from(stride.max(1)),
            seen: 0,
        }
    }

    /// Count one frame read from the source and decide whether to process it.
    pub fn admit(&mut self) -> bool {
        self.seen += 1;
        self.seen % self.stride == 0
    }

    pub fn frames_seen(&self) -> u64 {
        self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admitted(stride: u32, frames: u64) -> u64 {
        let mut sampler = FrameSampler::new(stride);
        (0..frames).filter(|_| sampler.admit()).count() as u64
    }

    #[test]
    fn admits_floor_of_frames_over_stride() {
        for stride in 1..=10u32 {
            for frames in 0..40u64 {
                assert_eq!(admitted(stride, frames), frames / u64::from(stride));
            }
        }
    }

    #[test]
    fn admits_every_kth_frame() {
        let mut sampler = FrameSampler::new(3);
        let pattern: Vec<bool> = (0..6).map(|_| sampler.admit()).collect();
        assert_eq!(pattern, vec![false, false, true, false, false, true]);
        assert_eq!(sampler.frames_seen(), 6);
    }
}
