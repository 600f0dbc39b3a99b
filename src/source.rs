//! Frame stream primitives shared by decoders, the tap and the output sinks

/// A stereo sample pair, left then right, amplitudes in [-1, 1]
pub type Frame = [f32; 2];

/// A silent frame
pub const SILENCE: Frame = [0.0, 0.0];

/// Anything that can fill a buffer with frames in playback order.
///
/// Called from the real-time producer context, so implementations should
/// keep per-call work proportional to `buf.len()` and avoid allocating.
pub trait FrameSource: Send {
    /// Fill `buf` from the front and return how many frames were written,
    /// plus whether more frames may follow. `false` means end-of-stream.
    fn read_frames(&mut self, buf: &mut [Frame]) -> (usize, bool);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frames(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        (**self).read_frames(buf)
    }
}

/// Zero every frame in `buf`
#[inline]
pub fn fill_silence(buf: &mut [Frame]) {
    buf.fill(SILENCE);
}
