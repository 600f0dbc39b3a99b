//! Live picture of recently played audio
//!
//! [`RingBufferTap`] records frames on their way to the output device and
//! [`BandEnergyAnalyzer`] turns a snapshot of them into loudness bands.

pub mod band_energy;
pub mod tap;

pub use band_energy::BandEnergyAnalyzer;
pub use tap::{RingBufferTap, TappedSource};
