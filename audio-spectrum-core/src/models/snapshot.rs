/// Values published to the renderer once per hop.
///
/// Replaced as a whole under a lock, so a reader always sees one consistent
/// hop.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSnapshot {
    /// Smoothed log-band spectrum, values in `[0, 1]`.
    pub spectrum: Vec<f32>,
    /// The spectrum as it was one hop earlier, for trailing effects.
    pub echo: Vec<f32>,
    pub bass_energy: f32,
    pub high_energy: f32,
    /// Number of hops that produced this snapshot.
    pub hop: u64,
}

impl SpectrumSnapshot {
    pub fn silent(output_size: usize) -> Self {
        Self {
            spectrum: vec![0.0; output_size],
            echo: vec![0.0; output_size],
            bass_energy: 0.0,
            high_energy: 0.0,
            hop: 0,
        }
    }
}

impl Default for SpectrumSnapshot {
    fn default() -> Self {
        Self::silent(0)
    }
}
