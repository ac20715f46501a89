use serde::{Deserialize, Serialize};

/// Analysis window applied to each chunk before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Rectangular,
    Hann,
    #[default]
    Hamming,
}

impl WindowKind {
    pub fn coefficients(self, len: usize) -> Vec<f64> {
        match self {
            WindowKind::Rectangular => vec![1.0; len],
            WindowKind::Hann => (0..len)
                .map(|n| {
                    let phase = n as f64 * std::f64::consts::TAU / len as f64;
                    0.5 * (1.0 - phase.cos())
                })
                .collect(),
            WindowKind::Hamming => (0..len)
                .map(|n| {
                    let phase = n as f64 * std::f64::consts::TAU / len as f64;
                    0.53836 - 0.46164 * phase.cos()
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WindowKind;

    #[test]
    fn hamming_endpoints_and_midpoint() {
        let window = WindowKind::Hamming.coefficients(1024);
        assert_eq!(window.len(), 1024);
        assert!((window[0] - 0.07672).abs() < 1.0e-12);
        assert!((window[512] - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn hann_is_zero_at_origin() {
        let window = WindowKind::Hann.coefficients(8);
        assert!(window[0].abs() < 1.0e-12);
        assert!((window[4] - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn rectangular_is_identity() {
        assert!(WindowKind::Rectangular.coefficients(16).iter().all(|&c| c == 1.0));
    }
}
