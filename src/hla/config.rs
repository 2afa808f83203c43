
use serde::{Deserialize, Serialize};
use simple_error::bail;

/// Tunable constants for evidence accumulation and allele matching
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Bases below this quality are dropped from the high-quality view
    pub min_base_quality: u8,
    /// Floor on the minimum evidence threshold
    pub min_evidence: usize,
    /// Minimum evidence as a fraction of the high-quality fragment count
    pub min_evidence_factor: f64,
    /// High-quality minimum evidence as a fraction of the high-quality fragment count
    pub min_high_qual_evidence_factor: f64,
    /// Loci with less raw depth than this skip nucleotide evidence filtering
    pub min_depth_filter: usize,
    /// Maximum number of genes a single fragment can be attributed to
    pub max_ploidy: usize,
    /// Extra amino acids of tolerance on each side of the anchoring window
    pub anchor_window_slack: usize,
    /// Translated reads shorter than this are never anchored
    pub min_anchor_length: usize
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            min_base_quality: 30,
            min_evidence: 2,
            min_evidence_factor: 0.00075,
            min_high_qual_evidence_factor: 0.000375,
            min_depth_filter: 10,
            max_ploidy: 3,
            anchor_window_slack: 1,
            min_anchor_length: 3
        }
    }
}

impl EvidenceConfig {
    /// Checks that the values make sense before running anything
    /// # Errors
    /// * if a factor is negative or not finite
    /// * if the base quality floor or ploidy are zero
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        for (label, factor) in [
            ("min_evidence_factor", self.min_evidence_factor),
            ("min_high_qual_evidence_factor", self.min_high_qual_evidence_factor)
        ] {
            if !factor.is_finite() || factor < 0.0 {
                bail!("{label} must be a non-negative number, found {factor}");
            }
        }
        if self.min_base_quality == 0 {
            bail!("min_base_quality must be greater than 0");
        }
        if self.max_ploidy == 0 {
            bail!("max_ploidy must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_default_valid() {
        assert!(EvidenceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: EvidenceConfig = serde_json::from_str(r#"{"min_evidence": 5, "min_base_quality": 20, "min_evidence_factor": 0.001}"#).unwrap();
        assert_eq!(config.min_evidence, 5);
        assert_approx_eq!(config.min_evidence_factor, 0.001);
        assert_approx_eq!(config.min_high_qual_evidence_factor, 0.000375);
        assert_eq!(config.min_base_quality, 20);
        assert_eq!(config.max_ploidy, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid() {
        let config = EvidenceConfig {
            min_evidence_factor: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EvidenceConfig {
            min_base_quality: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
