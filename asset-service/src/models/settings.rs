use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::{Validate, ValidationError};

/// Seed value that asks for a fresh random seed at generation time.
pub const RANDOM_SEED: u64 = 0;

/// Inference settings supplied with a generation request.
///
/// The field order is part of the cache identity: the settings hash is taken
/// over the compact JSON serialization in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_finite_cfg_strength"))]
pub struct GenerationSettings {
    /// 0 means random seed
    #[serde(default)]
    pub seed: u64,

    #[serde(default = "default_steps")]
    #[validate(range(min = 1, max = 500))]
    pub sparse_structure_sampler_steps: u32,

    #[serde(default = "default_cfg_strength")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub sparse_structure_sampler_cfg_strength: f64,
}

/// Range checks pass NaN through, so non-finite strengths are rejected here.
fn validate_finite_cfg_strength(settings: &GenerationSettings) -> Result<(), ValidationError> {
    if settings.sparse_structure_sampler_cfg_strength.is_finite() {
        Ok(())
    } else {
        let mut err = ValidationError::new("finite");
        err.message = Some("sparse_structure_sampler_cfg_strength must be a finite number".into());
        Err(err)
    }
}

fn default_steps() -> u32 {
    12
}

fn default_cfg_strength() -> f64 {
    7.5
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: RANDOM_SEED,
            sparse_structure_sampler_steps: default_steps(),
            sparse_structure_sampler_cfg_strength: default_cfg_strength(),
        }
    }
}

impl GenerationSettings {
    /// The seed to hand to the pipeline.
    ///
    /// The sentinel resolves to a new random value on every call; the cache
    /// key never sees the resolved value.
    pub fn resolve_seed(&self) -> u64 {
        if self.seed == RANDOM_SEED {
            rand::thread_rng().gen_range(1..=i64::MAX as u64)
        } else {
            self.seed
        }
    }

    /// Hex SHA-256 over the canonical JSON form of the declared fields.
    pub fn settings_hash(&self) -> String {
        // Serializing a struct of plain numbers cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_matches_declaration_order() {
        let json = serde_json::to_string(&GenerationSettings::default()).unwrap();
        assert_eq!(
            json,
            r#"{"seed":0,"sparse_structure_sampler_steps":12,"sparse_structure_sampler_cfg_strength":7.5}"#
        );
    }

    #[test]
    fn hash_is_stable_hex_sha256() {
        let settings = GenerationSettings::default();
        let hash = settings.settings_hash();

        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash, settings.clone().settings_hash());
    }

    #[test]
    fn every_field_changes_the_hash() {
        let base = GenerationSettings::default();
        let variants = [
            GenerationSettings {
                seed: 42,
                ..base.clone()
            },
            GenerationSettings {
                sparse_structure_sampler_steps: 13,
                ..base.clone()
            },
            GenerationSettings {
                sparse_structure_sampler_cfg_strength: 3.0,
                ..base.clone()
            },
        ];

        for variant in variants {
            assert_ne!(variant.settings_hash(), base.settings_hash());
        }
    }

    #[test]
    fn explicit_seed_is_used_verbatim() {
        let settings = GenerationSettings {
            seed: 1234,
            ..Default::default()
        };
        assert_eq!(settings.resolve_seed(), 1234);
    }

    #[test]
    fn sentinel_seed_resolves_to_random_non_zero_values() {
        let settings = GenerationSettings::default();
        let seeds: Vec<u64> = (0..8).map(|_| settings.resolve_seed()).collect();

        assert!(seeds.iter().all(|s| *s != RANDOM_SEED && *s <= i64::MAX as u64));
        assert!(seeds.windows(2).any(|w| w[0] != w[1]));
        // Resolution never leaks into the identity.
        assert_eq!(
            settings.settings_hash(),
            GenerationSettings::default().settings_hash()
        );
    }

    #[test]
    fn missing_fields_take_documented_defaults() {
        let settings: GenerationSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, GenerationSettings::default());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let zero_steps = GenerationSettings {
            sparse_structure_sampler_steps: 0,
            ..Default::default()
        };
        assert!(zero_steps.validate().is_err());

        let negative_strength = GenerationSettings {
            sparse_structure_sampler_cfg_strength: -1.0,
            ..Default::default()
        };
        assert!(negative_strength.validate().is_err());

        let too_strong = GenerationSettings {
            sparse_structure_sampler_cfg_strength: 100.5,
            ..Default::default()
        };
        assert!(too_strong.validate().is_err());

        assert!(GenerationSettings::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_non_finite_cfg_strength() {
        for value in ["NaN", "inf", "-inf"] {
            let settings = GenerationSettings {
                sparse_structure_sampler_cfg_strength: value.parse().unwrap(),
                ..Default::default()
            };
            assert!(settings.validate().is_err(), "{} passed validation", value);
        }

        let boundary = GenerationSettings {
            sparse_structure_sampler_cfg_strength: 100.0,
            ..Default::default()
        };
        assert!(boundary.validate().is_ok());
    }
}
