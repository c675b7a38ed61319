//! Ordered deployment releases, spelled as `series_codename` pairs.
//!
//! Expectation sets that differ across releases compare against these with
//! the usual ordering operators, e.g. `release < Release::BionicStein`.

use crate::error::ImgcheckError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Release {
    XenialMitaka,
    XenialNewton,
    XenialOcata,
    XenialPike,
    XenialQueens,
    BionicQueens,
    BionicRocky,
    BionicStein,
    BionicTrain,
    BionicUssuri,
    FocalUssuri,
    FocalVictoria,
}

impl Release {
    pub const ALL: [Release; 12] = [
        Release::XenialMitaka,
        Release::XenialNewton,
        Release::XenialOcata,
        Release::XenialPike,
        Release::XenialQueens,
        Release::BionicQueens,
        Release::BionicRocky,
        Release::BionicStein,
        Release::BionicTrain,
        Release::BionicUssuri,
        Release::FocalUssuri,
        Release::FocalVictoria,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Release::XenialMitaka => "xenial_mitaka",
            Release::XenialNewton => "xenial_newton",
            Release::XenialOcata => "xenial_ocata",
            Release::XenialPike => "xenial_pike",
            Release::XenialQueens => "xenial_queens",
            Release::BionicQueens => "bionic_queens",
            Release::BionicRocky => "bionic_rocky",
            Release::BionicStein => "bionic_stein",
            Release::BionicTrain => "bionic_train",
            Release::BionicUssuri => "bionic_ussuri",
            Release::FocalUssuri => "focal_ussuri",
            Release::FocalVictoria => "focal_victoria",
        }
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Release {
    type Err = ImgcheckError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Release::ALL
            .iter()
            .copied()
            .find(|release| release.as_str() == value)
            .ok_or_else(|| ImgcheckError::UnknownRelease {
                value: value.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_order_by_position() {
        assert!(Release::BionicQueens < Release::BionicStein);
        assert!(Release::BionicRocky < Release::BionicStein);
        assert!(Release::BionicStein >= Release::BionicStein);
        assert!(Release::FocalUssuri > Release::BionicStein);
        assert!(Release::XenialMitaka < Release::FocalVictoria);
    }

    #[test]
    fn release_round_trips_through_str() {
        for release in Release::ALL {
            assert_eq!(release.as_str().parse::<Release>().unwrap(), release);
        }
    }

    #[test]
    fn unknown_release_is_rejected() {
        let err = "trusty_icehouse".parse::<Release>().unwrap_err();
        assert_eq!(
            err,
            ImgcheckError::UnknownRelease {
                value: "trusty_icehouse".to_string()
            }
        );
    }

    #[test]
    fn serde_spelling_matches_as_str() {
        let json = serde_json::to_string(&Release::BionicStein).unwrap();
        assert_eq!(json, "\"bionic_stein\"");
        let parsed: Release = serde_json::from_str("\"focal_ussuri\"").unwrap();
        assert_eq!(parsed, Release::FocalUssuri);
    }
}
