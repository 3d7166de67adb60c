//! KDE evaluation strategies

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// How the sum over the sample is evaluated
///
/// All strategies compute the same quantity and agree to within rounding;
/// the choice only affects memory use and parallel structure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum KdeStrategy {
    /// Materialize the `(n_poi, n_sample)` squared-distance matrix, then take
    /// the mean along the sample axis. Needs `O(n_poi * n_sample)` scratch.
    Direct,
    /// Groups of 512 lanes, each lane summing 128 strided samples; lanes are
    /// reduced inside the group and one atomic add per group updates the
    /// output.
    #[default]
    WorkGroup,
    /// One atomic add per `(point, block of 256 samples)` into a zero-filled
    /// output.
    Atomic,
    /// Per `(point, block of 256)` partial sums, reduced 256-wide level by
    /// level until one pass can finish each point.
    Tree,
}

impl KdeStrategy {
    /// Every strategy, in declaration order
    pub const ALL: [KdeStrategy; 4] = [
        KdeStrategy::Direct,
        KdeStrategy::WorkGroup,
        KdeStrategy::Atomic,
        KdeStrategy::Tree,
    ];

    /// Canonical name, as accepted by [`FromStr`]
    pub const fn as_str(self) -> &'static str {
        match self {
            KdeStrategy::Direct => "direct",
            KdeStrategy::WorkGroup => "work_group",
            KdeStrategy::Atomic => "atomic",
            KdeStrategy::Tree => "tree",
        }
    }
}

impl fmt::Display for KdeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KdeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(KdeStrategy::Direct),
            "work_group" => Ok(KdeStrategy::WorkGroup),
            "atomic" => Ok(KdeStrategy::Atomic),
            "tree" => Ok(KdeStrategy::Tree),
            other => Err(Error::invalid_argument(
                "strategy",
                format!(
                    "unknown KDE strategy '{other}', expected direct, work_group, atomic or tree"
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for strategy in KdeStrategy::ALL {
            assert_eq!(strategy.to_string().parse::<KdeStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_default_is_work_group() {
        assert_eq!(KdeStrategy::default(), KdeStrategy::WorkGroup);
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            "temps".parse::<KdeStrategy>(),
            Err(Error::InvalidArgument { arg: "strategy", .. })
        ));
    }
}
